//! bandview Core Library
//!
//! This crate reads banded (sparse bundle) disk images: a descriptor plus
//! a directory of fixed-size band data files, presented as a single
//! contiguous, randomly-addressable byte stream.
//!
//! # Overview
//!
//! A sparse bundle partitions the virtual media into consecutively
//! indexed bands of a fixed size. Bands without a backing file are sparse
//! holes that read as zeros, so the virtual stream is always fully
//! addressable up to the declared media size. The main entry point is
//! [`ImageHandle`], which exposes open/read/seek/close over that stream.
//!
//! # Modules
//!
//! - [`error`] - Error types and Result alias
//! - [`bundle`] - Descriptor parsing, band map, handle cache, media reader
//! - [`handle`] - Image handle state machine and public surface
//!
//! # Quick Start
//!
//! ```no_run
//! use bandview_core::{AccessMode, ImageHandle, ImageSource};
//!
//! let mut handle = ImageHandle::new();
//! handle.open(ImageSource::path("disk.sparsebundle"), AccessMode::Read).unwrap();
//! handle.open_band_data_files().unwrap();
//!
//! println!("media size: {} bytes", handle.media_size().unwrap());
//! let first_sector = handle.read_buffer_at_offset(512, 0).unwrap();
//! # let _ = first_sector;
//! handle.close().unwrap();
//! ```

pub mod bundle;
pub mod error;
pub mod handle;

pub use error::{Error, Result};

// Re-export the handle surface for convenience
pub use handle::{AccessMode, ImageHandle, ImageSource, DEFAULT_MAX_OPEN_BANDS};

pub use bundle::{BandSource, BundleDescriptor};
