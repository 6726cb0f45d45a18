//! Sparse bundle handling.
//!
//! This module provides the building blocks of the banded media layer:
//! descriptor parsing, band directory mapping, the open-handle cache and
//! the virtual media reader.

pub mod bands;
pub mod cache;
pub mod descriptor;
pub mod media;

pub use bands::{locate, parse_band_file_name, BandMap, BandSegment, SegmentIter, BANDS_DIR_NAME};
pub use cache::{BandCache, BandLookup, BandSource};
pub use descriptor::{parse_info_plist, BundleDescriptor, INFO_PLIST_NAME, SPARSE_BUNDLE_TYPE};
pub use media::MediaReader;
