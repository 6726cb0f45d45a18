//! Band directory mapping and offset arithmetic.
//!
//! Band data files live in the bundle's `bands/` directory, named by band
//! index in lowercase hexadecimal with no padding (`0`, `1`, ..., `a`,
//! ..., `1f`). A band index with no file is a sparse hole that reads as
//! zeros. This module scans the directory into a [`BandMap`] and provides
//! the pure arithmetic that decomposes a virtual byte range into
//! per-band segments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the band data directory inside the bundle.
pub const BANDS_DIR_NAME: &str = "bands";

/// Map a virtual offset to its band index and intra-band offset.
#[inline]
pub fn locate(virtual_offset: u64, band_size: u64) -> (u32, u64) {
    ((virtual_offset / band_size) as u32, virtual_offset % band_size)
}

/// One contiguous piece of a read request, confined to a single band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandSegment {
    /// Zero-based band index.
    pub band: u32,
    /// Offset of the segment within the band, in `[0, band_size)`.
    pub offset_in_band: u64,
    /// Segment length; never crosses the band boundary.
    pub length: u64,
}

/// Iterator decomposing a virtual byte range into [`BandSegment`]s.
///
/// The segments exactly tile `[start, start + length)` in order. The
/// caller is expected to have clamped the range against the media size
/// already; this is pure arithmetic with no bounds knowledge of its own.
pub struct SegmentIter {
    band_size: u64,
    current_offset: u64,
    end_offset: u64,
}

impl SegmentIter {
    /// Create an iterator over the segments of `[start, start + length)`.
    pub fn new(start: u64, length: u64, band_size: u64) -> Self {
        debug_assert!(band_size > 0);
        Self {
            band_size,
            current_offset: start,
            end_offset: start + length,
        }
    }
}

impl Iterator for SegmentIter {
    type Item = BandSegment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_offset >= self.end_offset {
            return None;
        }

        let (band, offset_in_band) = locate(self.current_offset, self.band_size);
        let band_remaining = self.band_size - offset_in_band;
        let range_remaining = self.end_offset - self.current_offset;
        let length = std::cmp::min(band_remaining, range_remaining);

        self.current_offset += length;

        Some(BandSegment {
            band,
            offset_in_band,
            length,
        })
    }
}

/// Parse a band data file name into its band index.
///
/// Band files are named in lowercase hexadecimal without padding.
/// Returns `None` for names that are not band files (e.g. `.DS_Store`).
pub fn parse_band_file_name(name: &str) -> Option<u32> {
    if name.is_empty() || name.len() > 8 {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return None;
    }
    u32::from_str_radix(name, 16).ok()
}

/// Lookup from band index to its backing data file, if any.
///
/// Absence is a sparse hole, not an error.
#[derive(Debug, Default)]
pub struct BandMap {
    band_count: u32,
    paths: HashMap<u32, PathBuf>,
}

impl BandMap {
    /// Create an empty map covering `band_count` bands (all sparse).
    pub fn new(band_count: u32) -> Self {
        Self {
            band_count,
            paths: HashMap::new(),
        }
    }

    /// Scan a bundle's `bands/` directory into a map.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or if a band
    /// file's index is at or beyond `band_count` (a corrupt bundle).
    pub fn scan(bands_dir: &Path, band_count: u32) -> Result<Self> {
        let entries = std::fs::read_dir(bands_dir).map_err(|e| Error::io(e, bands_dir))?;

        let mut paths = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(e, bands_dir))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(index) = parse_band_file_name(name) else {
                continue;
            };
            if index >= band_count {
                return Err(Error::bundle(format!(
                    "band file {:x} is out of range (number of bands: {})",
                    index, band_count
                )));
            }
            paths.insert(index, entry.path());
        }

        Ok(Self { band_count, paths })
    }

    /// Record a backing path for a band. Used by the stream-backed open
    /// path and by tests.
    pub fn insert(&mut self, index: u32, path: PathBuf) {
        self.paths.insert(index, path);
    }

    /// Number of bands the image spans, present or sparse.
    pub fn band_count(&self) -> u32 {
        self.band_count
    }

    /// Number of bands with a backing data file.
    pub fn present_count(&self) -> u32 {
        self.paths.len() as u32
    }

    /// Look up the backing file for a band. `None` is a sparse hole.
    pub fn lookup(&self, index: u32) -> Option<&Path> {
        self.paths.get(&index).map(PathBuf::as_path)
    }
}
