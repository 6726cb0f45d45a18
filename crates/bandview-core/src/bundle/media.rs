//! Virtual media reader.
//!
//! Presents the banded image as a single contiguous byte stream. A read
//! is clamped against the media size, decomposed into per-band segments,
//! satisfied from the band cache (zero-filled for sparse bands) and
//! concatenated. The cursor may be positioned past the end of the media;
//! reads there return empty buffers, not errors.

use std::io::{Read, Seek, SeekFrom};

use super::bands::{BandMap, SegmentIter};
use super::cache::{BandCache, BandLookup};
use super::descriptor::BundleDescriptor;
use crate::error::{Error, Result};

/// Random-access reader over the virtual media of a banded image.
pub struct MediaReader {
    descriptor: BundleDescriptor,
    map: BandMap,
    cache: BandCache,
    /// Current virtual read position; may exceed the media size.
    offset: u64,
}

impl MediaReader {
    /// Create a reader from a resolved descriptor, band map and cache.
    /// The cursor starts at offset 0.
    pub fn new(descriptor: BundleDescriptor, map: BandMap, cache: BandCache) -> Self {
        Self {
            descriptor,
            map,
            cache,
            offset: 0,
        }
    }

    /// Total addressable length of the virtual byte stream.
    pub fn media_size(&self) -> u64 {
        self.descriptor.media_size
    }

    /// Size of each band in bytes.
    pub fn band_size(&self) -> u64 {
        self.descriptor.band_size
    }

    /// Number of bands, present or sparse.
    pub fn band_count(&self) -> u32 {
        self.map.band_count()
    }

    /// Number of bands with a backing data file.
    pub fn present_band_count(&self) -> u32 {
        self.map.present_count()
    }

    /// Current cursor position. Side-effect free.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes between the cursor and the end of the media.
    pub fn remaining(&self) -> u64 {
        self.descriptor.media_size.saturating_sub(self.offset)
    }

    /// Read up to `length` bytes at `virtual_offset` without moving the
    /// cursor.
    ///
    /// The returned buffer holds exactly `min(length, media_size -
    /// virtual_offset)` bytes; an empty buffer signals end-of-media and
    /// is not an error. A present band that cannot deliver every
    /// requested byte is a fatal I/O error and no partial buffer is
    /// returned.
    pub fn read_at(&mut self, virtual_offset: u64, length: u64) -> Result<Vec<u8>> {
        let available = self.descriptor.media_size.saturating_sub(virtual_offset);
        let effective = std::cmp::min(length, available);
        if effective == 0 {
            return Ok(Vec::new());
        }

        let capacity = usize::try_from(effective)
            .map_err(|_| Error::validation(format!("read size too large: {}", effective)))?;
        let mut data = Vec::with_capacity(capacity);

        for segment in SegmentIter::new(virtual_offset, effective, self.descriptor.band_size) {
            let start = data.len();
            data.resize(start + segment.length as usize, 0);

            match self.cache.obtain(segment.band, &self.map)? {
                BandLookup::Absent => {
                    // Sparse hole; the zero fill from resize stands
                }
                BandLookup::Present(handle) => {
                    handle
                        .seek(SeekFrom::Start(segment.offset_in_band))
                        .map_err(Error::io_simple)?;
                    handle.read_exact(&mut data[start..]).map_err(|e| {
                        match self.map.lookup(segment.band) {
                            Some(path) => Error::io(e, path),
                            None => Error::io_simple(e),
                        }
                    })?;
                }
            }
        }

        Ok(data)
    }

    /// Read up to `length` bytes at the cursor, advancing it by the
    /// number of bytes actually returned. Repeated calls at end-of-media
    /// keep returning empty buffers without moving the cursor.
    pub fn read(&mut self, length: u64) -> Result<Vec<u8>> {
        let data = self.read_at(self.offset, length)?;
        self.offset += data.len() as u64;
        Ok(data)
    }

    /// Seek the cursor relative to the start, the current position or
    /// the end of the media.
    ///
    /// A computed offset below zero fails without moving the cursor.
    /// Positioning past the end of the media is legal; a subsequent read
    /// there returns an empty buffer.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let new_offset: i128 = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.offset as i128 + delta as i128,
            SeekFrom::End(delta) => self.descriptor.media_size as i128 + delta as i128,
        };

        if new_offset < 0 {
            return Err(Error::invalid_offset(new_offset as i64));
        }
        let new_offset = u64::try_from(new_offset)
            .map_err(|_| Error::validation(format!("seek offset out of bounds: {}", new_offset)))?;

        self.offset = new_offset;
        Ok(new_offset)
    }
}
