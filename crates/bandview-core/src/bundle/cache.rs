//! Band handle cache.
//!
//! Band data files are opened lazily on first access and kept open for
//! the session. The number of concurrently open file handles is bounded:
//! when the limit is reached the least recently used handle is closed and
//! transparently reopened on its next access. Handles without a backing
//! path (caller-supplied streams) are pinned and never evicted.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::PathBuf;

use super::bands::BandMap;
use crate::error::{Error, Result};

/// Capability required of a band's backing byte source.
pub trait BandSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> BandSource for T {}

/// Result of resolving a band for reading.
///
/// Absence is a sparse hole of zero bytes, never an error; modeling it as
/// a variant keeps the zero-fill path exhaustive at the read site.
pub enum BandLookup<'a> {
    /// The band has backing data, positioned by the caller.
    Present(&'a mut dyn BandSource),
    /// Sparse hole; reads as zeros.
    Absent,
}

struct OpenBand {
    handle: Box<dyn BandSource>,
    /// Path to reopen from after eviction; pinned handles have none.
    path: Option<PathBuf>,
}

/// Cache of open band handles, keyed by band index.
pub struct BandCache {
    open: HashMap<u32, OpenBand>,
    /// Eviction order for path-backed handles, least recently used first.
    /// Pinned handles never appear here.
    lru: VecDeque<u32>,
    max_open: usize,
}

impl BandCache {
    /// Create a cache bounding the number of concurrently open
    /// path-backed handles to `max_open` (at least 1).
    pub fn new(max_open: usize) -> Self {
        Self {
            open: HashMap::new(),
            lru: VecDeque::new(),
            max_open: max_open.max(1),
        }
    }

    /// Install a pre-opened handle that cannot be reopened and is
    /// therefore exempt from eviction.
    pub fn insert_pinned(&mut self, band: u32, handle: Box<dyn BandSource>) {
        self.open.insert(band, OpenBand { handle, path: None });
    }

    /// Resolve a band to its open handle, opening the backing file on
    /// first access. Returns [`BandLookup::Absent`] for sparse bands
    /// without touching the file system.
    pub fn obtain(&mut self, band: u32, map: &BandMap) -> Result<BandLookup<'_>> {
        if self.open.contains_key(&band) {
            self.touch(band);
        } else {
            let Some(path) = map.lookup(band) else {
                return Ok(BandLookup::Absent);
            };
            self.evict_for_insert();
            let file = File::open(path).map_err(|e| Error::io(e, path))?;
            self.open.insert(
                band,
                OpenBand {
                    handle: Box::new(file),
                    path: Some(path.to_path_buf()),
                },
            );
            self.lru.push_back(band);
        }

        let entry = self
            .open
            .get_mut(&band)
            .ok_or_else(|| Error::bundle(format!("band {:x} missing from cache", band)))?;
        Ok(BandLookup::Present(entry.handle.as_mut()))
    }

    /// Number of currently open handles, pinned included.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Close every open handle.
    pub fn clear(&mut self) {
        self.open.clear();
        self.lru.clear();
    }

    fn touch(&mut self, band: u32) {
        if let Some(pos) = self.lru.iter().position(|&b| b == band) {
            self.lru.remove(pos);
            self.lru.push_back(band);
        }
    }

    fn evict_for_insert(&mut self) {
        while self.lru.len() >= self.max_open {
            match self.lru.pop_front() {
                // Dropping the entry closes the file
                Some(victim) => {
                    self.open.remove(&victim);
                }
                None => break,
            }
        }
    }
}
