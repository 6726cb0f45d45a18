//! Image handle state machine.
//!
//! An [`ImageHandle`] is created closed. `open` loads the bundle
//! descriptor (or sizes a caller-supplied stream) and
//! `open_band_data_files` resolves the band map; only then are reads,
//! seeks and size accessors valid. `close` releases every band handle
//! and returns the handle to its initial state, from which it can be
//! opened again.

use std::io::{Seek, SeekFrom};
use std::path::PathBuf;

use crate::bundle::bands::{BandMap, BANDS_DIR_NAME};
use crate::bundle::cache::{BandCache, BandSource};
use crate::bundle::descriptor::{parse_info_plist, BundleDescriptor, INFO_PLIST_NAME};
use crate::bundle::media::MediaReader;
use crate::error::{Error, Result};

/// Default bound on concurrently open band data files.
pub const DEFAULT_MAX_OPEN_BANDS: usize = 16;

/// Where the image data comes from, resolved once at open time.
pub enum ImageSource {
    /// A sparse bundle directory containing `Info.plist` and `bands/`.
    Path(PathBuf),
    /// An already-open stream presenting raw media as a single band.
    /// The handle owns the stream for the duration of the session.
    Stream(Box<dyn BandSource>),
}

impl ImageSource {
    /// Convenience constructor for the path variant.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Convenience constructor for the stream variant.
    pub fn stream(stream: impl BandSource + 'static) -> Self {
        Self::Stream(Box::new(stream))
    }
}

/// Requested access mode. Only read access is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

/// Descriptor loaded, band data files not yet resolved.
struct PendingImage {
    descriptor: BundleDescriptor,
    backing: PendingBacking,
}

enum PendingBacking {
    Bundle { bands_dir: PathBuf },
    Stream(Box<dyn BandSource>),
}

enum State {
    Closed,
    Opened(PendingImage),
    Ready(MediaReader),
}

/// Handle presenting a banded disk image as a single readable stream.
///
/// # Example
///
/// ```no_run
/// use bandview_core::{AccessMode, ImageHandle, ImageSource};
///
/// let mut handle = ImageHandle::new();
/// handle.open(ImageSource::path("disk.sparsebundle"), AccessMode::Read).unwrap();
/// handle.open_band_data_files().unwrap();
///
/// let header = handle.read_buffer_at_offset(512, 0).unwrap();
/// assert_eq!(header.len() as u64, handle.media_size().unwrap().min(512));
///
/// handle.close().unwrap();
/// ```
pub struct ImageHandle {
    state: State,
    max_open_bands: usize,
}

impl ImageHandle {
    /// Create a closed handle.
    pub fn new() -> Self {
        Self {
            state: State::Closed,
            max_open_bands: DEFAULT_MAX_OPEN_BANDS,
        }
    }

    /// Bound the number of concurrently open band data files. Takes
    /// effect when band data files are opened.
    ///
    /// # Errors
    ///
    /// Fails if band data files are already open.
    pub fn set_max_open_bands(&mut self, limit: usize) -> Result<()> {
        if matches!(self.state, State::Ready(_)) {
            return Err(Error::bundle("band data files already opened"));
        }
        self.max_open_bands = limit.max(1);
        Ok(())
    }

    /// Whether the handle is open (descriptor loaded).
    pub fn is_open(&self) -> bool {
        !matches!(self.state, State::Closed)
    }

    /// Open an image from a bundle path or an already-open stream.
    ///
    /// Loads the descriptor and resets the cursor; band data files are
    /// resolved separately by [`open_band_data_files`].
    ///
    /// # Errors
    ///
    /// Fails if the handle is already open, if a non-read access mode is
    /// requested, if the path is not a bundle directory, or if the
    /// descriptor cannot be read or parsed.
    ///
    /// [`open_band_data_files`]: ImageHandle::open_band_data_files
    pub fn open(&mut self, source: ImageSource, mode: AccessMode) -> Result<()> {
        if !matches!(self.state, State::Closed) {
            return Err(Error::AlreadyOpen);
        }
        if mode != AccessMode::Read {
            return Err(Error::validation("write access is not supported"));
        }

        let pending = match source {
            ImageSource::Path(path) => {
                if !path.is_dir() {
                    return Err(Error::bundle(format!(
                        "not a bundle directory: '{}'",
                        path.display()
                    )));
                }
                let plist_path = path.join(INFO_PLIST_NAME);
                let content = std::fs::read_to_string(&plist_path)
                    .map_err(|e| Error::io(e, &plist_path))?;
                let descriptor = parse_info_plist(&content)?;
                PendingImage {
                    descriptor,
                    backing: PendingBacking::Bundle {
                        bands_dir: path.join(BANDS_DIR_NAME),
                    },
                }
            }
            ImageSource::Stream(mut stream) => {
                let media_size = stream.seek(SeekFrom::End(0)).map_err(Error::io_simple)?;
                if media_size == 0 {
                    return Err(Error::validation("stream contains no media"));
                }
                // Raw media behaves as one band spanning the whole image
                let descriptor = BundleDescriptor::from_geometry(media_size, media_size)?;
                PendingImage {
                    descriptor,
                    backing: PendingBacking::Stream(stream),
                }
            }
        };

        self.state = State::Opened(pending);
        Ok(())
    }

    /// Resolve the band data files, after which reads and seeks are
    /// valid. For bundle images this scans the `bands/` directory; band
    /// files themselves stay closed until first access.
    ///
    /// # Errors
    ///
    /// Fails if the handle is not open, if band data files are already
    /// resolved, or if the bands directory cannot be scanned. On failure
    /// the handle state is unchanged.
    pub fn open_band_data_files(&mut self) -> Result<()> {
        // Do the fallible scan first so a failure leaves state untouched
        let map = match &self.state {
            State::Closed => return Err(Error::NotOpen),
            State::Ready(_) => return Err(Error::bundle("band data files already opened")),
            State::Opened(pending) => match &pending.backing {
                PendingBacking::Bundle { bands_dir } => {
                    BandMap::scan(bands_dir, pending.descriptor.band_count)?
                }
                PendingBacking::Stream(_) => BandMap::new(pending.descriptor.band_count),
            },
        };

        let State::Opened(pending) = std::mem::replace(&mut self.state, State::Closed) else {
            return Err(Error::NotOpen);
        };
        let mut cache = BandCache::new(self.max_open_bands);
        if let PendingBacking::Stream(stream) = pending.backing {
            cache.insert_pinned(0, stream);
        }
        self.state = State::Ready(MediaReader::new(pending.descriptor, map, cache));
        Ok(())
    }

    /// Close the image, releasing every open band handle and discarding
    /// the descriptor and cursor. The handle can be opened again.
    ///
    /// # Errors
    ///
    /// Fails if the handle is not open.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        // Dropping the media reader closes every band handle
        self.state = State::Closed;
        Ok(())
    }

    /// Read from the cursor, advancing it by the bytes actually
    /// returned. `None` reads to the end of the media. An empty buffer
    /// signals end-of-media and is not an error.
    pub fn read_buffer(&mut self, size: Option<u64>) -> Result<Vec<u8>> {
        let media = self.media_mut()?;
        let size = match size {
            Some(size) => size,
            None => media.remaining(),
        };
        media.read(size)
    }

    /// Read up to `size` bytes at `offset` without moving the cursor.
    pub fn read_buffer_at_offset(&mut self, size: u64, offset: u64) -> Result<Vec<u8>> {
        self.media_mut()?.read_at(offset, size)
    }

    /// Seek the cursor; see [`MediaReader::seek`] for the semantics.
    pub fn seek_offset(&mut self, pos: SeekFrom) -> Result<u64> {
        self.media_mut()?.seek(pos)
    }

    /// Current cursor position.
    pub fn offset(&self) -> Result<u64> {
        Ok(self.media()?.offset())
    }

    /// Total addressable length of the virtual byte stream.
    pub fn media_size(&self) -> Result<u64> {
        Ok(self.media()?.media_size())
    }

    /// Size of each band in bytes.
    pub fn band_size(&self) -> Result<u64> {
        Ok(self.media()?.band_size())
    }

    /// Number of bands, present or sparse.
    pub fn band_count(&self) -> Result<u32> {
        Ok(self.media()?.band_count())
    }

    /// Number of bands with a backing data file.
    pub fn present_band_count(&self) -> Result<u32> {
        Ok(self.media()?.present_band_count())
    }

    fn media(&self) -> Result<&MediaReader> {
        match &self.state {
            State::Ready(media) => Ok(media),
            _ => Err(Error::NotOpen),
        }
    }

    fn media_mut(&mut self) -> Result<&mut MediaReader> {
        match &mut self.state {
            State::Ready(media) => Ok(media),
            _ => Err(Error::NotOpen),
        }
    }
}

impl Default for ImageHandle {
    fn default() -> Self {
        Self::new()
    }
}
