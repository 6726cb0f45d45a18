//! Sparse bundle descriptor (Info.plist) parsing.
//!
//! A banded image is a directory containing an `Info.plist` XML property
//! list and a `bands/` directory of fixed-size data files. This module
//! parses the plist into a [`BundleDescriptor`] with the band geometry.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Bundle type value identifying a sparse bundle disk image.
pub const SPARSE_BUNDLE_TYPE: &str = "com.apple.diskimage.sparsebundle";

/// Name of the descriptor file inside the bundle directory.
pub const INFO_PLIST_NAME: &str = "Info.plist";

/// Backing store layout version this library understands.
const SUPPORTED_BACKINGSTORE_VERSION: u32 = 1;

/// Parsed bundle descriptor containing the band geometry.
///
/// Immutable once loaded; all offset arithmetic in the media layer is
/// derived from `media_size` and `band_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleDescriptor {
    /// Total addressable length of the virtual byte stream.
    pub media_size: u64,
    /// Size of every band data file in bytes (> 0).
    pub band_size: u64,
    /// Number of bands: `ceil(media_size / band_size)`.
    pub band_count: u32,
    /// Backing store layout version (always 1).
    pub backingstore_version: u32,
}

impl BundleDescriptor {
    /// Build a descriptor from the raw geometry, validating it.
    pub fn from_geometry(media_size: u64, band_size: u64) -> Result<Self> {
        if band_size == 0 {
            return Err(Error::plist("invalid band-size: 0"));
        }
        if media_size == 0 {
            return Err(Error::plist("invalid size: 0"));
        }
        let band_count = media_size.div_ceil(band_size);
        let band_count = u32::try_from(band_count)
            .map_err(|_| Error::plist(format!("number of bands out of bounds: {}", band_count)))?;

        Ok(Self {
            media_size,
            band_size,
            band_count,
            backingstore_version: SUPPORTED_BACKINGSTORE_VERSION,
        })
    }

    /// Addressable length of the band at `index`.
    ///
    /// Every band spans `band_size` bytes except the last, which is
    /// clipped to the media size.
    pub fn band_extent(&self, index: u32) -> u64 {
        let start = index as u64 * self.band_size;
        if start >= self.media_size {
            return 0;
        }
        std::cmp::min(self.band_size, self.media_size - start)
    }
}

/// Which plist element the parser is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlistElement {
    None,
    Key,
    Value,
}

/// Parse a sparse bundle `Info.plist` from its XML content.
///
/// Recognized keys are `band-size`, `size`, `diskimage-bundle-type` and
/// `bundle-backingstore-version`; unknown keys are ignored.
///
/// # Errors
///
/// Returns a plist error if the XML is malformed, a required key is
/// missing, the bundle type is not a sparse bundle, or the geometry is
/// invalid (zero band size, zero media size, band count overflow).
pub fn parse_info_plist(content: &str) -> Result<BundleDescriptor> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut element = PlistElement::None;
    let mut current_key = String::new();

    let mut band_size: Option<u64> = None;
    let mut media_size: Option<u64> = None;
    let mut bundle_type: Option<String> = None;
    let mut backingstore_version: Option<u32> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                element = match e.name().as_ref() {
                    b"key" => PlistElement::Key,
                    b"integer" | b"string" => PlistElement::Value,
                    _ => PlistElement::None,
                };
            }
            Ok(Event::End(_)) => {
                element = PlistElement::None;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::plist(format!("malformed XML text: {}", e)))?;
                match element {
                    PlistElement::Key => current_key = text.into_owned(),
                    PlistElement::Value => match current_key.as_str() {
                        "band-size" => {
                            band_size = Some(parse_integer(&text, "band-size")?);
                        }
                        "size" => {
                            media_size = Some(parse_integer(&text, "size")?);
                        }
                        "diskimage-bundle-type" => {
                            bundle_type = Some(text.into_owned());
                        }
                        "bundle-backingstore-version" => {
                            let value = parse_integer(&text, "bundle-backingstore-version")?;
                            backingstore_version = Some(u32::try_from(value).map_err(|_| {
                                Error::plist(format!(
                                    "invalid bundle-backingstore-version: {}",
                                    value
                                ))
                            })?);
                        }
                        _ => {
                            // Unknown keys are ignored
                        }
                    },
                    PlistElement::None => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {
                // Declarations, DOCTYPE, comments
            }
            Err(e) => return Err(Error::plist(format!("malformed XML: {}", e))),
        }
    }

    match bundle_type {
        Some(ref value) if value == SPARSE_BUNDLE_TYPE => {}
        Some(value) => {
            return Err(Error::plist(format!(
                "unsupported diskimage-bundle-type: {}",
                value
            )));
        }
        None => return Err(Error::plist("missing diskimage-bundle-type")),
    }

    let version = backingstore_version
        .ok_or_else(|| Error::plist("missing bundle-backingstore-version"))?;
    if version != SUPPORTED_BACKINGSTORE_VERSION {
        return Err(Error::plist(format!(
            "unsupported bundle-backingstore-version: {}",
            version
        )));
    }

    let band_size = band_size.ok_or_else(|| Error::plist("missing band-size"))?;
    let media_size = media_size.ok_or_else(|| Error::plist("missing size"))?;

    BundleDescriptor::from_geometry(media_size, band_size)
}

/// Parse a plist `<integer>` value.
fn parse_integer(text: &str, key: &str) -> Result<u64> {
    text.trim()
        .parse()
        .map_err(|_| Error::plist(format!("invalid {} value: {}", key, text)))
}
