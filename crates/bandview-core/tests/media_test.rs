//! Integration tests for reading the virtual media of a banded image.

use std::io::SeekFrom;
use std::path::Path;

use bandview_core::{AccessMode, Error, ImageHandle, ImageSource};
use tempfile::TempDir;

const BAND_SIZE: u64 = 4096;
const MEDIA_SIZE: u64 = 10000;

/// Deterministic content byte for a virtual offset; 251 is prime so the
/// pattern never aligns with band boundaries.
fn pattern_byte(offset: u64) -> u8 {
    (offset % 251) as u8
}

fn write_plist(dir: &Path, band_size: u64, media_size: u64) {
    let content = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleInfoDictionaryVersion</key>
	<string>6.0</string>
	<key>band-size</key>
	<integer>{}</integer>
	<key>bundle-backingstore-version</key>
	<integer>1</integer>
	<key>diskimage-bundle-type</key>
	<string>com.apple.diskimage.sparsebundle</string>
	<key>size</key>
	<integer>{}</integer>
</dict>
</plist>
"#,
        band_size, media_size
    );
    std::fs::write(dir.join("Info.plist"), content).expect("Failed to write Info.plist");
}

/// Build a sparse bundle fixture with the given bands present; present
/// bands are filled with the offset pattern, absent bands are holes.
fn create_bundle(media_size: u64, band_size: u64, present: &[u32]) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    write_plist(dir.path(), band_size, media_size);

    let bands = dir.path().join("bands");
    std::fs::create_dir(&bands).expect("Failed to create bands dir");
    for &band in present {
        let start = band as u64 * band_size;
        let extent = std::cmp::min(band_size, media_size - start);
        let data: Vec<u8> = (start..start + extent).map(pattern_byte).collect();
        std::fs::write(bands.join(format!("{:x}", band)), data).expect("Failed to write band");
    }
    dir
}

fn open_image(dir: &TempDir) -> ImageHandle {
    let mut handle = ImageHandle::new();
    handle
        .open(ImageSource::path(dir.path()), AccessMode::Read)
        .expect("Failed to open bundle");
    handle
        .open_band_data_files()
        .expect("Failed to open band data files");
    handle
}

/// What the whole virtual media should look like: pattern bytes in
/// present bands, zeros in sparse bands.
fn expected_media(media_size: u64, band_size: u64, present: &[u32]) -> Vec<u8> {
    (0..media_size)
        .map(|offset| {
            let band = (offset / band_size) as u32;
            if present.contains(&band) {
                pattern_byte(offset)
            } else {
                0
            }
        })
        .collect()
}

#[test]
fn test_read_straddling_present_and_sparse_band() {
    // Bands 0 and 1 present, band 2 (bytes 8192..10000) is a hole.
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[0, 1]);
    let mut handle = open_image(&dir);

    let data = handle.read_buffer_at_offset(2000, 8000).unwrap();
    assert_eq!(data.len(), 2000);

    // Last 192 bytes of band 1's real content
    for i in 0..192u64 {
        assert_eq!(data[i as usize], pattern_byte(8000 + i), "offset {}", 8000 + i);
    }
    // Followed by 1808 zero bytes from the sparse band, clamped at media size
    assert!(data[192..].iter().all(|&b| b == 0));
}

#[test]
fn test_boundary_read_equals_split_reads() {
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[0, 1]);
    let mut handle = open_image(&dir);

    let joined = handle.read_buffer_at_offset(1000, BAND_SIZE - 500).unwrap();
    let first = handle.read_buffer_at_offset(500, BAND_SIZE - 500).unwrap();
    let second = handle.read_buffer_at_offset(500, BAND_SIZE).unwrap();

    let mut split = first;
    split.extend_from_slice(&second);
    assert_eq!(joined, split);
}

#[test]
fn test_full_media_content() {
    let present = [0u32, 2];
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &present);
    let mut handle = open_image(&dir);

    let data = handle.read_buffer_at_offset(MEDIA_SIZE, 0).unwrap();
    assert_eq!(data, expected_media(MEDIA_SIZE, BAND_SIZE, &present));
}

#[test]
fn test_sparse_band_reads_as_zero_run() {
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[0, 2]);
    let mut handle = open_image(&dir);

    // Entirely inside the hole of band 1
    let data = handle.read_buffer_at_offset(1000, BAND_SIZE + 100).unwrap();
    assert_eq!(data.len(), 1000);
    assert!(data.iter().all(|&b| b == 0));
}

#[test]
fn test_read_clamps_at_media_size() {
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[0, 1]);
    let mut handle = open_image(&dir);

    let data = handle.read_buffer_at_offset(4000, 9000).unwrap();
    assert_eq!(data.len(), 1000);

    // At and past the end: empty, not an error
    assert!(handle.read_buffer_at_offset(100, MEDIA_SIZE).unwrap().is_empty());
    assert!(handle.read_buffer_at_offset(100, MEDIA_SIZE + 5000).unwrap().is_empty());
}

#[test]
fn test_drain_loop_reads_whole_media() {
    let present = [0u32, 1];
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &present);
    let mut handle = open_image(&dir);

    let mut drained = Vec::new();
    loop {
        let chunk = handle.read_buffer(Some(3000)).unwrap();
        if chunk.is_empty() {
            break;
        }
        drained.extend_from_slice(&chunk);
    }

    assert_eq!(drained.len() as u64, MEDIA_SIZE);
    assert_eq!(drained, expected_media(MEDIA_SIZE, BAND_SIZE, &present));
    assert_eq!(handle.offset().unwrap(), MEDIA_SIZE);

    // Draining again stays empty without cursor drift
    assert!(handle.read_buffer(Some(3000)).unwrap().is_empty());
    assert_eq!(handle.offset().unwrap(), MEDIA_SIZE);
}

#[test]
fn test_read_buffer_to_end() {
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[0, 1]);
    let mut handle = open_image(&dir);

    handle.seek_offset(SeekFrom::Start(9500)).unwrap();
    let data = handle.read_buffer(None).unwrap();
    assert_eq!(data.len(), 500);
    assert_eq!(handle.offset().unwrap(), MEDIA_SIZE);
}

#[test]
fn test_read_at_offset_does_not_move_cursor() {
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[0, 1]);
    let mut handle = open_image(&dir);

    handle.seek_offset(SeekFrom::Start(42)).unwrap();
    handle.read_buffer_at_offset(100, 5000).unwrap();
    assert_eq!(handle.offset().unwrap(), 42);
}

#[test]
fn test_seek_round_trips() {
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[0]);
    let mut handle = open_image(&dir);

    for offset in [0u64, 1, BAND_SIZE, MEDIA_SIZE - 1, MEDIA_SIZE, MEDIA_SIZE + 12345] {
        assert_eq!(handle.seek_offset(SeekFrom::Start(offset)).unwrap(), offset);
        assert_eq!(handle.offset().unwrap(), offset);
    }
}

#[test]
fn test_seek_past_end_then_read_is_empty() {
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[0]);
    let mut handle = open_image(&dir);

    let pos = handle.seek_offset(SeekFrom::End(5000)).unwrap();
    assert_eq!(pos, MEDIA_SIZE + 5000);
    assert!(handle.read_buffer(Some(100)).unwrap().is_empty());
    assert_eq!(handle.offset().unwrap(), MEDIA_SIZE + 5000);
}

#[test]
fn test_seek_below_zero_fails_and_preserves_cursor() {
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[0]);
    let mut handle = open_image(&dir);

    handle.seek_offset(SeekFrom::Start(100)).unwrap();
    assert!(matches!(
        handle.seek_offset(SeekFrom::End(-(MEDIA_SIZE as i64) - 1)),
        Err(Error::InvalidOffset { .. })
    ));
    assert!(matches!(
        handle.seek_offset(SeekFrom::Current(-101)),
        Err(Error::InvalidOffset { .. })
    ));
    assert_eq!(handle.offset().unwrap(), 100);
}

#[test]
fn test_truncated_band_file_is_fatal() {
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[1]);
    // Truncate band 0's backing file well below what reads will ask of it
    std::fs::write(dir.path().join("bands").join("0"), vec![0xaa; 100]).unwrap();
    let mut handle = open_image(&dir);

    let result = handle.read_buffer_at_offset(200, 0);
    assert!(matches!(result, Err(Error::Io { .. })));

    // A failed cursor read must not advance the cursor
    let before = handle.offset().unwrap();
    assert!(handle.read_buffer(Some(200)).is_err());
    assert_eq!(handle.offset().unwrap(), before);
}

#[test]
fn test_bounded_open_handles_reads_correctly() {
    let band_size = 512u64;
    let media_size = 6 * 512;
    let present = [0u32, 1, 2, 3, 4, 5];
    let dir = create_bundle(media_size, band_size, &present);

    let mut handle = ImageHandle::new();
    handle.set_max_open_bands(2).unwrap();
    handle
        .open(ImageSource::path(dir.path()), AccessMode::Read)
        .unwrap();
    handle.open_band_data_files().unwrap();

    // Sweep the whole media twice so evicted bands have to reopen
    for _ in 0..2 {
        let data = handle.read_buffer_at_offset(media_size, 0).unwrap();
        assert_eq!(data, expected_media(media_size, band_size, &present));
    }
}

#[test]
fn test_last_band_shorter_than_band_size() {
    // Band 2 is present but only covers 10000 - 8192 = 1808 bytes
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[2]);
    let mut handle = open_image(&dir);

    let data = handle.read_buffer_at_offset(4000, 8192).unwrap();
    assert_eq!(data.len(), 1808);
    for (i, &byte) in data.iter().enumerate() {
        assert_eq!(byte, pattern_byte(8192 + i as u64));
    }
}

#[test]
fn test_reopen_starts_fresh_session() {
    let dir = create_bundle(MEDIA_SIZE, BAND_SIZE, &[0, 1]);
    let mut handle = open_image(&dir);

    handle.seek_offset(SeekFrom::Start(7777)).unwrap();
    handle.close().unwrap();

    handle
        .open(ImageSource::path(dir.path()), AccessMode::Read)
        .unwrap();
    handle.open_band_data_files().unwrap();
    assert_eq!(handle.offset().unwrap(), 0);

    let data = handle.read_buffer(Some(16)).unwrap();
    let expected: Vec<u8> = (0..16).map(pattern_byte).collect();
    assert_eq!(data, expected);
}
