//! Snapshot persistence
//!
//! Saves the composed preview grid as a timestamped JPEG on local disk.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::info;

use crate::display::CompositeImage;
use crate::error::SnapshotError;

/// Snapshots are archival, so they get a higher quality than the live
/// stream.
const SNAPSHOT_JPEG_QUALITY: u8 = 90;

/// Write the grid image into `dir` as `cctv_grid_<timestamp>.jpg`,
/// creating the directory if needed. Returns the full path written.
pub fn write_grid(dir: &Path, image: &CompositeImage) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(dir).map_err(|e| SnapshotError::WriteFailed {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("cctv_grid_{}.jpg", stamp));

    let mut encoded = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut encoded, SNAPSHOT_JPEG_QUALITY);
    encoder
        .encode(&image.data, image.width, image.height, ExtendedColorType::Rgb8)
        .map_err(|e| SnapshotError::EncodingFailed(e.to_string()))?;

    fs::write(&path, &encoded).map_err(|e| SnapshotError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    info!(path = %path.display(), bytes = encoded.len(), "snapshot saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::compose_grid;

    #[test]
    fn test_writes_timestamped_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let image = compose_grid(&[], 8, 8);

        let path = write_grid(dir.path(), &image).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("cctv_grid_"));
        assert!(name.ends_with(".jpg"));

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("snaps").join("grid");
        let image = compose_grid(&[], 8, 8);

        let path = write_grid(&nested, &image).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(&nested));
    }

    #[test]
    fn test_unwritable_target_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"occupied").unwrap();
        let image = compose_grid(&[], 8, 8);

        let err = write_grid(&blocker, &image).unwrap_err();
        assert!(matches!(err, SnapshotError::WriteFailed { .. }));
    }
}
