//! Pure Rust transform: decode, fit, pad, re-encode, replace.
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF) | `image::ImageReader`, format sniffed from content |
//! | Save-parameter capture | [`metadata::capture`](super::metadata::capture) (`png`, `tiff`, DQT walk) |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Palette PNG | indices via `png`, nearest-neighbour, see [`indexed`](super::indexed) |
//! | Canvas + composite | [`canvas::compose_centered`](super::canvas::compose_centered) |
//! | Encode | [`encode::encode`](super::encode::encode) |
//! | Replace original | `tempfile::NamedTempFile::persist` (same directory) |
//!
//! Nothing touches the original file until the new bytes exist in full. The
//! replacement is a rename, so a crash leaves either the old file or the new
//! one, never a partial write.

use super::backend::{ImageTransform, TransformError};
use super::encode::{encode, encode_indexed};
use super::indexed::{decode_indices, render_indexed};
use super::metadata::capture;
use super::operations::{plan, render};
use super::params::SaveParams;
use crate::discover::has_supported_extension;
use crate::types::{ImageOutcome, ImageTask};
use image::{GenericImageView, ImageReader};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Production transform backed by the `image`, `png` and `tiff` crates.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustTransform;

impl RustTransform {
    pub fn new() -> Self {
        Self
    }
}

impl ImageTransform for RustTransform {
    fn transform(&self, task: &ImageTask) -> ImageOutcome {
        match normalize_file(task) {
            Ok(()) => {
                debug!("Normalized {}", task.source.display());
                ImageOutcome::Success
            }
            Err(e) => {
                warn!("{}: {e}", task.source.display());
                e.into_outcome()
            }
        }
    }
}

/// Rewrite `task.source` onto its canvas, in place.
///
/// Every intermediate buffer is owned by this call and released before it
/// returns, on success and failure alike.
pub fn normalize_file(task: &ImageTask) -> Result<(), TransformError> {
    let path = task.path();
    if !has_supported_extension(path) {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "(none)".to_string());
        return Err(TransformError::Unsupported(ext));
    }

    let encoded = {
        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Err(TransformError::Decode("empty file".into()));
        }

        let mut reader = ImageReader::new(Cursor::new(bytes.as_slice())).with_guessed_format()?;
        let format = reader
            .format()
            .ok_or_else(|| TransformError::Decode("unrecognized image data".into()))?;
        // Large scans are legitimate input.
        reader.no_limits();

        let params = capture(format, &bytes);
        let params = match params {
            SaveParams::Png {
                palette: Some(mut palette),
                text,
                ..
            } => {
                let indices = decode_indices(&bytes)?;
                drop(reader);
                drop(bytes);
                let geometry = plan(indices.dimensions(), task.target);
                debug!(
                    "{}: {}x{} indexed PNG ({} colors) on {}x{}",
                    path.display(),
                    geometry.source.0,
                    geometry.source.1,
                    palette.entries.len(),
                    geometry.canvas.0,
                    geometry.canvas.1,
                );
                let composed = render_indexed(indices, &geometry, &mut palette);
                let encoded = encode_indexed(&composed, &palette, &text, task.target.dpi)?;
                return write_atomically(path, &encoded);
            }
            other => other,
        };

        let img = reader
            .decode()
            .map_err(|e| TransformError::Decode(e.to_string()))?;
        drop(bytes);

        let geometry = plan(img.dimensions(), task.target);
        debug!(
            "{}: {}x{} {} -> {}x{} on {}x{}",
            path.display(),
            geometry.source.0,
            geometry.source.1,
            params.format_name(),
            geometry.scaled.0,
            geometry.scaled.1,
            geometry.canvas.0,
            geometry.canvas.1,
        );

        let composed = render(img, &geometry, params.has_transparency_key());
        encode(&composed, &params, task.target.dpi)?
    };

    write_atomically(path, &encoded)
}

/// Replace `path` with `bytes` via a temp file in the same directory.
///
/// The original's permissions carry over. A read-only original is refused
/// rather than silently replaced.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), TransformError> {
    let permissions = fs::metadata(path)?.permissions();
    if permissions.readonly() {
        return Err(TransformError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "file is read-only",
        )));
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| TransformError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{encode_indexed_png, write_jpeg, write_png, write_tiff};
    use crate::imaging::params::TiffCompression;
    use crate::types::TargetSize;
    use tempfile::TempDir;

    const SMALL: TargetSize = TargetSize {
        width: 40,
        height: 60,
        dpi: 200,
    };

    #[test]
    fn jpeg_is_rewritten_to_swapped_canvas() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wide.jpg");
        write_jpeg(&path, 90, 30, 85);

        let outcome = RustTransform::new().transform(&ImageTask::new(&path, SMALL));
        assert_eq!(outcome, ImageOutcome::Success);
        // landscape source → landscape canvas
        assert_eq!(image::image_dimensions(&path).unwrap(), (60, 40));
        assert_eq!(
            image::ImageFormat::from_path(&path).unwrap(),
            image::guess_format(&fs::read(&path).unwrap()).unwrap()
        );
    }

    #[test]
    fn png_keeps_portrait_canvas() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tall.png");
        write_png(&path, 10, 30);

        normalize_file(&ImageTask::new(&path, SMALL)).unwrap();
        assert_eq!(image::image_dimensions(&path).unwrap(), (40, 60));
    }

    #[test]
    fn tiff_is_rewritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scan.tif");
        write_tiff(&path, 30, 30, TiffCompression::Lzw);

        normalize_file(&ImageTask::new(&path, SMALL)).unwrap();
        assert_eq!(image::image_dimensions(&path).unwrap(), (40, 60));
    }

    #[test]
    fn exact_size_is_still_reencoded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("exact.png");
        write_png(&path, 40, 60);

        normalize_file(&ImageTask::new(&path, SMALL)).unwrap();
        assert_eq!(image::image_dimensions(&path).unwrap(), (40, 60));
        let reader = png::Decoder::new(Cursor::new(fs::read(&path).unwrap()))
            .read_info()
            .unwrap();
        assert!(reader.info().pixel_dims.is_some());
    }

    #[test]
    fn unsupported_extension_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scan.bmp");
        fs::write(&path, b"BM").unwrap();

        let outcome = RustTransform::new().transform(&ImageTask::new(&path, SMALL));
        assert!(matches!(outcome, ImageOutcome::Skipped(reason) if reason.contains("bmp")));
        assert_eq!(fs::read(&path).unwrap(), b"BM");
    }

    #[test]
    fn zero_byte_file_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.jpg");
        fs::write(&path, b"").unwrap();

        let outcome = RustTransform::new().transform(&ImageTask::new(&path, SMALL));
        assert!(matches!(outcome, ImageOutcome::Failed(_)));
    }

    #[test]
    fn corrupt_file_fails_and_is_left_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        let garbage = b"\xFF\xD8\xFF\xE0 this is not really a jpeg".to_vec();
        fs::write(&path, &garbage).unwrap();

        let outcome = RustTransform::new().transform(&ImageTask::new(&path, SMALL));
        assert!(matches!(outcome, ImageOutcome::Failed(_)));
        assert_eq!(fs::read(&path).unwrap(), garbage);
    }

    #[test]
    fn zero_length_dqt_segment_fails_without_panicking() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.jpg");
        let bytes = [0xFF, 0xD8, 0xFF, 0xDB, 0, 0, 0, 0];
        fs::write(&path, bytes).unwrap();

        let outcome = RustTransform::new().transform(&ImageTask::new(&path, SMALL));
        assert!(matches!(outcome, ImageOutcome::Failed(msg) if msg.starts_with("decode failed")));
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn indexed_png_stays_indexed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("map.png");
        let plte = [0, 0, 0, 200, 30, 30];
        let indices: Vec<u8> = (0..24).map(|i| (i % 2) as u8).collect();
        fs::write(&path, encode_indexed_png(4, 6, &plte, &[], &indices)).unwrap();

        normalize_file(&ImageTask::new(&path, SMALL)).unwrap();

        let mut reader = png::Decoder::new(Cursor::new(fs::read(&path).unwrap()))
            .read_info()
            .unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (40, 60));
        assert_eq!(info.color_type, png::ColorType::Indexed);
        assert_eq!(
            info.palette.as_deref(),
            Some(&[0u8, 0, 0, 200, 30, 30, 255, 255, 255][..])
        );
        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf).unwrap();
        assert!(buf[..frame.buffer_size()].iter().all(|&i| i <= 2));
    }

    #[test]
    fn missing_file_fails() {
        let outcome = RustTransform::new().transform(&ImageTask::new("/nonexistent/a.jpg", SMALL));
        assert!(matches!(outcome, ImageOutcome::Failed(msg) if msg.starts_with("IO error")));
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.jpg");
        fs::write(&path, b"old").unwrap();

        write_atomically(&path, b"new contents").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new contents");
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn read_only_original_is_refused() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("locked.jpg");
        fs::write(&path, b"old").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).unwrap();

        let err = write_atomically(&path, b"new").unwrap_err();
        assert!(matches!(err, TransformError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied));
        assert_eq!(fs::read(&path).unwrap(), b"old");
    }
}
