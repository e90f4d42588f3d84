//! Shared test utilities: synthetic images in every supported container.
//!
//! Nothing here reads fixtures from disk. Images are generated with a simple
//! gradient so resampling has something to chew on.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("scan.jpg");
//! write_jpeg(&path, 400, 300, 85);
//! ```

use crate::imaging::encode::encode;
use crate::imaging::{SaveParams, TiffCompression};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use std::path::Path;

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

// =========================================================================
// In-memory encoders
// =========================================================================

/// Baseline JPEG saved at `quality`.
pub fn encode_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// 8-bit RGB PNG with a `tRNS` key (6 bytes) and `tEXt` chunks.
pub fn encode_png_with_trns(width: u32, height: u32, trns: &[u8], text: &[(&str, &str)]) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_trns(trns.to_vec());
        for (key, value) in text {
            encoder
                .add_text_chunk(key.to_string(), value.to_string())
                .unwrap();
        }
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(img.as_raw()).unwrap();
    }
    buf
}

/// 8-bit indexed PNG. `trns` may be empty; `indices` is row-major.
pub fn encode_indexed_png(width: u32, height: u32, plte: &[u8], trns: &[u8], indices: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_palette(plte.to_vec());
        if !trns.is_empty() {
            encoder.set_trns(trns.to_vec());
        }
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(indices).unwrap();
    }
    buf
}

/// RGB TIFF with the given compression and ASCII tags.
pub fn encode_tiff(width: u32, height: u32, compression: TiffCompression, tags: &[(u16, &str)]) -> Vec<u8> {
    let params = SaveParams::Tiff {
        compression,
        tags: tags.iter().map(|(code, v)| (*code, v.to_string())).collect(),
    };
    encode(&DynamicImage::ImageRgb8(gradient(width, height)), &params, 72).unwrap()
}

// =========================================================================
// On-disk fixtures
// =========================================================================

pub fn write_jpeg(path: &Path, width: u32, height: u32, quality: u8) {
    std::fs::write(path, encode_jpeg(width, height, quality)).unwrap();
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    gradient(width, height).save(path).unwrap();
}

pub fn write_tiff(path: &Path, width: u32, height: u32, compression: TiffCompression) {
    std::fs::write(path, encode_tiff(width, height, compression, &[])).unwrap();
}
