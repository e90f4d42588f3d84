//! Capture of format-specific save parameters from the source bytes.
//!
//! Runs once per file, before decode, against the same in-memory buffer the
//! decoder reads. Every reader here is best-effort: a field that cannot be read
//! falls back to its default rather than failing the file. Pixel decoding is
//! the single authority on whether a file is usable.
//!
//! | Container | Captured |
//! |---|---|
//! | JPEG | quality, estimated from the luminance quantization table |
//! | PNG | `tRNS` key (grey/RGB), `tEXt`/`zTXt`/`iTXt`, `PLTE` for indexed sources |
//! | TIFF | `Compression` (259) and descriptive ASCII tags |

use super::params::{Palette, Quality, SaveParams, TextField, TiffCompression};
use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// Descriptive ASCII TIFF tags carried across a rewrite.
pub const TIFF_TEXT_TAGS: &[u16] = &[
    269,   // DocumentName
    270,   // ImageDescription
    271,   // Make
    272,   // Model
    285,   // PageName
    305,   // Software
    306,   // DateTime
    315,   // Artist
    33432, // Copyright
];

/// Build the [`SaveParams`] for a decoded container.
pub fn capture(format: ImageFormat, bytes: &[u8]) -> SaveParams {
    match format {
        ImageFormat::Jpeg => SaveParams::Jpeg {
            quality: estimate_jpeg_quality(bytes)
                .map(Quality::new)
                .unwrap_or_default(),
        },
        ImageFormat::Png => read_png_params(bytes),
        ImageFormat::Tiff => read_tiff_params(bytes),
        _ => SaveParams::Other,
    }
}

// =============================================================================
// JPEG
// =============================================================================

/// IJG standard luminance table, natural (row-major) order.
const STD_LUMA_QTABLE: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Zigzag position → natural index. DQT segments store tables in zigzag order.
const ZIGZAG_TO_NATURAL: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, //
    12, 19, 26, 33, 40, 48, 41, 34, 27, 20, 13, 6, 7, 14, 21, 28, //
    35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, //
    58, 59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Estimate the IJG quality setting a JPEG was saved with.
///
/// Inverts the libjpeg table scaling on the luminance table (id 0). Returns
/// `None` when no such table precedes the first scan.
pub fn estimate_jpeg_quality(bytes: &[u8]) -> Option<u32> {
    let table = find_luma_qtable(bytes)?;

    let ratio_sum: f64 = table
        .iter()
        .enumerate()
        .map(|(zz, &q)| f64::from(q) * 100.0 / f64::from(STD_LUMA_QTABLE[ZIGZAG_TO_NATURAL[zz]]))
        .sum();
    let scale = ratio_sum / 64.0;

    let quality = if scale <= 100.0 {
        (200.0 - scale) / 2.0
    } else {
        5000.0 / scale
    };
    Some((quality.round() as u32).clamp(1, 100))
}

/// Walk JPEG markers up to SOS and return quantization table 0 (zigzag order).
fn find_luma_qtable(bytes: &[u8]) -> Option<[u16; 64]> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        if marker == 0xFF {
            // fill byte
            pos += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }

        // The length field counts itself.
        let len = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        if len < 2 {
            return None;
        }
        if marker == 0xDB {
            let end = (pos + 2 + len).min(bytes.len());
            if let Some(table) = bytes.get(pos + 4..end).and_then(parse_dqt) {
                return Some(table);
            }
        }
        pos += 2 + len;
    }
    None
}

/// Parse one DQT payload (may hold several tables) and pick table id 0.
fn parse_dqt(mut payload: &[u8]) -> Option<[u16; 64]> {
    while let Some((&pq_tq, rest)) = payload.split_first() {
        let precision_16 = pq_tq >> 4 != 0;
        let id = pq_tq & 0x0F;
        let size = if precision_16 { 128 } else { 64 };
        if rest.len() < size {
            return None;
        }

        if id == 0 {
            let mut table = [0u16; 64];
            for (i, slot) in table.iter_mut().enumerate() {
                *slot = if precision_16 {
                    u16::from_be_bytes([rest[2 * i], rest[2 * i + 1]])
                } else {
                    u16::from(rest[i])
                };
            }
            return Some(table);
        }
        payload = &rest[size..];
    }
    None
}

// =============================================================================
// PNG
// =============================================================================

fn read_png_params(bytes: &[u8]) -> SaveParams {
    let reader = match png::Decoder::new(Cursor::new(bytes)).read_info() {
        Ok(reader) => reader,
        Err(e) => {
            debug!("PNG header unreadable, using defaults: {e}");
            return SaveParams::Png {
                transparency: None,
                text: Vec::new(),
                palette: None,
            };
        }
    };
    let info = reader.info();

    let (transparency, palette) = match info.color_type {
        png::ColorType::Grayscale | png::ColorType::Rgb => (
            info.trns.as_deref().map(|key| widen_trns_key(key, info.bit_depth)),
            None,
        ),
        // Palette tRNS is per-entry alpha, not a key.
        png::ColorType::Indexed => (
            None,
            info.palette
                .as_deref()
                .map(|plte| Palette::from_chunks(plte, info.trns.as_deref())),
        ),
        _ => (None, None),
    };

    let mut text: Vec<TextField> = info
        .uncompressed_latin1_text
        .iter()
        .map(|chunk| TextField::new(&chunk.keyword, &chunk.text))
        .collect();
    for chunk in &info.compressed_latin1_text {
        if let Ok(value) = chunk.get_text() {
            text.push(TextField::new(&chunk.keyword, value));
        }
    }
    for chunk in &info.utf8_text {
        if let Ok(value) = chunk.get_text() {
            text.push(TextField::new(&chunk.keyword, value));
        }
    }

    SaveParams::Png {
        transparency,
        text,
        palette,
    }
}

/// Bring a decoded `tRNS` key back to two big-endian bytes per sample.
///
/// Below 16 bits the decoder keeps one byte per sample, and the `image`
/// decoder hands out such images at 8 bits, so low-depth grey keys are scaled
/// up the same way the pixels are.
fn widen_trns_key(key: &[u8], depth: png::BitDepth) -> Vec<u8> {
    if depth == png::BitDepth::Sixteen {
        return key.to_vec();
    }
    let max = (1u16 << depth as u8) - 1;
    key.iter()
        .flat_map(|&sample| (u16::from(sample).min(max) * 255 / max).to_be_bytes())
        .collect()
}

// =============================================================================
// TIFF
// =============================================================================

fn read_tiff_params(bytes: &[u8]) -> SaveParams {
    use tiff::decoder::Decoder;
    use tiff::tags::Tag;

    let mut compression = TiffCompression::default();
    let mut tags = Vec::new();

    let mut decoder = match Decoder::new(Cursor::new(bytes)) {
        Ok(decoder) => decoder,
        Err(e) => {
            debug!("TIFF header unreadable, using defaults: {e}");
            return SaveParams::Tiff { compression, tags };
        }
    };

    if let Ok(Some(value)) = decoder.find_tag_unsigned::<u16>(Tag::Compression) {
        compression = TiffCompression::from_tag(value);
    }

    for &code in TIFF_TEXT_TAGS {
        let value = decoder
            .find_tag(Tag::from_u16_exhaustive(code))
            .ok()
            .flatten()
            .and_then(|v| v.into_string().ok());
        if let Some(value) = value {
            let value = value.trim_end_matches('\0').to_string();
            // The encoder only writes plain ASCII.
            if !value.is_empty() && value.is_ascii() {
                tags.push((code, value));
            }
        }
    }

    SaveParams::Tiff { compression, tags }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{encode_indexed_png, encode_jpeg, encode_png_with_trns, encode_tiff};

    #[test]
    fn jpeg_quality_estimate_tracks_encoder_setting() {
        for quality in [30u8, 50, 70, 85, 95] {
            let bytes = encode_jpeg(64, 48, quality);
            let estimate = estimate_jpeg_quality(&bytes).unwrap();
            assert!(
                estimate.abs_diff(u32::from(quality)) <= 2,
                "saved at {quality}, estimated {estimate}"
            );
        }
    }

    #[test]
    fn jpeg_capture_uses_estimate() {
        let bytes = encode_jpeg(32, 32, 85);
        match capture(ImageFormat::Jpeg, &bytes) {
            SaveParams::Jpeg { quality } => assert!(quality.value().abs_diff(85) <= 2),
            other => panic!("expected JPEG params, got {other:?}"),
        }
    }

    #[test]
    fn jpeg_without_tables_defaults_to_70() {
        let truncated = [0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02];
        assert_eq!(estimate_jpeg_quality(&truncated), None);
        assert_eq!(
            capture(ImageFormat::Jpeg, &truncated),
            SaveParams::Jpeg {
                quality: Quality::default()
            }
        );
    }

    #[test]
    fn not_a_jpeg_has_no_estimate() {
        assert_eq!(estimate_jpeg_quality(b"\x89PNG\r\n\x1a\n"), None);
        assert_eq!(estimate_jpeg_quality(&[]), None);
    }

    #[test]
    fn short_segment_length_is_rejected() {
        assert_eq!(
            estimate_jpeg_quality(&[0xFF, 0xD8, 0xFF, 0xDB, 0, 0, 0, 0]),
            None
        );
        assert_eq!(estimate_jpeg_quality(&[0xFF, 0xD8, 0xFF, 0xDB, 0, 1]), None);
        assert_eq!(estimate_jpeg_quality(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]), None);
    }

    #[test]
    fn truncated_dqt_has_no_estimate() {
        // length claims 67 bytes, only 3 present
        assert_eq!(
            estimate_jpeg_quality(&[0xFF, 0xD8, 0xFF, 0xDB, 0, 67, 0, 1, 2]),
            None
        );
    }

    #[test]
    fn parse_dqt_picks_table_zero_after_others() {
        let mut payload = vec![0x01];
        payload.extend([99u8; 64]);
        payload.push(0x00);
        payload.extend([7u8; 64]);
        let table = parse_dqt(&payload).unwrap();
        assert!(table.iter().all(|&v| v == 7));
    }

    #[test]
    fn png_captures_transparency_key_and_text() {
        let bytes = encode_png_with_trns(
            8,
            8,
            &[0, 0, 0, 255, 0, 0],
            &[("Title", "scan"), ("Author", "desk 3")],
        );
        match capture(ImageFormat::Png, &bytes) {
            SaveParams::Png {
                transparency,
                text,
                palette,
            } => {
                assert_eq!(transparency, Some(vec![0, 0, 0, 255, 0, 0]));
                assert_eq!(palette, None);
                assert!(text.contains(&TextField::new("Title", "scan")));
                assert!(text.contains(&TextField::new("Author", "desk 3")));
            }
            other => panic!("expected PNG params, got {other:?}"),
        }
    }

    #[test]
    fn garbage_png_falls_back_to_defaults() {
        assert_eq!(
            capture(ImageFormat::Png, b"not a png"),
            SaveParams::Png {
                transparency: None,
                text: Vec::new(),
                palette: None
            }
        );
    }

    #[test]
    fn grey_key_is_widened_to_sixteen_bits() {
        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, 2, 2);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_trns(vec![0, 200]);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[10, 20, 200, 40]).unwrap();
        }
        match capture(ImageFormat::Png, &buf) {
            SaveParams::Png { transparency, .. } => assert_eq!(transparency, Some(vec![0, 200])),
            other => panic!("expected PNG params, got {other:?}"),
        }
    }

    #[test]
    fn low_depth_key_scales_like_pixels() {
        assert_eq!(widen_trns_key(&[1], png::BitDepth::One), vec![0, 255]);
        assert_eq!(widen_trns_key(&[5], png::BitDepth::Four), vec![0, 85]);
        assert_eq!(widen_trns_key(&[7, 8, 9], png::BitDepth::Eight), vec![0, 7, 0, 8, 0, 9]);
        assert_eq!(widen_trns_key(&[1, 2], png::BitDepth::Sixteen), vec![1, 2]);
    }

    #[test]
    fn indexed_png_captures_palette_and_alpha() {
        let bytes = encode_indexed_png(2, 2, &[0, 0, 0, 200, 10, 10], &[0], &[0, 1, 1, 0]);
        match capture(ImageFormat::Png, &bytes) {
            SaveParams::Png {
                transparency,
                palette: Some(palette),
                ..
            } => {
                assert_eq!(transparency, None);
                assert_eq!(palette.entries, vec![[0, 0, 0], [200, 10, 10]]);
                assert_eq!(palette.alpha, vec![0]);
            }
            other => panic!("expected indexed PNG params, got {other:?}"),
        }
    }

    #[test]
    fn tiff_captures_compression_and_tags() {
        let bytes = encode_tiff(16, 12, TiffCompression::Lzw, &[(270, "invoice 42"), (305, "scanner")]);
        match capture(ImageFormat::Tiff, &bytes) {
            SaveParams::Tiff { compression, tags } => {
                assert_eq!(compression, TiffCompression::Lzw);
                assert!(tags.contains(&(270, "invoice 42".to_string())));
                assert!(tags.contains(&(305, "scanner".to_string())));
            }
            other => panic!("expected TIFF params, got {other:?}"),
        }
    }

    #[test]
    fn other_formats_have_no_params() {
        assert_eq!(capture(ImageFormat::Gif, b"GIF89a"), SaveParams::Other);
    }
}
