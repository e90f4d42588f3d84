//! Palette PNGs kept as palette PNGs.
//!
//! The `image` decoder expands indices to RGB(A). Indexed sources are read
//! with the `png` decoder instead, scaled by nearest-neighbour sampling (an
//! index has no meaningful average), and padded with the palette's white
//! entry.

use super::backend::TransformError;
use super::operations::CanvasPlan;
use super::params::Palette;
use image::{GrayImage, Luma, imageops};
use std::io::Cursor;

/// Decode an indexed PNG to one palette index per pixel.
pub fn decode_indices(bytes: &[u8]) -> Result<GrayImage, TransformError> {
    let decode_error = |e: png::DecodingError| TransformError::Decode(e.to_string());

    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::IDENTITY);
    decoder.set_limits(png::Limits { bytes: usize::MAX });
    let mut reader = decoder.read_info().map_err(decode_error)?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).map_err(decode_error)?;
    if frame.color_type != png::ColorType::Indexed {
        return Err(TransformError::Decode("expected an indexed PNG".into()));
    }

    let depth = frame.bit_depth as u8 as usize;
    let mask = ((1u16 << depth) - 1) as u8;
    let (width, height) = (frame.width as usize, frame.height as usize);
    let mut indices = Vec::with_capacity(width * height);
    for row in buf.chunks_exact(frame.line_size).take(height) {
        for x in 0..width {
            let bit = x * depth;
            let shift = 8 - depth - bit % 8;
            indices.push((row[bit / 8] >> shift) & mask);
        }
    }
    GrayImage::from_raw(frame.width, frame.height, indices)
        .ok_or_else(|| TransformError::Decode("index data shorter than the image".into()))
}

/// Nearest-neighbour resample, sampling each target pixel's center.
pub fn resize_nearest(src: &GrayImage, size: (u32, u32)) -> GrayImage {
    let (sw, sh) = (u64::from(src.width()), u64::from(src.height()));
    let (w, h) = (u64::from(size.0), u64::from(size.1));
    GrayImage::from_fn(size.0, size.1, |x, y| {
        let sx = ((2 * u64::from(x) + 1) * sw / (2 * w)) as u32;
        let sy = ((2 * u64::from(y) + 1) * sh / (2 * h)) as u32;
        *src.get_pixel(sx, sy)
    })
}

/// Scale `indices` per `plan` and center them on a canvas of the white entry.
///
/// May append a white entry to `palette`.
pub fn render_indexed(indices: GrayImage, plan: &CanvasPlan, palette: &mut Palette) -> GrayImage {
    let white = palette.white_index();
    let scaled = if plan.needs_resize() {
        let resized = resize_nearest(&indices, plan.scaled);
        drop(indices);
        resized
    } else {
        indices
    };

    let mut canvas = GrayImage::from_pixel(plan.canvas.0, plan.canvas.1, Luma([white]));
    imageops::replace(
        &mut canvas,
        &scaled,
        i64::from(plan.offset.0),
        i64::from(plan.offset.1),
    );
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::operations::plan;
    use crate::test_helpers::encode_indexed_png;
    use crate::types::TargetSize;

    #[test]
    fn eight_bit_indices_are_kept() {
        let bytes = encode_indexed_png(3, 2, &[0, 0, 0, 9, 9, 9, 50, 50, 50], &[], &[0, 1, 2, 2, 1, 0]);
        let indices = decode_indices(&bytes).unwrap();
        assert_eq!(indices.dimensions(), (3, 2));
        assert_eq!(indices.as_raw(), &vec![0, 1, 2, 2, 1, 0]);
    }

    #[test]
    fn packed_indices_are_unpacked() {
        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, 5, 1);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Two);
            encoder.set_palette(vec![0u8; 12]);
            let mut writer = encoder.write_header().unwrap();
            // 0 1 2 3 | 2 (padded)
            writer.write_image_data(&[0b00_01_10_11, 0b10_00_00_00]).unwrap();
        }
        let indices = decode_indices(&buf).unwrap();
        assert_eq!(indices.as_raw(), &vec![0, 1, 2, 3, 2]);
    }

    #[test]
    fn truecolor_png_is_rejected() {
        let mut buf = Vec::new();
        image::RgbImage::new(2, 2)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        assert!(matches!(decode_indices(&buf), Err(TransformError::Decode(_))));
    }

    #[test]
    fn nearest_never_invents_indices() {
        let src = GrayImage::from_fn(4, 4, |x, _| Luma([if x < 2 { 3 } else { 7 }]));
        let up = resize_nearest(&src, (10, 9));
        assert!(up.pixels().all(|p| p.0[0] == 3 || p.0[0] == 7));
        let down = resize_nearest(&src, (2, 2));
        assert_eq!(down.as_raw(), &vec![3, 7, 3, 7]);
    }

    #[test]
    fn canvas_is_padded_with_white_entry() {
        let mut palette = Palette::from_chunks(&[0, 0, 0, 255, 0, 0], None);
        let indices = GrayImage::from_pixel(2, 4, Luma([1]));
        let geometry = plan((2, 4), TargetSize { width: 4, height: 4, dpi: 72 });

        let canvas = render_indexed(indices, &geometry, &mut palette);
        assert_eq!(canvas.dimensions(), (4, 4));
        assert_eq!(palette.entries[2], [255, 255, 255]);
        assert_eq!(canvas.get_pixel(0, 0), &Luma([2]));
        assert_eq!(canvas.get_pixel(1, 1), &Luma([1]));
        assert_eq!(canvas.get_pixel(3, 3), &Luma([2]));
    }
}
