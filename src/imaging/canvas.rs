//! White canvases and centered compositing.
//!
//! The canvas always has the pixel layout of the scaled source. White per layout:
//!
//! | Layout | White |
//! |---|---|
//! | `L8` / `La8` | `255` (alpha `255`) |
//! | `L16` / `La16` | `65535` (alpha `65535`) |
//! | `Rgb8` / `Rgba8` | `(255, 255, 255)` (alpha `255`) |
//! | `Rgb16` / `Rgba16` | `(65535, 65535, 65535)` (alpha `65535`) |
//! | `Rgb32F` / `Rgba32F` | `(1.0, 1.0, 1.0)` (alpha `1.0`) |
//!
//! Bilevel and CMYK sources never reach this point in those forms: the
//! decoders expand them to grey or RGB, where the rows above apply. Palette
//! PNGs take a separate path that pads with a palette index.

use super::calculations::center_offset;
use image::{DynamicImage, ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba, imageops};

/// Paste (or alpha-blend) `scaled` centered on a white canvas of `canvas` size.
///
/// `blend` selects alpha-aware compositing; otherwise pixels are copied as-is.
pub fn compose_centered(scaled: &DynamicImage, canvas: (u32, u32), blend: bool) -> DynamicImage {
    use DynamicImage::*;
    match scaled {
        ImageLuma8(b) => ImageLuma8(compose(b, canvas, Luma([u8::MAX]), blend)),
        ImageLumaA8(b) => ImageLumaA8(compose(b, canvas, LumaA([u8::MAX; 2]), blend)),
        ImageRgb8(b) => ImageRgb8(compose(b, canvas, Rgb([u8::MAX; 3]), blend)),
        ImageRgba8(b) => ImageRgba8(compose(b, canvas, Rgba([u8::MAX; 4]), blend)),
        ImageLuma16(b) => ImageLuma16(compose(b, canvas, Luma([u16::MAX]), blend)),
        ImageLumaA16(b) => ImageLumaA16(compose(b, canvas, LumaA([u16::MAX; 2]), blend)),
        ImageRgb16(b) => ImageRgb16(compose(b, canvas, Rgb([u16::MAX; 3]), blend)),
        ImageRgba16(b) => ImageRgba16(compose(b, canvas, Rgba([u16::MAX; 4]), blend)),
        ImageRgb32F(b) => ImageRgb32F(compose(b, canvas, Rgb([1.0; 3]), blend)),
        ImageRgba32F(b) => ImageRgba32F(compose(b, canvas, Rgba([1.0; 4]), blend)),
        other => {
            let rgba = other.to_rgba8();
            ImageRgba8(compose(&rgba, canvas, Rgba([u8::MAX; 4]), true))
        }
    }
}

fn compose<P>(
    scaled: &ImageBuffer<P, Vec<P::Subpixel>>,
    canvas: (u32, u32),
    white: P,
    blend: bool,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel,
{
    let mut out = ImageBuffer::from_pixel(canvas.0, canvas.1, white);
    let (x, y) = center_offset(canvas, scaled.dimensions());
    if blend {
        imageops::overlay(&mut out, scaled, i64::from(x), i64::from(y));
    } else {
        imageops::replace(&mut out, scaled, i64::from(x), i64::from(y));
    }
    out
}
