//! In-memory re-encoding into the source container.
//!
//! | Container | Encoder | Preserved | Resolution stamp |
//! |---|---|---|---|
//! | JPEG | `image::codecs::jpeg::JpegEncoder` | quality | JFIF density (dpi) |
//! | PNG | `png::Encoder`, best compression | `tRNS` key or palette, text chunks | `pHYs` (pixels/metre) |
//! | TIFF | `tiff::encoder::TiffEncoder` | compression, ASCII tags | X/YResolution, inch |
//!
//! Everything is encoded to a `Vec<u8>`; writing to disk is the caller's job.

use super::backend::TransformError;
use super::params::{Palette, Quality, SaveParams, TextField, TiffCompression};
use image::{DynamicImage, ExtendedColorType, GrayImage};
use std::borrow::Cow;
use std::io::{Cursor, Seek, Write};
use tracing::warn;

/// Encode `img` per `params`, stamping `dpi` as the output resolution.
pub fn encode(img: &DynamicImage, params: &SaveParams, dpi: u32) -> Result<Vec<u8>, TransformError> {
    match params {
        SaveParams::Jpeg { quality } => encode_jpeg(img, *quality, dpi),
        SaveParams::Png {
            transparency, text, ..
        } => encode_png(img, transparency.as_deref(), text, dpi),
        SaveParams::Tiff { compression, tags } => encode_tiff(img, *compression, tags, dpi),
        SaveParams::Other => Err(TransformError::Encode(
            "no encoder for this container".into(),
        )),
    }
}

// =============================================================================
// JPEG
// =============================================================================

fn encode_jpeg(img: &DynamicImage, quality: Quality, dpi: u32) -> Result<Vec<u8>, TransformError> {
    use image::codecs::jpeg::{JpegEncoder, PixelDensity};

    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.value());
        encoder.set_pixel_density(PixelDensity::dpi(dpi.min(u32::from(u16::MAX)) as u16));

        // Baseline JPEG has no alpha: grey stays grey, everything else goes RGB.
        let result = if is_grey(img) {
            let grey = img.to_luma8();
            encoder.encode(grey.as_raw(), grey.width(), grey.height(), ExtendedColorType::L8)
        } else {
            let rgb = img.to_rgb8();
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        };
        result.map_err(|e| TransformError::Encode(format!("JPEG: {e}")))?;
    }
    Ok(buf)
}

fn is_grey(img: &DynamicImage) -> bool {
    matches!(
        img,
        DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
    )
}

// =============================================================================
// PNG
// =============================================================================

/// 1 inch = 0.0254 m.
pub fn dpi_to_pixels_per_metre(dpi: u32) -> u32 {
    (f64::from(dpi) / 0.0254).round() as u32
}

fn encode_png(
    img: &DynamicImage,
    transparency: Option<&[u8]>,
    text: &[TextField],
    dpi: u32,
) -> Result<Vec<u8>, TransformError> {
    // A key only makes sense without an alpha channel. The composite is opaque,
    // so drop alpha back to the key's layout (2 bytes grey, 6 bytes RGB).
    let img: Cow<'_, DynamicImage> = match transparency.map(<[u8]>::len) {
        Some(6) => Cow::Owned(without_alpha(img, false)),
        Some(2) => Cow::Owned(without_alpha(img, true)),
        _ => Cow::Borrowed(img),
    };
    let transparency = transparency.filter(|key| matches!(key.len(), 2 | 6));

    let (color, depth, data) = png_layout(&img);
    write_png(
        PngFrame {
            size: (img.width(), img.height()),
            color,
            depth,
            plte: None,
            trns: transparency,
            data: &data,
        },
        text,
        dpi,
    )
}

/// Encode 8-bit palette indices with their color table.
pub fn encode_indexed(
    indices: &GrayImage,
    palette: &Palette,
    text: &[TextField],
    dpi: u32,
) -> Result<Vec<u8>, TransformError> {
    let plte = palette.plte();
    write_png(
        PngFrame {
            size: indices.dimensions(),
            color: png::ColorType::Indexed,
            depth: png::BitDepth::Eight,
            plte: Some(&plte),
            trns: palette.trns(),
            data: indices.as_raw(),
        },
        text,
        dpi,
    )
}

/// Header fields and raw sample bytes for one PNG.
struct PngFrame<'a> {
    size: (u32, u32),
    color: png::ColorType,
    depth: png::BitDepth,
    plte: Option<&'a [u8]>,
    trns: Option<&'a [u8]>,
    data: &'a [u8],
}

fn write_png(frame: PngFrame<'_>, text: &[TextField], dpi: u32) -> Result<Vec<u8>, TransformError> {
    let png_error = |e: png::EncodingError| TransformError::Encode(format!("PNG: {e}"));
    let ppm = dpi_to_pixels_per_metre(dpi);

    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, frame.size.0, frame.size.1);
        encoder.set_color(frame.color);
        encoder.set_depth(frame.depth);
        encoder.set_compression(png::Compression::Best);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
        if let Some(plte) = frame.plte {
            encoder.set_palette(plte);
        }
        if let Some(trns) = frame.trns {
            encoder.set_trns(trns);
        }
        for field in text {
            let added = if is_latin1(&field.value) {
                encoder.add_text_chunk(field.key.clone(), field.value.clone())
            } else {
                encoder.add_itxt_chunk(field.key.clone(), field.value.clone())
            };
            if let Err(e) = added {
                warn!("Dropping PNG text chunk {:?}: {e}", field.key);
            }
        }

        let mut writer = encoder.write_header().map_err(png_error)?;
        writer.write_image_data(frame.data).map_err(png_error)?;
        writer.finish().map_err(png_error)?;
    }
    Ok(buf)
}

fn is_latin1(s: &str) -> bool {
    s.chars().all(|c| u32::from(c) <= 0xFF)
}

fn without_alpha(img: &DynamicImage, grey: bool) -> DynamicImage {
    let sixteen = matches!(
        img,
        DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_)
    );
    match (grey, sixteen) {
        (true, true) => DynamicImage::ImageLuma16(img.to_luma16()),
        (true, false) => DynamicImage::ImageLuma8(img.to_luma8()),
        (false, true) => DynamicImage::ImageRgb16(img.to_rgb16()),
        (false, false) => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

/// PNG color type, bit depth and raw (big-endian for 16-bit) sample bytes.
fn png_layout(img: &DynamicImage) -> (png::ColorType, png::BitDepth, Cow<'_, [u8]>) {
    use png::{BitDepth, ColorType};
    match img {
        DynamicImage::ImageLuma8(b) => (ColorType::Grayscale, BitDepth::Eight, Cow::Borrowed(b.as_raw())),
        DynamicImage::ImageLumaA8(b) => (ColorType::GrayscaleAlpha, BitDepth::Eight, Cow::Borrowed(b.as_raw())),
        DynamicImage::ImageRgb8(b) => (ColorType::Rgb, BitDepth::Eight, Cow::Borrowed(b.as_raw())),
        DynamicImage::ImageRgba8(b) => (ColorType::Rgba, BitDepth::Eight, Cow::Borrowed(b.as_raw())),
        DynamicImage::ImageLuma16(b) => (ColorType::Grayscale, BitDepth::Sixteen, Cow::Owned(be_bytes(b.as_raw()))),
        DynamicImage::ImageLumaA16(b) => (ColorType::GrayscaleAlpha, BitDepth::Sixteen, Cow::Owned(be_bytes(b.as_raw()))),
        DynamicImage::ImageRgb16(b) => (ColorType::Rgb, BitDepth::Sixteen, Cow::Owned(be_bytes(b.as_raw()))),
        DynamicImage::ImageRgba16(b) => (ColorType::Rgba, BitDepth::Sixteen, Cow::Owned(be_bytes(b.as_raw()))),
        other if other.color().has_alpha() => {
            (ColorType::Rgba, BitDepth::Eight, Cow::Owned(other.to_rgba8().into_raw()))
        }
        other => (ColorType::Rgb, BitDepth::Eight, Cow::Owned(other.to_rgb8().into_raw())),
    }
}

fn be_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

// =============================================================================
// TIFF
// =============================================================================

fn encode_tiff(
    img: &DynamicImage,
    compression: TiffCompression,
    tags: &[(u16, String)],
    dpi: u32,
) -> Result<Vec<u8>, TransformError> {
    use tiff::encoder::TiffEncoder;
    use tiff::encoder::compression::{Deflate, Lzw, Packbits, Uncompressed};

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).map_err(tiff_error)?;
        let written = match compression {
            TiffCompression::Uncompressed => write_tiff(&mut encoder, img, Uncompressed, tags, dpi),
            TiffCompression::Lzw => write_tiff(&mut encoder, img, Lzw, tags, dpi),
            TiffCompression::Deflate => write_tiff(&mut encoder, img, Deflate::default(), tags, dpi),
            TiffCompression::PackBits => write_tiff(&mut encoder, img, Packbits, tags, dpi),
        };
        written.map_err(tiff_error)?;
    }
    Ok(cursor.into_inner())
}

fn tiff_error(e: tiff::TiffError) -> TransformError {
    TransformError::Encode(format!("TIFF: {e}"))
}

fn write_tiff<W, D>(
    encoder: &mut tiff::encoder::TiffEncoder<W>,
    img: &DynamicImage,
    compression: D,
    tags: &[(u16, String)],
    dpi: u32,
) -> tiff::TiffResult<()>
where
    W: Write + Seek,
    D: tiff::encoder::compression::Compression,
{
    use tiff::encoder::colortype::{Gray8, Gray16, RGB8, RGB16, RGBA8, RGBA16};

    let (w, h) = (img.width(), img.height());
    match img {
        DynamicImage::ImageLuma8(b) => write_plane::<_, Gray8, _>(encoder, w, h, b.as_raw(), compression, tags, dpi),
        DynamicImage::ImageLuma16(b) => write_plane::<_, Gray16, _>(encoder, w, h, b.as_raw(), compression, tags, dpi),
        DynamicImage::ImageRgb8(b) => write_plane::<_, RGB8, _>(encoder, w, h, b.as_raw(), compression, tags, dpi),
        DynamicImage::ImageRgb16(b) => write_plane::<_, RGB16, _>(encoder, w, h, b.as_raw(), compression, tags, dpi),
        DynamicImage::ImageRgba8(b) => write_plane::<_, RGBA8, _>(encoder, w, h, b.as_raw(), compression, tags, dpi),
        DynamicImage::ImageRgba16(b) => write_plane::<_, RGBA16, _>(encoder, w, h, b.as_raw(), compression, tags, dpi),
        // No grey+alpha colortype in the encoder.
        DynamicImage::ImageLumaA16(_) => {
            let rgba = img.to_rgba16();
            write_plane::<_, RGBA16, _>(encoder, w, h, rgba.as_raw(), compression, tags, dpi)
        }
        other if other.color().has_alpha() => {
            let rgba = other.to_rgba8();
            write_plane::<_, RGBA8, _>(encoder, w, h, rgba.as_raw(), compression, tags, dpi)
        }
        other => {
            let rgb = other.to_rgb8();
            write_plane::<_, RGB8, _>(encoder, w, h, rgb.as_raw(), compression, tags, dpi)
        }
    }
}

fn write_plane<W, C, D>(
    encoder: &mut tiff::encoder::TiffEncoder<W>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    compression: D,
    tags: &[(u16, String)],
    dpi: u32,
) -> tiff::TiffResult<()>
where
    W: Write + Seek,
    C: tiff::encoder::colortype::ColorType,
    [C::Inner]: tiff::encoder::TiffValue,
    D: tiff::encoder::compression::Compression,
{
    use tiff::encoder::Rational;
    use tiff::tags::{ResolutionUnit, Tag};

    let mut image = encoder.new_image_with_compression::<C, D>(width, height, compression)?;
    image.resolution(ResolutionUnit::Inch, Rational { n: dpi, d: 1 });
    for (code, value) in tags {
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(*code), value.as_str())?;
    }
    image.write_data(data)
}
