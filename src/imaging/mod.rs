//! Image processing in pure Rust, with no system libraries.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG, TIFF) |
//! | **Save parameters** | `png` / `tiff` headers, JPEG quantization tables |
//! | **Fit** | Lanczos3 `resize_exact` to the scale-to-fit size |
//! | **Pad** | white canvas in the source's pixel layout |
//! | **Palette PNG** | indices kept, nearest-neighbour, white palette entry |
//! | **Encode** | `image` JPEG encoder, `png` encoder, `tiff` encoder |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for canvas geometry (unit testable)
//! - **Parameters**: Per-container save parameters
//! - **Backend**: [`ImageTransform`] trait + [`RustTransform`]
//! - **Operations**: Plan and render combining calculations + pixel work

pub mod backend;
mod calculations;
mod canvas;
pub mod encode;
mod indexed;
pub mod metadata;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{ImageTransform, TransformError};
pub use calculations::{center_offset, effective_canvas, fit_dimensions};
pub use canvas::compose_centered;
pub use operations::{CanvasPlan, plan, render};
pub use params::{Palette, Quality, SaveParams, TextField, TiffCompression};
pub use rust_backend::{RustTransform, normalize_file};
