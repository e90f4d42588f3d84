//! High-level canvas operations combining calculations and pixel work.

use super::calculations::{center_offset, effective_canvas, fit_dimensions};
use super::canvas::compose_centered;
use crate::types::TargetSize;
use image::DynamicImage;
use image::imageops::FilterType;

/// Geometry for placing one source on its canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasPlan {
    pub source: (u32, u32),
    /// Canvas after the orientation swap.
    pub canvas: (u32, u32),
    pub scaled: (u32, u32),
    pub offset: (u32, u32),
}

impl CanvasPlan {
    pub fn needs_resize(&self) -> bool {
        self.scaled != self.source
    }
}

/// Compute the canvas, scaled size and placement for a source of `source` size.
pub fn plan(source: (u32, u32), target: TargetSize) -> CanvasPlan {
    let canvas = effective_canvas(source, (target.width, target.height));
    let scaled = fit_dimensions(source, canvas);
    CanvasPlan {
        source,
        canvas,
        scaled,
        offset: center_offset(canvas, scaled),
    }
}

/// Scale `img` per `plan` (Lanczos3) and center it on a white canvas.
///
/// Takes the decoded image by value so the full-resolution buffer is freed as
/// soon as the scaled copy exists.
pub fn render(img: DynamicImage, plan: &CanvasPlan, blend: bool) -> DynamicImage {
    let scaled = if plan.needs_resize() {
        let resized = img.resize_exact(plan.scaled.0, plan.scaled.1, FilterType::Lanczos3);
        drop(img);
        resized
    } else {
        img
    };
    let blend = blend || scaled.color().has_alpha();
    compose_centered(&scaled, plan.canvas, blend)
}
