//! Pure calculation functions for canvas geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Canvas dimensions after matching the source orientation.
///
/// A landscape source (`width > height`) gets a landscape canvas and a portrait
/// source a portrait canvas, swapping the nominal target if needed. Square
/// sources and square targets never swap.
///
/// # Examples
/// ```
/// # use canvasfit::imaging::effective_canvas;
/// // Landscape photo, letter portrait target → landscape canvas
/// assert_eq!(effective_canvas((3000, 2000), (1700, 2200)), (2200, 1700));
/// // Portrait photo keeps the portrait target
/// assert_eq!(effective_canvas((2000, 3000), (1700, 2200)), (1700, 2200));
/// ```
pub fn effective_canvas(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let source_landscape = src_w > src_h;
    let source_portrait = src_h > src_w;
    let target_landscape = tgt_w > tgt_h;
    let target_portrait = tgt_h > tgt_w;

    if (source_landscape && target_portrait) || (source_portrait && target_landscape) {
        (tgt_h, tgt_w)
    } else {
        (tgt_w, tgt_h)
    }
}

/// Uniform scale-to-fit dimensions of `source` inside `canvas`.
///
/// Scale is `min(canvas_w / src_w, canvas_h / src_h)` with no ceiling, so small
/// sources are enlarged. Results are floored and never below 1px.
///
/// # Examples
/// ```
/// # use canvasfit::imaging::fit_dimensions;
/// // 4:3 landscape into 2200x1700: width-bound at 0.55
/// assert_eq!(fit_dimensions((4000, 3000), (2200, 1700)), (2200, 1650));
/// ```
pub fn fit_dimensions(source: (u32, u32), canvas: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (canvas_w, canvas_h) = canvas;
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }

    let scale_w = f64::from(canvas_w) / f64::from(src_w);
    let scale_h = f64::from(canvas_h) / f64::from(src_h);
    let scale = scale_w.min(scale_h);

    let fit = |orig: u32, bound: u32| -> u32 {
        // Exact products must not lose a pixel to float error.
        let scaled = (f64::from(orig) * scale + 1e-9).floor() as u32;
        scaled.clamp(1, bound.max(1))
    };

    (fit(src_w, canvas_w), fit(src_h, canvas_h))
}

/// Top-left offset that centers `inner` on `outer` (floor division).
///
/// Any odd leftover pixel goes to the right/bottom margin.
pub fn center_offset(outer: (u32, u32), inner: (u32, u32)) -> (u32, u32) {
    (
        outer.0.saturating_sub(inner.0) / 2,
        outer.1.saturating_sub(inner.1) / 2,
    )
}
