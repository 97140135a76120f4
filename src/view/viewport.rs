//! Base display scale from container geometry.
//!
//! Recomputed on document load, container resize, and any layout change that
//! alters available width (side panel collapse). The renderer displays at
//! `base_scale * zoom_level`.

/// Floor for a recomputed base scale; a container narrower than the margin
/// must not produce a zero or negative scale.
const MIN_BASE_SCALE: f32 = 0.1;

/// Fit the page to the container width, leaving a fixed margin.
pub fn recompute_base_scale(container_width: f32, page_width: f32, fixed_margin: f32) -> f32 {
    if container_width <= 0.0 || page_width <= 0.0 {
        return 1.0;
    }
    ((container_width - fixed_margin) / page_width).max(MIN_BASE_SCALE)
}
