//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Bounds;

/// Calculate the output size of an intake image.
///
/// Landscape images (width strictly greater than height) are limited by
/// `max_width`; square and portrait images by `max_height`. A single factor
/// is applied to both axes, so the aspect ratio is kept. The limited axis
/// lands exactly on the bound and the other axis is rounded. Images already
/// inside the bounds keep their size; nothing is upscaled.
///
/// # Examples
/// ```
/// # use carlot::imaging::{Bounds, fit_within_bounds};
/// let bounds = Bounds::default();
/// assert_eq!(fit_within_bounds((1600, 1200), bounds), (800, 600));
/// assert_eq!(fit_within_bounds((900, 1200), bounds), (450, 600));
/// assert_eq!(fit_within_bounds((640, 480), bounds), (640, 480));
/// ```
pub fn fit_within_bounds(original: (u32, u32), bounds: Bounds) -> (u32, u32) {
    let (w, h) = original;

    if w > h {
        if w > bounds.max_width {
            let ratio = bounds.max_width as f64 / w as f64;
            return (bounds.max_width, scale_axis(h, ratio));
        }
    } else if h > bounds.max_height {
        let ratio = bounds.max_height as f64 / h as f64;
        return (scale_axis(w, ratio), bounds.max_height);
    }

    (w, h)
}

fn scale_axis(value: u32, ratio: f64) -> u32 {
    ((value as f64 * ratio).round() as u32).max(1)
}
