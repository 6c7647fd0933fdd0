//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They sit between
//! [`operations`](super::operations), which decides the target size, and the
//! [`backend`](super::backend), which does the pixel work. Swapping the
//! backend for a mock in tests leaves the operation logic untouched.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 70). Clamped on construction.
//! - [`Bounds`]: Maximum output width and height (default 800×600).
//! - [`CompressParams`]: Bounds + quality for one intake run.
//! - [`ResizeParams`]: Exact target dimensions and quality for a single encode.

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    /// Build from a 0.0–1.0 fraction, the way browser canvas encoders take it.
    pub fn from_fraction(fraction: f32) -> Self {
        Self::new((fraction * 100.0).round() as u32)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(70)
    }
}

/// Largest output dimensions an intake image may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 600,
        }
    }
}

/// Settings for one intake compression run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressParams {
    pub bounds: Bounds,
    pub quality: Quality,
}

/// Parameters for a single resize + encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}
