//! Image processing: pure Rust, in-memory.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` on sniffed bytes |
//! | **Fit** | [`fit_within_bounds`] (800×600 by default, no upscaling) |
//! | **Resize → JPEG** | Triangle filter + `JpegEncoder` at quality 70 |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedImage, ImageBackend};
pub use calculations::fit_within_bounds;
pub use operations::{CompressedImage, compress_image, get_dimensions, plan_compression};
pub use params::{Bounds, CompressParams, Quality, ResizeParams};
pub use rust_backend::{RustBackend, supported_input_extensions};
