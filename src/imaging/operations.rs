//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::fit_within_bounds;
use super::params::{CompressParams, ResizeParams};
use crate::types::ImageAsset;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, source: &[u8]) -> Result<(u32, u32)> {
    let Dimensions { width, height } = backend.identify(source)?;
    Ok((width, height))
}

/// An intake image after compression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub asset: ImageAsset,
    /// Natural size of the source image.
    pub original: (u32, u32),
    pub width: u32,
    pub height: u32,
    /// Encoded size in bytes, before base64.
    pub encoded_len: usize,
}

/// Plan the resize for a source of the given size without executing it.
pub fn plan_compression(original: (u32, u32), params: &CompressParams) -> ResizeParams {
    let (width, height) = fit_within_bounds(original, params.bounds);
    ResizeParams {
        width,
        height,
        quality: params.quality,
    }
}

/// Compress one intake image: identify, fit inside the bounds, re-encode,
/// and wrap the result as a data-URL [`ImageAsset`].
pub fn compress_image(
    backend: &impl ImageBackend,
    source: &[u8],
    params: &CompressParams,
) -> Result<CompressedImage> {
    let original = get_dimensions(backend, source)?;
    let resize = plan_compression(original, params);
    let encoded = backend.resize(source, &resize)?;

    tracing::debug!(
        from = ?original,
        to = ?(encoded.width, encoded.height),
        bytes = encoded.bytes.len(),
        "compressed intake image"
    );

    Ok(CompressedImage {
        asset: ImageAsset::from_bytes(encoded.media_type, &encoded.bytes),
        original,
        width: encoded.width,
        height: encoded.height,
        encoded_len: encoded.bytes.len(),
    })
}
