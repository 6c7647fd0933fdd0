//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the intake pipeline
//! needs: identify (read dimensions from encoded bytes) and resize (decode,
//! resample, re-encode). Everything works on in-memory buffers; the caller
//! owns reading files.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::ResizeParams;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Input bytes are not a raster image we can decode.
    #[error("Decode failed: {0}")]
    Decode(String),
    /// Resampling or encoding the output failed.
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// An encoded output image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// MIME type of `bytes`, e.g. `image/jpeg`.
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Backends must be `Sync`: the intake pipeline fans a batch out over a
/// rayon pool and shares one backend across workers.
pub trait ImageBackend: Sync {
    /// Get image dimensions from encoded bytes.
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode `source`, resample to exactly `params.width × params.height`,
    /// and encode the result.
    fn resize(&self, source: &[u8], params: &ResizeParams) -> Result<EncodedImage, BackendError>;
}
