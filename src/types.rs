//! Shared types used across the intake pipeline, listings and the viewer.
//!
//! [`ImageAsset`] is the one value that crosses every boundary: the intake
//! pipeline produces it, a listing stores it under `imagesData`, and the
//! gallery viewer displays it. It serializes as a plain JSON string.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AssetError {
    #[error("not a data URL")]
    NotDataUrl,
    #[error("data URL is not base64 encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// One encoded, display-ready image: a `data:<type>;base64,<payload>` URL.
///
/// Assets have no lifecycle of their own. They are created at upload time
/// and disappear when removed from their listing or when the listing is
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageAsset(String);

impl ImageAsset {
    /// Wrap encoded image bytes as a base64 data URL.
    pub fn from_bytes(media_type: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{media_type};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Length of the textual payload, which is what the document store pays for.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into (header, payload) around the first comma of a data URL.
    fn parts(&self) -> Result<(&str, &str), AssetError> {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or(AssetError::NotDataUrl)
    }

    /// The declared media type, e.g. `image/jpeg`.
    pub fn media_type(&self) -> Option<&str> {
        let (header, _) = self.parts().ok()?;
        let media = header.split(';').next().unwrap_or_default();
        (!media.is_empty()).then_some(media)
    }

    /// Decode the base64 payload back into image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, AssetError> {
        let (header, payload) = self.parts()?;
        if !header.split(';').any(|p| p == "base64") {
            return Err(AssetError::NotBase64);
        }
        Ok(STANDARD.decode(payload.trim())?)
    }

    /// Whether a renderer has a chance of drawing this asset: the payload
    /// decodes and starts with a known raster image signature.
    pub fn is_renderable(&self) -> bool {
        self.decode()
            .ok()
            .is_some_and(|bytes| image::guess_format(&bytes).is_ok())
    }
}

impl From<String> for ImageAsset {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ImageAsset {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn from_bytes_builds_data_url() {
        let asset = ImageAsset::from_bytes("image/jpeg", b"abc");
        assert_eq!(asset.as_str(), "data:image/jpeg;base64,YWJj");
        assert_eq!(asset.media_type(), Some("image/jpeg"));
    }

    #[test]
    fn decode_returns_original_bytes() {
        let asset = ImageAsset::from_bytes("image/jpeg", JPEG_MAGIC);
        assert_eq!(asset.decode().unwrap(), JPEG_MAGIC);
    }

    #[test]
    fn plain_url_is_not_a_data_url() {
        let asset = ImageAsset::from("https://example.com/car.jpg");
        assert_eq!(asset.decode(), Err(AssetError::NotDataUrl));
        assert_eq!(asset.media_type(), None);
        assert!(!asset.is_renderable());
    }

    #[test]
    fn non_base64_data_url_is_rejected() {
        let asset = ImageAsset::from("data:text/plain,hello");
        assert_eq!(asset.decode(), Err(AssetError::NotBase64));
    }

    #[test]
    fn corrupt_base64_is_not_renderable() {
        let asset = ImageAsset::from("data:image/jpeg;base64,@@@not-base64@@@");
        assert!(matches!(asset.decode(), Err(AssetError::Base64(_))));
        assert!(!asset.is_renderable());
    }

    #[test]
    fn valid_base64_of_non_image_is_not_renderable() {
        let asset = ImageAsset::from_bytes("image/jpeg", b"plain text, not pixels");
        assert!(asset.decode().is_ok());
        assert!(!asset.is_renderable());
    }

    #[test]
    fn jpeg_signature_is_renderable() {
        let asset = ImageAsset::from_bytes("image/jpeg", JPEG_MAGIC);
        assert!(asset.is_renderable());
    }

    #[test]
    fn serializes_as_plain_string() {
        let asset = ImageAsset::from("data:image/png;base64,AAAA");
        let json = serde_json::to_string(&vec![asset.clone()]).unwrap();
        assert_eq!(json, r#"["data:image/png;base64,AAAA"]"#);
        let back: Vec<ImageAsset> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![asset]);
    }
}
