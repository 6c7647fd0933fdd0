//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Format sniffing | `image::ImageReader::with_guessed_format` |
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image` crate (pure Rust decoders) |
//! | Resize | `DynamicImage::resize_exact` with `Triangle` (bilinear) filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |

use super::backend::{BackendError, Dimensions, EncodedImage, ImageBackend};
use super::params::ResizeParams;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(source: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| BackendError::Decode(format!("Failed to sniff image format: {e}")))
}

/// Decode an image from memory, guessing the format from its magic bytes.
fn load_image(source: &[u8]) -> Result<DynamicImage, BackendError> {
    let reader = reader(source)?;
    if reader.format().is_none() {
        return Err(BackendError::Decode("Unrecognized image format".into()));
    }
    reader
        .decode()
        .map_err(|e| BackendError::Decode(format!("Failed to decode image: {e}")))
}

/// Encode as baseline JPEG. Alpha is dropped; JPEG has no transparency.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, BackendError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(bytes)
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError> {
        let reader = reader(source)?;
        if reader.format().is_none() {
            return Err(BackendError::Decode("Unrecognized image format".into()));
        }
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, source: &[u8], params: &ResizeParams) -> Result<EncodedImage, BackendError> {
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::Encode(format!(
                "Invalid target size {}x{}",
                params.width, params.height
            )));
        }
        let img = load_image(source)?;
        let resized = if img.width() == params.width && img.height() == params.height {
            img
        } else {
            img.resize_exact(params.width, params.height, FilterType::Triangle)
        };
        let bytes = encode_jpeg(&resized, params.quality.value())?;
        Ok(EncodedImage {
            media_type: "image/jpeg",
            bytes,
            width: resized.width(),
            height: resized.height(),
        })
    }
}
