use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;

use crate::error::CoreError;

pub const DEFAULT_JPEG_QUALITY: u8 = 85;
const NORMALIZED_MIME_TYPE: &str = "image/jpeg";

/// Raw screenshot bytes as the user supplied them, in any decodable format.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub label: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ImagePayload")
            .field("label", &self.label)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// An image re-encoded as RGB JPEG, ready to embed in a completion request.
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

impl NormalizedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

impl fmt::Debug for NormalizedImage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NormalizedImage")
            .field("mime_type", &self.mime_type)
            .field("data", &self.data.len())
            .finish()
    }
}

pub fn normalize_image(payload: &ImagePayload, quality: u8) -> Result<NormalizedImage, CoreError> {
    let decoded = image::load_from_memory(&payload.bytes).map_err(|error| {
        CoreError::InvalidInput(format!(
            "failed to decode image `{}`: {error}",
            payload.label
        ))
    })?;
    let rgb = decoded.to_rgb8();

    let mut data = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100));
    encoder.encode_image(&rgb).map_err(|error| {
        CoreError::InvalidInput(format!(
            "failed to re-encode image `{}` as JPEG: {error}",
            payload.label
        ))
    })?;

    Ok(NormalizedImage {
        mime_type: NORMALIZED_MIME_TYPE,
        data,
    })
}
