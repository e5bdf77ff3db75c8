//! Live state snapshot captured once per turn

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Compact capture of the live environment: one stripped structural record
/// (a single JSON line) and a low-fidelity preview image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStateSnapshot {
    #[serde(alias = "jsonl")]
    pub structural_trace: String,
    #[serde(
        alias = "image",
        default,
        serialize_with = "encode_image",
        deserialize_with = "decode_image"
    )]
    pub preview_image: Vec<u8>,
}

impl LiveStateSnapshot {
    pub fn new(structural_trace: impl Into<String>, preview_image: Vec<u8>) -> Self {
        Self {
            structural_trace: structural_trace.into(),
            preview_image,
        }
    }

    /// Preview image as a data URL suitable for multimodal model input.
    pub fn preview_data_url(&self) -> String {
        image_data_url(&self.preview_image)
    }
}

/// Encode image bytes as a `data:` URL, sniffing PNG vs JPEG.
pub fn image_data_url(bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        image_mime(bytes),
        STANDARD.encode(bytes)
    )
}

pub fn image_mime(bytes: &[u8]) -> &'static str {
    const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];
    if bytes.starts_with(&PNG_MAGIC) {
        "image/png"
    } else {
        "image/jpeg"
    }
}

/// Decode base64 image content, accepting an optional `data:*;base64,` prefix.
pub fn decode_base64_image(raw: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match raw.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw,
    };
    STANDARD.decode(payload.trim())
}

fn encode_image<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn decode_image<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    decode_base64_image(&raw).map_err(serde::de::Error::custom)
}
