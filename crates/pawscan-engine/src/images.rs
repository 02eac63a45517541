use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pawscan_contracts::error::ImageError;
use pawscan_contracts::images::{ImagePayload, ImageSource};
use sha2::{Digest, Sha256};

/// Encodes raw bytes under a declared MIME type.
pub fn encode_bytes(mime_type: &str, bytes: &[u8]) -> ImagePayload {
    ImagePayload {
        mime_type: mime_type.to_string(),
        data: BASE64.encode(bytes),
    }
}

/// Splits `data:<mime>;base64,<payload>` into its parts.
///
/// The whole string must match: a non-empty MIME type without `;`, the
/// literal `;base64,` marker and a non-empty standard base64 body.
pub fn decode_data_uri(uri: &str) -> Result<ImagePayload, ImageError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or(ImageError::InvalidImageFormat)?;
    let (mime_type, data) = rest
        .split_once(";base64,")
        .ok_or(ImageError::InvalidImageFormat)?;
    if mime_type.is_empty() || mime_type.contains(';') || data.is_empty() {
        return Err(ImageError::InvalidImageFormat);
    }
    BASE64
        .decode(data.as_bytes())
        .map_err(|_| ImageError::InvalidImageFormat)?;
    Ok(ImagePayload {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

pub fn encode(source: &ImageSource) -> Result<ImagePayload, ImageError> {
    match source {
        ImageSource::DataUri(uri) => decode_data_uri(uri),
        ImageSource::Bytes { mime_type, bytes } => {
            let mime_type = match mime_type.as_deref().map(str::trim) {
                Some(declared) if !declared.is_empty() => declared.to_string(),
                _ => sniff_mime(bytes).ok_or(ImageError::UnknownImageType(bytes.len()))?,
            };
            Ok(encode_bytes(&mime_type, bytes))
        }
    }
}

/// Encodes every source, preserving order. Fails on the first bad image.
pub fn encode_all(sources: &[ImageSource]) -> Result<Vec<ImagePayload>, ImageError> {
    sources.iter().map(encode).collect()
}

pub fn sniff_mime(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// Reads an image file into a source, declaring the MIME type from the
/// extension when it is recognised.
pub fn source_from_path(path: &Path) -> Result<ImageSource> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    Ok(ImageSource::Bytes {
        mime_type: mime_for_path(path).map(str::to_string),
        bytes,
    })
}

/// Short content hash used to refer to an upload in logs without copying it.
pub fn fingerprint(source: &ImageSource) -> String {
    let mut hasher = Sha256::new();
    match source {
        ImageSource::DataUri(uri) => hasher.update(uri.as_bytes()),
        ImageSource::Bytes { bytes, .. } => hasher.update(bytes),
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
}
