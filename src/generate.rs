//! Payload for the external image-generation service and interpretation of
//! its replies. The transport itself lives outside this crate.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;
use crate::loader::ImageSource;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Base64 PNG of the flattened image.
    pub image: String,
    /// Base64 PNG of the stroke mask; omitted when nothing was drawn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: &str, image_png: &[u8], mask_png: Option<&[u8]>) -> Self {
        Self {
            prompt: prompt.trim().to_string(),
            image: general_purpose::STANDARD.encode(image_png),
            mask: mask_png.map(|m| general_purpose::STANDARD.encode(m)),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation service credentials are missing")]
    MissingCredentials,

    #[error("Request was rejected as unsafe: {0}")]
    UnsafeContent(String),

    #[error("Generation service returned no images")]
    NoOutput,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// One usable result: the image location plus optional descriptive text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedVariant {
    pub image_url: String,
    pub text: Option<String>,
}

impl GeneratedVariant {
    /// Where to load the variant from: inline `data:` URLs are decoded,
    /// `file://` URLs and bare paths are read from disk. Remote URLs need a
    /// fetcher outside this crate and yield `None`.
    pub fn image_source(&self) -> Option<ImageSource> {
        let url = self.image_url.trim();
        if let Some(rest) = url.strip_prefix("data:") {
            let (_, payload) = rest.split_once(";base64,")?;
            return general_purpose::STANDARD
                .decode(payload)
                .ok()
                .map(ImageSource::Bytes);
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return None;
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        Some(ImageSource::Path(path.into()))
    }
}

#[derive(Deserialize)]
struct RawVariant {
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawError {
    kind: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    results: Vec<RawVariant>,
    error: Option<RawError>,
}

/// Turn a JSON reply into the usable variants. Entries without an
/// `imageUrl` are dropped; if none remain the reply counts as no output.
pub fn parse_generation_response(
    body: &str,
) -> std::result::Result<Vec<GeneratedVariant>, GenerationError> {
    let raw: RawResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Transport(e.to_string()))?;

    if let Some(error) = raw.error {
        return Err(match error.kind.as_str() {
            "missing_credentials" => GenerationError::MissingCredentials,
            "unsafe_content" => GenerationError::UnsafeContent(error.message),
            "no_output" => GenerationError::NoOutput,
            _ => GenerationError::Transport(format!("{}: {}", error.kind, error.message)),
        });
    }

    let variants: Vec<GeneratedVariant> = raw
        .results
        .into_iter()
        .filter_map(|v| {
            v.image_url.map(|image_url| GeneratedVariant {
                image_url,
                text: v.text,
            })
        })
        .collect();

    if variants.is_empty() {
        tracing::warn!("generation reply carried no images");
        return Err(GenerationError::NoOutput);
    }
    Ok(variants)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_absent_mask() {
        let request = GenerationRequest::new("  add a hat ", b"png", None);
        let json: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(json["prompt"], "add a hat");
        assert_eq!(json["image"], "cG5n");
        assert!(json.get("mask").is_none());

        let request = GenerationRequest::new("x", b"png", Some(b"m"));
        assert_eq!(request.mask.as_deref(), Some("bQ=="));
    }

    #[test]
    fn variants_without_image_are_dropped() {
        let body = r#"{"results": [
            {"imageUrl": "data:image/png;base64,AAAA", "text": "a hat"},
            {"text": "only words"}
        ]}"#;
        let variants = parse_generation_response(body).unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].text.as_deref(), Some("a hat"));
    }

    #[test]
    fn variant_sources() {
        let variant = |url: &str| GeneratedVariant { image_url: url.into(), text: None };
        assert!(matches!(
            variant("data:image/png;base64,cG5n").image_source(),
            Some(ImageSource::Bytes(bytes)) if bytes == b"png"
        ));
        assert!(matches!(
            variant("file:///tmp/out.png").image_source(),
            Some(ImageSource::Path(path)) if path.ends_with("out.png")
        ));
        assert!(variant("https://example.com/a.png").image_source().is_none());
        assert!(variant("data:image/png,raw").image_source().is_none());
    }

    #[test]
    fn error_taxonomy() {
        let err = |kind: &str| {
            parse_generation_response(&format!(
                r#"{{"error": {{"kind": "{kind}", "message": "nope"}}}}"#
            ))
            .unwrap_err()
        };
        assert_eq!(err("missing_credentials"), GenerationError::MissingCredentials);
        assert_eq!(err("unsafe_content"), GenerationError::UnsafeContent("nope".into()));
        assert_eq!(err("no_output"), GenerationError::NoOutput);
        assert!(matches!(err("quota"), GenerationError::Transport(_)));

        assert_eq!(
            parse_generation_response(r#"{"results": []}"#),
            Err(GenerationError::NoOutput)
        );
        assert!(matches!(
            parse_generation_response("<html>"),
            Err(GenerationError::Transport(_))
        ));
    }
}
