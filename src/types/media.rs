//! Source-image payloads and mime helpers.

use base64::Engine as _;
use std::path::Path;

use crate::{Error, ErrorContext, Result};

/// A decoded-and-checked reference image, ready to attach to a vendor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Raw base64, without any data-URI prefix.
    pub data: String,
    pub mime_type: String,
}

impl ImagePayload {
    pub const DEFAULT_MIME: &'static str = "image/png";

    /// Parses either a `data:<mime>;base64,<data>` URI or bare base64.
    ///
    /// A mime type embedded in the URI wins over `mime_hint`. Payloads that do
    /// not decode as base64 are rejected as input errors.
    pub fn parse(input: &str, mime_hint: Option<&str>) -> Result<Self> {
        let input = input.trim();
        let (uri_mime, data) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(|| {
                    Error::validation_with_context(
                        "source image data URI has no payload",
                        ErrorContext::new().with_field_path("request.sourceImage"),
                    )
                })?;
                let mime = header
                    .split(';')
                    .next()
                    .filter(|m| !m.is_empty())
                    .map(str::to_string);
                (mime, data)
            }
            None => (None, input),
        };

        let data: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        if data.is_empty() {
            return Err(Error::validation_with_context(
                "source image is empty",
                ErrorContext::new().with_field_path("request.sourceImage"),
            ));
        }
        base64::engine::general_purpose::STANDARD
            .decode(&data)
            .map_err(|e| {
                Error::validation_with_context(
                    "source image is not valid base64",
                    ErrorContext::new()
                        .with_field_path("request.sourceImage")
                        .with_details(e.to_string()),
                )
            })?;

        let mime_type = uri_mime
            .or_else(|| mime_hint.filter(|m| !m.is_empty()).map(str::to_string))
            .unwrap_or_else(|| Self::DEFAULT_MIME.to_string());
        Ok(Self { data, mime_type })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mime_type = guess_media_type(path).unwrap_or(Self::DEFAULT_MIME).to_string();
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(Self { data, mime_type })
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

pub fn guess_media_type(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    let mt = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mt)
}

/// Best guess at a mime type from a result URL's extension.
pub fn mime_from_url(url: &str, fallback: &'static str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    guess_media_type(Path::new(&path))
        .unwrap_or(fallback)
        .to_string()
}
