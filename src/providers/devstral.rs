//! Devstral coding model, served through OpenRouter.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use super::openrouter::{with_attribution, OPENROUTER_BASE_URL};
use super::{effective_style, finish, AdapterOptions, FailureText, ProviderAdapter};
use crate::config::ProviderEntry;
use crate::error_code::ErrorKind;
use crate::transport::{Auth, HttpTransport};
use crate::types::{
    GenerationData, GenerationRequest, GenerationResponse, MediaType, ModelCapabilities,
    ProviderId,
};
use crate::utils::PathMapper;
use crate::{Error, Result};

const DEFAULT_MODEL: &str = "mistralai/devstral-2512:free";
const SITE_URL: &str = "https://github.com/media-dispatch/media-dispatch";
pub const TEXT_MIME: &str = "text/plain; charset=utf-8";

const FAILURE_TEXT: FailureText = FailureText {
    authentication: "Devstral authentication failed. Check the OpenRouter API key.",
    quota: "Devstral free tier is rate limited. Try again later.",
    content_safety: "Devstral refused this request.",
};

/// Text-only adapter. Media operations answer with a worded failure; text
/// comes back base64-encoded as `text/plain`, with the model name and token
/// usage in `metadata`.
#[derive(Debug)]
pub struct DevstralAdapter {
    transport: HttpTransport,
    capabilities: ModelCapabilities,
    model: String,
}

impl DevstralAdapter {
    pub fn new(options: AdapterOptions) -> Result<Self> {
        let transport = HttpTransport::new(
            options.base_url_or(OPENROUTER_BASE_URL),
            Auth::Bearer(options.api_key.clone()),
        )?;
        Ok(Self {
            transport,
            capabilities: ModelCapabilities::new(
                ProviderId::DEVSTRAL,
                "Devstral 2 (Free - Coding Specialist)",
            ),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Reads an optional `model` override.
    pub fn from_entry(entry: &ProviderEntry) -> Result<Self> {
        let mut adapter = Self::new(AdapterOptions::from_entry(entry)?)?;
        if let Some(model) = entry.param("model") {
            adapter.model = model.to_string();
        }
        Ok(adapter)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Chat completion body; the style, when set, becomes the system message.
    fn chat_body(&self, request: &GenerationRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(style) = effective_style(request.style.as_deref()) {
            messages.push(json!({ "role": "system", "content": style }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt.trim() }));
        let mut body = json!({ "model": self.model, "messages": messages });
        if let Some(seed) = request.seed.filter(|s| *s > 0) {
            body["seed"] = json!(seed);
        }
        body
    }

    async fn text(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let body = self.chat_body(request);
        let req = with_attribution(self.transport.post("/chat/completions"), SITE_URL);
        let resp = self.transport.send_json(req.json(&body)).await?;
        if let Some(message) = PathMapper::get_str(&resp, "error.message") {
            let kind = ErrorKind::from_vendor_message(message).unwrap_or(ErrorKind::Unknown);
            return Err(Error::provider(kind, message));
        }

        let content = PathMapper::get_str(&resp, "choices[0].message.content")
            .ok_or_else(|| Error::no_result("No text returned from Devstral"))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(content.as_bytes());
        let metadata = json!({
            "model": PathMapper::get_str(&resp, "model").unwrap_or(&self.model),
            "usage": resp.get("usage").cloned().unwrap_or_default(),
        });
        Ok(GenerationData::from_base64(encoded, TEXT_MIME, ProviderId::DEVSTRAL).with_metadata(metadata))
    }
}

#[async_trait]
impl ProviderAdapter for DevstralAdapter {
    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn generate_image(&self, _request: &GenerationRequest) -> GenerationResponse {
        GenerationResponse::failure(
            ErrorKind::CapabilityMismatch,
            "Devstral is a text-only model. Use it for coding tasks, not image generation.",
        )
    }

    async fn generate_video(&self, _request: &GenerationRequest) -> GenerationResponse {
        GenerationResponse::failure(
            ErrorKind::CapabilityMismatch,
            "Devstral does not support video generation.",
        )
    }

    async fn generate_text(&self, request: &GenerationRequest) -> GenerationResponse {
        finish(&self.capabilities, MediaType::Text, &FAILURE_TEXT, self.text(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_has_no_media_flags() {
        let a = DevstralAdapter::new(AdapterOptions::new("k")).unwrap();
        let caps = a.capabilities();
        assert!(!caps.supports_image && !caps.supports_video);
        assert!(!caps.supports_image_to_image && !caps.supports_multiple_images);
        assert_eq!(a.model(), DEFAULT_MODEL);
    }

    #[test]
    fn model_override() {
        let entry = ProviderEntry::new(ProviderId::DEVSTRAL)
            .with_api_key("k")
            .with_param("model", "mistralai/devstral-medium");
        assert_eq!(DevstralAdapter::from_entry(&entry).unwrap().model(), "mistralai/devstral-medium");
    }

    #[test]
    fn style_becomes_system_message_unless_none() {
        let a = DevstralAdapter::new(AdapterOptions::new("k")).unwrap();
        let styled = GenerationRequest::text("write a lexer", ProviderId::DEVSTRAL)
            .with_style("Answer in Rust only");
        let body = a.chat_body(&styled);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Answer in Rust only");

        let unstyled = GenerationRequest::text("write a lexer", ProviderId::DEVSTRAL).with_style("None");
        let body = a.chat_body(&unstyled);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn media_operations_are_refused() {
        let a = DevstralAdapter::new(AdapterOptions::new("k")).unwrap();
        let resp = a.generate_image(&GenerationRequest::image("x", ProviderId::DEVSTRAL)).await;
        assert!(resp.error().unwrap().starts_with("Devstral is a text-only model"));
        let resp = a.generate_video(&GenerationRequest::video("x", ProviderId::DEVSTRAL)).await;
        assert_eq!(resp.error_kind(), Some(ErrorKind::CapabilityMismatch));
    }
}
