//! OpenRouter chat completions with image output.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::{json, Value};

use super::{compose_prompt, finish, AdapterOptions, FailureText, ProviderAdapter, StyleConvention};
use crate::config::ProviderEntry;
use crate::error_code::ErrorKind;
use crate::transport::{Auth, HttpTransport};
use crate::types::{
    AspectRatio, GenerationData, GenerationRequest, GenerationResponse, ImagePayload, MediaType,
    ModelCapabilities, ProviderId,
};
use crate::utils::PathMapper;
use crate::{Error, Result};

pub(crate) const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_SITE_URL: &str = "https://github.com/media-dispatch/media-dispatch";
const APP_TITLE: &str = "media-dispatch";
const IMAGE_MODEL: &str = "google/gemini-2.5-flash-image";

const FAILURE_TEXT: FailureText = FailureText {
    authentication: "OpenRouter authentication failed. Check API key.",
    quota: "OpenRouter quota exceeded. Try again later.",
    content_safety: "OpenRouter's upstream model refused this request. Try a different prompt or provider.",
};

/// Locations of the image inside `choices[0].message.images[0]`.
const IMAGE_FIELDS: [&str; 3] = ["image_url.url", "url", "b64_json"];

/// Adds OpenRouter's app attribution headers.
pub(crate) fn with_attribution(req: RequestBuilder, site_url: &str) -> RequestBuilder {
    req.header("HTTP-Referer", site_url).header("X-Title", APP_TITLE)
}

/// OpenRouter adapter: text-to-image through a multimodal chat model,
/// answered synchronously. Video is not offered.
///
/// Style is appended to the prompt ([`StyleConvention::Suffix`]).
#[derive(Debug)]
pub struct OpenRouterAdapter {
    transport: HttpTransport,
    capabilities: ModelCapabilities,
    site_url: String,
}

impl OpenRouterAdapter {
    pub const STYLE: StyleConvention = StyleConvention::Suffix;

    pub fn new(options: AdapterOptions) -> Result<Self> {
        let transport = HttpTransport::new(
            options.base_url_or(OPENROUTER_BASE_URL),
            Auth::Bearer(options.api_key.clone()),
        )?;
        Ok(Self {
            transport,
            capabilities: Self::describe(),
            site_url: DEFAULT_SITE_URL.to_string(),
        })
    }

    pub fn from_entry(entry: &ProviderEntry) -> Result<Self> {
        let mut adapter = Self::new(AdapterOptions::from_entry(entry)?)?;
        if let Some(site) = entry.param("site_url") {
            adapter.site_url = site.to_string();
        }
        Ok(adapter)
    }

    fn describe() -> ModelCapabilities {
        let mut caps =
            ModelCapabilities::new(ProviderId::OPENROUTER, "OpenRouter (Gemini 2.5 Flash Image)");
        caps.supports_image = true;
        caps.max_resolution = Some("1024x1024".into());
        caps.censored = true;
        caps.cost_per_image = Some(0.0);
        caps
    }

    async fn image(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let prompt = compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE);
        let mut body = json!({
            "model": IMAGE_MODEL,
            "messages": [{
                "role": "user",
                "content": [{ "type": "text", "text": prompt }],
            }],
            "modalities": ["image", "text"],
        });
        let ratio = request.resolved_aspect_ratio();
        if ratio != AspectRatio::Square {
            body["image_config"] = json!({ "aspect_ratio": ratio.as_str() });
        }
        if let Some(seed) = request.seed.filter(|s| *s > 0) {
            body["seed"] = json!(seed);
        }

        let req = with_attribution(self.transport.post("/chat/completions"), &self.site_url);
        let resp = self.transport.send_json(req.json(&body)).await?;

        if let Some(message) = PathMapper::get_str(&resp, "error.message") {
            let kind = ErrorKind::from_vendor_message(message).unwrap_or(ErrorKind::Unknown);
            return Err(Error::provider(kind, message));
        }

        let raw = match PathMapper::get_path(&resp, "choices[0].message.images[0]") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.as_str(),
            Some(img) => PathMapper::first_str(img, &IMAGE_FIELDS)
                .map(|(_, s)| s)
                .ok_or_else(|| Error::no_result("Invalid image response format from OpenRouter"))?,
            None => {
                if PathMapper::get_str(&resp, "choices[0].finish_reason") == Some("content_filter") {
                    return Err(Error::provider(
                        ErrorKind::ContentSafety,
                        "response stopped by content filter",
                    ));
                }
                return Err(Error::no_result("No image returned from OpenRouter"));
            }
        };

        let (data, mime) = if raw.starts_with("http://") || raw.starts_with("https://") {
            let (data, content_type) = self.transport.download_base64(raw, false).await?;
            (data, content_type.unwrap_or_else(|| ImagePayload::DEFAULT_MIME.into()))
        } else {
            let payload = ImagePayload::parse(raw, None)
                .map_err(|_| Error::no_result("Invalid image data URL from OpenRouter"))?;
            (payload.data, payload.mime_type)
        };
        Ok(GenerationData::from_base64(data, mime, ProviderId::OPENROUTER).with_seed(request.seed))
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn generate_image(&self, request: &GenerationRequest) -> GenerationResponse {
        finish(&self.capabilities, MediaType::Image, &FAILURE_TEXT, self.image(request).await)
    }

    async fn generate_video(&self, _request: &GenerationRequest) -> GenerationResponse {
        GenerationResponse::failure(
            ErrorKind::CapabilityMismatch,
            "OpenRouter does not currently support video generation. Use Replicate or fal.ai for video.",
        )
    }
}
