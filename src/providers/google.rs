//! Google Gemini image generation and Veo video generation.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{
    compose_prompt, finish, source_image, AdapterOptions, FailureText, ProviderAdapter,
    StyleConvention,
};
use crate::config::ProviderEntry;
use crate::error_code::ErrorKind;
use crate::resilience::{poll_until, PollPolicy, PollStatus, Sleeper};
use crate::transport::{Auth, HttpTransport};
use crate::types::{
    AspectRatio, GenerationData, GenerationRequest, GenerationResponse, ImagePayload, MediaType,
    ModelCapabilities, ProviderId,
};
use crate::utils::PathMapper;
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";
const VIDEO_POLL: PollPolicy = PollPolicy::from_secs(5, 120);
const VIDEO_SUBMIT_TIMEOUT: Duration = Duration::from_secs(300);

const FAILURE_TEXT: FailureText = FailureText {
    authentication: "Google API access denied. Check billing and API enablement.",
    quota: "Google quota exceeded. Try again later or request quota increase.",
    content_safety: "Google blocked this request on safety grounds. Try a different prompt or provider.",
};

/// Gemini finish/block reasons that mean a policy refusal.
const SAFETY_REASONS: [&str; 5] = [
    "SAFETY",
    "PROHIBITED_CONTENT",
    "IMAGE_SAFETY",
    "BLOCKLIST",
    "SPII",
];

const VIDEO_URI_PATHS: [&str; 3] = [
    "response.generateVideoResponse.generatedSamples[0].video.uri",
    "response.generatedVideos[0].video.uri",
    "response.videos[0].uri",
];

/// Google adapter: Gemini for images (synchronous), Veo for video
/// (long-running operation, polled every 5 s up to 120 times).
///
/// Style goes in front of the prompt, separated by a blank line
/// ([`StyleConvention::Prefix`]). Veo has no square output, so `1:1`
/// requests are rendered at `16:9`.
#[derive(Debug)]
pub struct GoogleAdapter {
    transport: HttpTransport,
    capabilities: ModelCapabilities,
    video_poll: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl GoogleAdapter {
    pub const STYLE: StyleConvention = StyleConvention::Prefix;

    pub fn new(options: AdapterOptions) -> Result<Self> {
        let transport = HttpTransport::new(
            options.base_url_or(DEFAULT_BASE_URL),
            Auth::Query {
                param: "key",
                value: options.api_key.clone(),
            },
        )?;
        Ok(Self {
            transport,
            capabilities: Self::describe(),
            video_poll: options.poll_policy(VIDEO_POLL),
            sleeper: options.sleeper,
        })
    }

    pub fn from_entry(entry: &ProviderEntry) -> Result<Self> {
        Self::new(AdapterOptions::from_entry(entry)?)
    }

    fn describe() -> ModelCapabilities {
        let mut caps = ModelCapabilities::new(ProviderId::GOOGLE, "Google (Veo 3 + Gemini Image)");
        caps.supports_image = true;
        caps.supports_video = true;
        caps.supports_image_to_video = true;
        caps.max_resolution = Some("1024x1024".into());
        caps.max_video_duration = Some(10);
        caps.cost_per_image = Some(0.001);
        caps.cost_per_video = Some(0.05);
        caps
    }

    fn video_aspect_ratio(ratio: AspectRatio) -> &'static str {
        match ratio {
            AspectRatio::Portrait => "9:16",
            _ => "16:9",
        }
    }

    async fn image(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let prompt = compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE);
        let mut parts = vec![json!({ "text": prompt })];
        // Single reference image only; multi-image requests never reach here.
        if let Some(first) = request.source_images.first() {
            let img = ImagePayload::parse(first, request.source_mime_type.as_deref())?;
            parts.push(json!({ "inlineData": { "mimeType": img.mime_type, "data": img.data } }));
        }

        let mut generation_config = json!({
            "responseModalities": ["IMAGE"],
            "imageConfig": { "aspectRatio": request.resolved_aspect_ratio().as_str() },
        });
        if let Some(seed) = request.seed.filter(|s| *s > 0) {
            generation_config["seed"] = json!(seed);
        }
        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": generation_config,
        });

        let path = format!("/models/{}:generateContent", IMAGE_MODEL);
        let resp = self
            .transport
            .send_json(self.transport.post(&path).json(&body))
            .await?;

        if let Some(reason) = Self::safety_block(&resp) {
            return Err(Error::provider(
                ErrorKind::ContentSafety,
                format!("blocked by Google safety filters ({})", reason),
            ));
        }

        let parts = PathMapper::get_path(&resp, "candidates[0].content.parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for part in parts {
            if let Some((_, data)) = PathMapper::first_str(part, &["inlineData.data", "inline_data.data"]) {
                let mime = PathMapper::first_str(part, &["inlineData.mimeType", "inline_data.mime_type"])
                    .map(|(_, m)| m)
                    .unwrap_or(ImagePayload::DEFAULT_MIME);
                return Ok(GenerationData::from_base64(data, mime, ProviderId::GOOGLE)
                    .with_seed(request.seed));
            }
        }
        Err(Error::no_result("No image returned from Google API"))
    }

    fn safety_block(resp: &Value) -> Option<&str> {
        if let Some(reason) = PathMapper::get_str(resp, "promptFeedback.blockReason") {
            return Some(reason);
        }
        PathMapper::get_str(resp, "candidates[0].finishReason")
            .filter(|r| SAFETY_REASONS.contains(r))
    }

    async fn video(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let prompt = compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE);
        let mut instance = json!({ "prompt": prompt });
        if let Some(img) = source_image(request)? {
            instance["image"] = json!({ "bytesBase64Encoded": img.data, "mimeType": img.mime_type });
        }

        let mut parameters = json!({
            "aspectRatio": Self::video_aspect_ratio(request.resolved_aspect_ratio()),
            "sampleCount": 1,
        });
        if let Some(cfg) = &request.video_config {
            if let Some(res) = cfg.resolution {
                parameters["resolution"] = json!(res.as_str());
            }
            if let Some(secs) = cfg.duration {
                parameters["durationSeconds"] = json!(secs);
            }
        }
        if let Some(neg) = request.negative_prompt.as_deref().filter(|n| !n.trim().is_empty()) {
            parameters["negativePrompt"] = json!(neg);
        }
        if let Some(seed) = request.seed.filter(|s| *s > 0) {
            parameters["seed"] = json!(seed);
        }

        let path = format!("/models/{}:predictLongRunning", VIDEO_MODEL);
        let body = json!({ "instances": [instance], "parameters": parameters });
        let op = self
            .transport
            .send_json(
                self.transport
                    .post(&path)
                    .timeout(VIDEO_SUBMIT_TIMEOUT)
                    .json(&body),
            )
            .await?;
        let name = PathMapper::get_str(&op, "name")
            .ok_or_else(|| Error::no_result("Google did not return a video operation"))?
            .to_string();
        tracing::info!(provider = "google", operation = %name, "video operation started");

        let uri = poll_until(&self.video_poll, self.sleeper.as_ref(), |attempt| {
            let name = name.clone();
            async move {
                let op = self.transport.send_json(self.transport.get(&name)).await?;
                tracing::debug!(provider = "google", attempt, done = op["done"].as_bool().unwrap_or(false), "polled operation");
                Ok(Self::classify_operation(&op))
            }
        })
        .await?;

        let (data, content_type) = self.transport.download_base64(&uri, true).await?;
        Ok(GenerationData::from_base64(
            data,
            content_type.unwrap_or_else(|| "video/mp4".to_string()),
            ProviderId::GOOGLE,
        ))
    }

    fn classify_operation(op: &Value) -> PollStatus<String> {
        if !op["done"].as_bool().unwrap_or(false) {
            return PollStatus::Pending;
        }
        if let Some(err) = op.get("error").filter(|e| !e.is_null()) {
            let message = PathMapper::get_str(err, "message")
                .unwrap_or("Video generation failed")
                .to_string();
            let kind = ErrorKind::from_vendor_message(&message).unwrap_or(ErrorKind::Unknown);
            return PollStatus::Failed(Error::provider(kind, message));
        }
        if let Some(reason) = PathMapper::get_str(op, "response.generateVideoResponse.raiMediaFilteredReasons[0]") {
            return PollStatus::Failed(Error::provider(ErrorKind::ContentSafety, reason));
        }
        match PathMapper::first_str(op, &VIDEO_URI_PATHS) {
            Some((_, uri)) => PollStatus::Done(uri.to_string()),
            None => PollStatus::Failed(Error::no_result("No video URI in response")),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn generate_image(&self, request: &GenerationRequest) -> GenerationResponse {
        finish(&self.capabilities, MediaType::Image, &FAILURE_TEXT, self.image(request).await)
    }

    async fn generate_video(&self, request: &GenerationRequest) -> GenerationResponse {
        finish(&self.capabilities, MediaType::Video, &FAILURE_TEXT, self.video(request).await)
    }
}
