//! fal.ai queue API (FLUX images, SVD video).

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{
    compose_prompt, finish, source_image, AdapterOptions, FailureText, ProviderAdapter,
    StyleConvention,
};
use crate::config::ProviderEntry;
use crate::error_code::ErrorKind;
use crate::resilience::{poll_until, PollPolicy, PollStatus, Sleeper};
use crate::transport::{Auth, HttpTransport};
use crate::types::media::mime_from_url;
use crate::types::{
    AspectRatio, GenerationData, GenerationRequest, GenerationResponse, MediaType,
    ModelCapabilities, ProviderId,
};
use crate::utils::PathMapper;
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://queue.fal.run";
const TEXT_TO_IMAGE_MODEL: &str = "fal-ai/flux-1/dev";
const IMAGE_TO_IMAGE_MODEL: &str = "fal-ai/flux-1/dev/image-to-image";
const DEFAULT_VIDEO_MODEL: &str = "fal-ai/fast-svd/text-to-video";
const IMAGE_TO_IMAGE_STRENGTH: f64 = 0.7;
const IMAGE_POLL: PollPolicy = PollPolicy::from_secs(2, 60);
const VIDEO_POLL: PollPolicy = PollPolicy::from_secs(5, 120);

const FAILURE_TEXT: FailureText = FailureText {
    authentication: "fal.ai authentication failed. Check API key.",
    quota: "fal.ai quota exceeded. Try again later.",
    content_safety: "fal.ai blocked this request (possible content filtering). Try a different prompt or use Replicate (fully uncensored).",
};

const IMAGE_PATHS: [&str; 7] = [
    "images[0].url",
    "images[0]",
    "image.url",
    "image",
    "output[0]",
    "result.images[0].url",
    "result.images[0]",
];

const VIDEO_PATHS: [&str; 6] = [
    "video.url",
    "video",
    "videos[0].url",
    "videos[0]",
    "output[0]",
    "result.video.url",
];

/// Where to check on, and later collect, one queued fal request.
#[derive(Debug, Clone, PartialEq)]
struct QueueHandle {
    status_url: String,
    response_url: String,
}

/// fal.ai adapter. Every call goes through the fal queue: submit, poll the
/// status URL (images every 2 s up to 60 times, video every 5 s up to 120),
/// then fetch the result. Results are returned as remote URLs.
///
/// Style is appended to the prompt ([`StyleConvention::Suffix`]).
#[derive(Debug)]
pub struct FalAiAdapter {
    transport: HttpTransport,
    capabilities: ModelCapabilities,
    video_model: String,
    image_poll: PollPolicy,
    video_poll: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl FalAiAdapter {
    pub const STYLE: StyleConvention = StyleConvention::Suffix;

    pub fn new(options: AdapterOptions) -> Result<Self> {
        let transport = HttpTransport::new(
            options.base_url_or(DEFAULT_BASE_URL),
            Auth::Key(options.api_key.clone()),
        )?;
        Ok(Self {
            transport,
            capabilities: Self::describe(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            image_poll: options.poll_policy(IMAGE_POLL),
            video_poll: options.poll_policy(VIDEO_POLL),
            sleeper: options.sleeper,
        })
    }

    pub fn from_entry(entry: &ProviderEntry) -> Result<Self> {
        let mut adapter = Self::new(AdapterOptions::from_entry(entry)?)?;
        if let Some(model) = entry.param("video_model") {
            adapter.video_model = model.to_string();
        }
        Ok(adapter)
    }

    fn describe() -> ModelCapabilities {
        let mut caps = ModelCapabilities::new(ProviderId::FALAI, "fal.ai (FLUX)");
        caps.supports_image = true;
        caps.supports_video = true;
        caps.supports_image_to_image = true;
        caps.max_resolution = Some("1024x1024".into());
        caps.max_video_duration = Some(10);
        caps.censored = true;
        caps.cost_per_image = Some(0.002);
        caps.cost_per_video = Some(0.08);
        caps
    }

    fn image_size(ratio: AspectRatio) -> &'static str {
        match ratio {
            AspectRatio::Landscape => "landscape_16_9",
            AspectRatio::Portrait => "portrait_16_9",
            _ => "square_hd",
        }
    }

    /// `fal-ai/flux-1/dev/image-to-image` → `fal-ai/flux-1`
    fn app_id(model: &str) -> String {
        model.split('/').take(2).collect::<Vec<_>>().join("/")
    }

    async fn submit(&self, model: &str, input: &Value) -> Result<QueueHandle> {
        let resp = self
            .transport
            .send_json(self.transport.post(&format!("/{}", model)).json(input))
            .await?;
        let request_id = PathMapper::get_str(&resp, "request_id")
            .ok_or_else(|| Error::no_result("fal.ai did not return a request id"))?;
        let base = format!("/{}/requests/{}", Self::app_id(model), request_id);
        let handle = QueueHandle {
            status_url: PathMapper::get_str(&resp, "status_url")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}/status", base)),
            response_url: PathMapper::get_str(&resp, "response_url")
                .map(str::to_string)
                .unwrap_or(base),
        };
        tracing::info!(provider = "falai", model, request_id, "queued");
        Ok(handle)
    }

    fn classify_status(status: &Value) -> PollStatus<()> {
        match PathMapper::get_str(status, "status").unwrap_or("") {
            "COMPLETED" => match PathMapper::first_str(status, &["error", "error.message"]) {
                Some((_, message)) => PollStatus::Failed(Self::vendor_error(message)),
                None => PollStatus::Done(()),
            },
            "FAILED" | "ERROR" | "CANCELLED" => {
                let message = PathMapper::first_str(status, &["error", "error.message", "detail"])
                    .map(|(_, m)| m)
                    .unwrap_or("fal.ai request failed");
                PollStatus::Failed(Self::vendor_error(message))
            }
            _ => PollStatus::Pending,
        }
    }

    fn vendor_error(message: &str) -> Error {
        let kind = ErrorKind::from_vendor_message(message).unwrap_or(ErrorKind::Unknown);
        Error::provider(kind, message)
    }

    /// Submit, wait, fetch.
    async fn run(&self, model: &str, input: Value, policy: &PollPolicy) -> Result<Value> {
        let handle = self.submit(model, &input).await?;
        poll_until(policy, self.sleeper.as_ref(), |_| {
            let url = handle.status_url.clone();
            async move {
                let status = self.transport.send_json(self.transport.get(&url)).await?;
                Ok(Self::classify_status(&status))
            }
        })
        .await?;
        self.transport
            .send_json(self.transport.get(&handle.response_url))
            .await
    }

    fn flagged_nsfw(result: &Value) -> bool {
        result["has_nsfw_concepts"]
            .as_array()
            .is_some_and(|flags| flags.iter().any(|f| f.as_bool() == Some(true)))
    }

    async fn image(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let mut input = json!({
            "prompt": compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE),
            "num_images": 1,
            "image_size": Self::image_size(request.resolved_aspect_ratio()),
        });
        if let Some(seed) = request.seed.filter(|s| *s > 0) {
            input["seed"] = json!(seed);
        }
        if let Some(neg) = request.negative_prompt.as_deref().filter(|n| !n.trim().is_empty()) {
            input["negative_prompt"] = json!(neg);
        }
        let model = match source_image(request)? {
            Some(img) => {
                input["image_url"] = json!(img.to_data_uri());
                input["strength"] = json!(IMAGE_TO_IMAGE_STRENGTH);
                IMAGE_TO_IMAGE_MODEL
            }
            None => TEXT_TO_IMAGE_MODEL,
        };

        let result = self.run(model, input, &self.image_poll).await?;
        if Self::flagged_nsfw(&result) {
            return Err(Error::provider(
                ErrorKind::ContentSafety,
                "output flagged as NSFW",
            ));
        }
        let (_, url) = PathMapper::first_str(&result, &IMAGE_PATHS)
            .ok_or_else(|| Error::no_result("No image returned from fal.ai"))?;
        let mime = PathMapper::get_str(&result, "images[0].content_type")
            .map(str::to_string)
            .unwrap_or_else(|| mime_from_url(url, "image/png"));
        let seed = result["seed"].as_u64().or(request.seed);
        Ok(GenerationData::from_url(url, mime, ProviderId::FALAI).with_seed(seed))
    }

    async fn video(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let fps = request
            .video_config
            .as_ref()
            .and_then(|c| c.fps)
            .unwrap_or(8);
        let mut input = json!({
            "prompt": compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE),
            "fps": fps,
            "video_size": Self::image_size(request.resolved_aspect_ratio()),
        });
        if let Some(neg) = request.negative_prompt.as_deref().filter(|n| !n.trim().is_empty()) {
            input["negative_prompt"] = json!(neg);
        }
        if let Some(seed) = request.seed.filter(|s| *s > 0) {
            input["seed"] = json!(seed);
        }

        let result = self.run(&self.video_model, input, &self.video_poll).await?;
        let (_, url) = PathMapper::first_str(&result, &VIDEO_PATHS)
            .ok_or_else(|| Error::no_result("No video returned from fal.ai"))?;
        Ok(GenerationData::from_url(url, mime_from_url(url, "video/mp4"), ProviderId::FALAI))
    }
}

#[async_trait]
impl ProviderAdapter for FalAiAdapter {
    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn generate_image(&self, request: &GenerationRequest) -> GenerationResponse {
        finish(&self.capabilities, MediaType::Image, &FAILURE_TEXT, self.image(request).await)
    }

    async fn generate_video(&self, request: &GenerationRequest) -> GenerationResponse {
        finish(&self.capabilities, MediaType::Video, &FAILURE_TEXT, self.video(request).await)
    }

    async fn generate_text(&self, _request: &GenerationRequest) -> GenerationResponse {
        GenerationResponse::failure(
            ErrorKind::CapabilityMismatch,
            "fal.ai does not support text generation. Use Devstral for coding tasks.",
        )
    }
}
