//! Replicate predictions API.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{
    clip_seconds, compose_prompt, finish, source_image, AdapterOptions, FailureText, ProviderAdapter,
    StyleConvention,
};
use crate::config::ProviderEntry;
use crate::error_code::ErrorKind;
use crate::resilience::{poll_until, PollPolicy, PollStatus, Sleeper};
use crate::transport::{Auth, HttpTransport};
use crate::types::{
    GenerationData, GenerationRequest, GenerationResponse, MediaType, ModelCapabilities,
    ProviderId,
};
use crate::utils::PathMapper;
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";
const IMAGE_POLL: PollPolicy = PollPolicy::from_secs(2, 60);
const VIDEO_POLL: PollPolicy = PollPolicy::from_secs(5, 120);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(180);
const VIDEO_TIMEOUT: Duration = Duration::from_secs(300);

const TEXT_TO_VIDEO_VERSION: &str =
    "9f747673945c62801b13b84701c783929c0ee784e4748ec062204894dda1a351";

const FAILURE_TEXT: FailureText = FailureText {
    authentication: "Replicate authentication failed",
    quota: "Rate limit exceeded. Try again in a moment.",
    content_safety: "Replicate flagged this request as sensitive. Try a different prompt.",
};

const OUTPUT_PATHS: [&str; 3] = ["output[0]", "output", "output.url"];

/// What to run: an official model by name, or a pinned community version.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Model(String),
    Version(&'static str),
}

/// Replicate adapter. Predictions are created with `Prefer: wait`, so short
/// jobs finish in the first response; anything still running is polled via
/// its `urls.get` link. Outputs are downloaded and returned inline as base64.
///
/// Style is appended to the prompt ([`StyleConvention::Suffix`]).
#[derive(Debug)]
pub struct ReplicateAdapter {
    transport: HttpTransport,
    capabilities: ModelCapabilities,
    image_model: String,
    image_to_image_model: String,
    image_to_video_model: String,
    image_poll: PollPolicy,
    video_poll: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ReplicateAdapter {
    pub const STYLE: StyleConvention = StyleConvention::Suffix;

    pub fn new(options: AdapterOptions) -> Result<Self> {
        let transport = HttpTransport::new(
            options.base_url_or(DEFAULT_BASE_URL),
            Auth::Token(options.api_key.clone()),
        )?;
        Ok(Self {
            transport,
            capabilities: Self::describe("flux-schnell"),
            image_model: "black-forest-labs/flux-schnell".into(),
            image_to_image_model: "black-forest-labs/flux-dev".into(),
            image_to_video_model: "stability-ai/stable-video-diffusion".into(),
            image_poll: options.poll_policy(IMAGE_POLL),
            video_poll: options.poll_policy(VIDEO_POLL),
            sleeper: options.sleeper,
        })
    }

    /// Reads optional `image_model`, `image_to_image_model` and
    /// `image_to_video_model` overrides (`owner/name`).
    pub fn from_entry(entry: &ProviderEntry) -> Result<Self> {
        let mut adapter = Self::new(AdapterOptions::from_entry(entry)?)?;
        if let Some(m) = entry.param("image_model") {
            adapter.image_model = m.to_string();
            let short = m.rsplit('/').next().unwrap_or(m);
            adapter.capabilities = Self::describe(short);
        }
        if let Some(m) = entry.param("image_to_image_model") {
            adapter.image_to_image_model = m.to_string();
        }
        if let Some(m) = entry.param("image_to_video_model") {
            adapter.image_to_video_model = m.to_string();
        }
        Ok(adapter)
    }

    fn describe(model: &str) -> ModelCapabilities {
        let mut caps =
            ModelCapabilities::new(ProviderId::REPLICATE, format!("Replicate ({} - Uncensored)", model));
        caps.supports_image = true;
        caps.supports_video = true;
        caps.supports_image_to_image = true;
        caps.supports_image_to_video = true;
        caps.max_resolution = Some("1024x1024".into());
        caps.max_video_duration = Some(10);
        caps.cost_per_image = Some(0.003);
        caps.cost_per_video = Some(0.08);
        caps
    }

    fn classify_prediction(prediction: &Value) -> PollStatus<String> {
        match PathMapper::get_str(prediction, "status").unwrap_or("") {
            "succeeded" => match PathMapper::first_str(prediction, &OUTPUT_PATHS) {
                Some((_, url)) => PollStatus::Done(url.to_string()),
                None => PollStatus::Failed(Error::no_result("Replicate returned no output")),
            },
            "failed" | "canceled" => {
                let message = PathMapper::get_str(prediction, "error")
                    .unwrap_or("Replicate prediction failed");
                let kind = ErrorKind::from_vendor_message(message).unwrap_or(ErrorKind::Unknown);
                PollStatus::Failed(Error::provider(kind, message))
            }
            _ => PollStatus::Pending,
        }
    }

    /// Creates a prediction and returns its output URL.
    async fn predict(
        &self,
        target: &Target,
        input: Value,
        timeout: Duration,
        policy: &PollPolicy,
    ) -> Result<String> {
        let (path, body) = match target {
            Target::Model(name) => (format!("/models/{}/predictions", name), json!({ "input": input })),
            Target::Version(v) => ("/predictions".to_string(), json!({ "version": v, "input": input })),
        };
        let created = self
            .transport
            .send_json(
                self.transport
                    .post(&path)
                    .header("Prefer", "wait")
                    .timeout(timeout)
                    .json(&body),
            )
            .await?;
        tracing::info!(
            provider = "replicate",
            id = PathMapper::get_str(&created, "id").unwrap_or("?"),
            status = PathMapper::get_str(&created, "status").unwrap_or("?"),
            "prediction created"
        );

        match Self::classify_prediction(&created) {
            PollStatus::Done(url) => return Ok(url),
            PollStatus::Failed(err) => return Err(err),
            PollStatus::Pending => {}
        }

        let poll_url = match PathMapper::get_str(&created, "urls.get") {
            Some(url) => url.to_string(),
            None => {
                let id = PathMapper::get_str(&created, "id")
                    .ok_or_else(|| Error::no_result("Replicate did not return a prediction id"))?;
                format!("/predictions/{}", id)
            }
        };
        poll_until(policy, self.sleeper.as_ref(), |_| {
            let url = poll_url.clone();
            async move {
                let prediction = self.transport.send_json(self.transport.get(&url)).await?;
                Ok(Self::classify_prediction(&prediction))
            }
        })
        .await
    }

    async fn materialize(&self, url: &str, fallback_mime: &str) -> Result<GenerationData> {
        let (data, content_type) = self.transport.download_base64(url, false).await?;
        Ok(GenerationData::from_base64(
            data,
            content_type.unwrap_or_else(|| fallback_mime.to_string()),
            ProviderId::REPLICATE,
        ))
    }

    async fn image(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let prompt = compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE);
        let (target, mut input) = match source_image(request)? {
            Some(img) => (
                Target::Model(self.image_to_image_model.clone()),
                json!({
                    "prompt": prompt,
                    "image": img.to_data_uri(),
                    "prompt_strength": 0.6,
                    "num_outputs": 1,
                    "output_format": "png",
                }),
            ),
            None => (
                Target::Model(self.image_model.clone()),
                json!({
                    "prompt": prompt,
                    "num_outputs": 1,
                    "aspect_ratio": request.resolved_aspect_ratio().as_str(),
                    "output_format": "png",
                    "output_quality": 90,
                    "go_fast": true,
                }),
            ),
        };
        if let Some(seed) = request.seed.filter(|s| *s > 0) {
            input["seed"] = json!(seed);
        }

        let url = self
            .predict(&target, input, IMAGE_TIMEOUT, &self.image_poll)
            .await?;
        Ok(self.materialize(&url, "image/png").await?.with_seed(request.seed))
    }

    async fn video(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let prompt = compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE);
        let cfg = request.video_config.clone().unwrap_or_default();
        let fps = cfg.fps.unwrap_or(8);
        let (target, input) = match source_image(request)? {
            Some(img) => (
                Target::Model(self.image_to_video_model.clone()),
                json!({
                    "input_image": img.to_data_uri(),
                    "video_length": "25_frames_with_svd_xt",
                    "frames_per_second": fps,
                }),
            ),
            None => (
                Target::Version(TEXT_TO_VIDEO_VERSION),
                json!({
                    "prompt": prompt,
                    "num_frames": clip_seconds(request, &self.capabilities)
                        .map_or(24, |secs| secs.saturating_mul(fps)),
                    "width": 576,
                    "height": 320,
                    "fps": fps,
                }),
            ),
        };

        let url = self
            .predict(&target, input, VIDEO_TIMEOUT, &self.video_poll)
            .await?;
        self.materialize(&url, "video/mp4").await
    }
}

#[async_trait]
impl ProviderAdapter for ReplicateAdapter {
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
