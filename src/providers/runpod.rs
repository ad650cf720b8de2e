//! Runpod serverless endpoints running self-hosted image and video models.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{
    all_source_images, clip_seconds, compose_prompt, finish, AdapterOptions, FailureText,
    ProviderAdapter, StyleConvention,
};
use crate::config::ProviderEntry;
use crate::error_code::ErrorKind;
use crate::resilience::{poll_until, PollPolicy, PollStatus, Sleeper};
use crate::transport::{Auth, HttpTransport};
use crate::types::{
    AspectRatio, GenerationData, GenerationRequest, GenerationResponse, ImageMode, MediaType,
    ModelCapabilities, ProviderId,
};
use crate::utils::PathMapper;
use crate::{Error, ErrorContext, Result};

const DEFAULT_BASE_URL: &str = "https://api.runpod.ai/v2";
const IMAGE_POLL: PollPolicy = PollPolicy::from_secs(2, 60);
const VIDEO_POLL: PollPolicy = PollPolicy::from_secs(5, 120);
const VIDEO_FPS: u32 = 8;

const FAILURE_TEXT: FailureText = FailureText {
    authentication: "Runpod authentication failed. Check API key.",
    quota: "Runpod endpoint is throttled. Try again later.",
    content_safety: "Runpod worker rejected this request. Try a different prompt.",
};

/// Runpod adapter. Jobs go to `{endpoint}/run` and are polled on
/// `{endpoint}/status/{id}` until `COMPLETED`; the worker answers with the
/// media inline as base64.
///
/// An endpoint is either a bare endpoint id, resolved against the Runpod API
/// base, or a full URL. Style is appended to the prompt
/// ([`StyleConvention::Suffix`]).
#[derive(Debug)]
pub struct RunpodAdapter {
    transport: HttpTransport,
    capabilities: ModelCapabilities,
    image_endpoint: String,
    video_endpoint: Option<String>,
    image_poll: PollPolicy,
    video_poll: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RunpodAdapter {
    pub const STYLE: StyleConvention = StyleConvention::Suffix;

    pub fn new(
        options: AdapterOptions,
        image_endpoint: impl Into<String>,
        video_endpoint: Option<String>,
    ) -> Result<Self> {
        let transport = HttpTransport::new(
            options.base_url_or(DEFAULT_BASE_URL),
            Auth::Bearer(options.api_key.clone()),
        )?;
        Ok(Self {
            transport,
            capabilities: Self::describe(),
            image_endpoint: image_endpoint.into(),
            video_endpoint,
            image_poll: options.poll_policy(IMAGE_POLL),
            video_poll: options.poll_policy(VIDEO_POLL),
            sleeper: options.sleeper,
        })
    }

    pub fn from_entry(entry: &ProviderEntry) -> Result<Self> {
        let image_endpoint = entry.param("image_endpoint").ok_or_else(|| {
            Error::configuration_with_context(
                "runpod requires an image endpoint",
                ErrorContext::new().with_field_path("runpod.params.image_endpoint"),
            )
        })?;
        let video_endpoint = entry.param("video_endpoint").map(str::to_string);
        Self::new(AdapterOptions::from_entry(entry)?, image_endpoint, video_endpoint)
    }

    fn describe() -> ModelCapabilities {
        let mut caps = ModelCapabilities::new(ProviderId::RUNPOD, "Runpod (Uncensored Self-Hosted)");
        caps.supports_image = true;
        caps.supports_video = true;
        caps.supports_image_to_image = true;
        caps.supports_image_to_video = true;
        caps.supports_multiple_images = true;
        caps.max_resolution = Some("2048x2048".into());
        caps.max_video_duration = Some(10);
        caps.cost_per_image = Some(0.01);
        caps.cost_per_video = Some(0.10);
        caps
    }

    fn endpoint_path(endpoint: &str, suffix: &str) -> String {
        let endpoint = endpoint.trim().trim_end_matches('/');
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            format!("{}/{}", endpoint, suffix)
        } else {
            format!("/{}/{}", endpoint.trim_start_matches('/'), suffix)
        }
    }

    fn dimensions(ratio: AspectRatio) -> (u32, u32) {
        match ratio {
            AspectRatio::Landscape => (1344, 768),
            AspectRatio::Portrait => (768, 1344),
            _ => (1024, 1024),
        }
    }

    fn classify_job(job: &Value, op: MediaType) -> PollStatus<Value> {
        match PathMapper::get_str(job, "status").unwrap_or("") {
            "COMPLETED" => PollStatus::Done(job.get("output").cloned().unwrap_or(Value::Null)),
            "FAILED" | "CANCELLED" | "TIMED_OUT" => {
                let message = PathMapper::first_str(job, &["error", "output.error"])
                    .map(|(_, m)| m.to_string())
                    .unwrap_or_else(|| format!("Runpod {}", op.generic_failure().to_lowercase()));
                let kind = ErrorKind::from_vendor_message(&message).unwrap_or(ErrorKind::Unknown);
                PollStatus::Failed(Error::provider(kind, message))
            }
            _ => PollStatus::Pending,
        }
    }

    /// Submits `input` to an endpoint and waits for the job's output.
    async fn run_job(
        &self,
        endpoint: &str,
        input: Value,
        policy: &PollPolicy,
        op: MediaType,
    ) -> Result<Value> {
        let submitted = self
            .transport
            .send_json(
                self.transport
                    .post(&Self::endpoint_path(endpoint, "run"))
                    .json(&json!({ "input": input })),
            )
            .await?;
        let job_id = PathMapper::get_str(&submitted, "id")
            .ok_or_else(|| Error::no_result("Runpod did not return a job id"))?
            .to_string();
        tracing::info!(provider = "runpod", job_id = %job_id, media_type = %op, "job submitted");

        let status_path = Self::endpoint_path(endpoint, &format!("status/{}", job_id));
        poll_until(policy, self.sleeper.as_ref(), |_| {
            let path = status_path.clone();
            async move {
                let job = self.transport.send_json(self.transport.get(&path)).await?;
                Ok(Self::classify_job(&job, op))
            }
        })
        .await
    }

    async fn image(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let (width, height) = Self::dimensions(request.resolved_aspect_ratio());
        let mut input = json!({
            "prompt": compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE),
            "negative_prompt": request.negative_prompt.as_deref().unwrap_or(""),
            "width": width,
            "height": height,
            "num_inference_steps": 30,
            "guidance_scale": 7.5,
        });
        let images = all_source_images(request)?;
        match images.as_slice() {
            [] => {}
            [single] => {
                input["image"] = json!(single.to_data_uri());
                input["strength"] = json!(0.75);
            }
            many => {
                input["images"] = json!(many.iter().map(|i| i.to_data_uri()).collect::<Vec<_>>());
                let mode = request.image_mode.unwrap_or(ImageMode::Merge);
                input["image_mode"] = json!(mode.as_str());
                input["strength"] = json!(0.75);
            }
        }
        if let Some(seed) = request.seed.filter(|s| *s > 0) {
            input["seed"] = json!(seed);
        }

        let output = self
            .run_job(&self.image_endpoint, input, &self.image_poll, MediaType::Image)
            .await?;
        let data = PathMapper::get_str(&output, "image_base64")
            .ok_or_else(|| Error::no_result("No image returned from Runpod"))?;
        Ok(GenerationData::from_base64(data, "image/png", ProviderId::RUNPOD).with_seed(request.seed))
    }

    async fn video(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let endpoint = self.video_endpoint.as_deref().ok_or_else(|| {
            Error::provider(
                ErrorKind::CapabilityMismatch,
                "Runpod video endpoint is not configured",
            )
        })?;
        let duration = clip_seconds(request, &self.capabilities).unwrap_or(5);
        let mut input = json!({
            "prompt": compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE),
            "num_frames": duration.saturating_mul(VIDEO_FPS),
            "num_inference_steps": 25,
        });
        if let Some(img) = all_source_images(request)?.first() {
            input["image"] = json!(img.to_data_uri());
        }
        if let Some(neg) = request.negative_prompt.as_deref().filter(|n| !n.trim().is_empty()) {
            input["negative_prompt"] = json!(neg);
        }

        let output = self
            .run_job(endpoint, input, &self.video_poll, MediaType::Video)
            .await?;
        let data = PathMapper::get_str(&output, "video_base64")
            .ok_or_else(|| Error::no_result("No video returned from Runpod"))?;
        Ok(GenerationData::from_base64(data, "video/mp4", ProviderId::RUNPOD))
    }
}

#[async_trait]
impl ProviderAdapter for RunpodAdapter {
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
