//! MiniMax image (`image-01`) and video (`video-01`) generation.

use async_trait::async_trait;
use reqwest::RequestBuilder;
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
    GenerationData, GenerationRequest, GenerationResponse, MediaType, ModelCapabilities,
    ProviderId,
};
use crate::utils::PathMapper;
use crate::{Error, ErrorContext, Result};

const DEFAULT_BASE_URL: &str = "https://api.minimax.io/v1";
const VIDEO_POLL: PollPolicy = PollPolicy::from_secs(5, 60);
const VIDEO_SUBMIT_TIMEOUT: Duration = Duration::from_secs(300);

const FAILURE_TEXT: FailureText = FailureText {
    authentication: "Minimax authentication failed. Check API key and group id.",
    quota: "Minimax rate limit or balance exhausted. Try again later.",
    content_safety: "Minimax flagged this request as sensitive. Try a different prompt.",
};

/// MiniMax adapter. Images come back synchronously as URLs; video is a task
/// polled every 5 s up to 60 times, whose file id is then resolved to a
/// download link. Both are downloaded and returned inline as base64.
///
/// Every call carries the account's `GroupId` as a query parameter. Style is
/// appended to the prompt ([`StyleConvention::Suffix`]).
#[derive(Debug)]
pub struct MinimaxAdapter {
    transport: HttpTransport,
    capabilities: ModelCapabilities,
    group_id: String,
    video_poll: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl MinimaxAdapter {
    pub const STYLE: StyleConvention = StyleConvention::Suffix;

    pub fn new(options: AdapterOptions, group_id: impl Into<String>) -> Result<Self> {
        let transport = HttpTransport::new(
            options.base_url_or(DEFAULT_BASE_URL),
            Auth::Bearer(options.api_key.clone()),
        )?;
        Ok(Self {
            transport,
            capabilities: Self::describe(),
            group_id: group_id.into(),
            video_poll: options.poll_policy(VIDEO_POLL),
            sleeper: options.sleeper,
        })
    }

    pub fn from_entry(entry: &ProviderEntry) -> Result<Self> {
        let group_id = entry.param("group_id").ok_or_else(|| {
            Error::configuration_with_context(
                "minimax requires a group id",
                ErrorContext::new().with_field_path("minimax.params.group_id"),
            )
        })?;
        Self::new(AdapterOptions::from_entry(entry)?, group_id)
    }

    fn describe() -> ModelCapabilities {
        let mut caps = ModelCapabilities::new(
            ProviderId::MINIMAX,
            "Minimax (Image & Video - NO CENSORSHIP)",
        );
        caps.supports_image = true;
        caps.supports_video = true;
        caps.supports_image_to_image = true;
        caps.supports_image_to_video = true;
        caps.max_resolution = Some("1024x1024".into());
        caps.max_video_duration = Some(6);
        caps.cost_per_image = Some(0.02);
        caps.cost_per_video = Some(0.15);
        caps
    }

    fn with_group(&self, req: RequestBuilder) -> RequestBuilder {
        req.query(&[("GroupId", self.group_id.as_str())])
    }

    /// Sends and checks MiniMax's in-body status, which can report failure
    /// on an HTTP 200.
    async fn call(&self, req: RequestBuilder) -> Result<Value> {
        let body = self.transport.send_json(self.with_group(req)).await?;
        Self::check_base_resp(&body)?;
        Ok(body)
    }

    fn check_base_resp(body: &Value) -> Result<()> {
        let code = body
            .pointer("/base_resp/status_code")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if code == 0 {
            return Ok(());
        }
        let message = PathMapper::get_str(body, "base_resp.status_msg")
            .unwrap_or("Minimax request failed")
            .to_string();
        let kind = match code {
            1004 => ErrorKind::Authentication,
            1002 | 1008 => ErrorKind::QuotaExceeded,
            1026 | 1027 => ErrorKind::ContentSafety,
            _ => ErrorKind::from_vendor_message(&message).unwrap_or(ErrorKind::Unknown),
        };
        Err(Error::provider(kind, format!("{} (code {})", message, code)))
    }

    async fn image(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let mut payload = json!({
            "model": "image-01",
            "prompt": compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE),
            "aspect_ratio": request.resolved_aspect_ratio().as_str(),
            "response_format": "url",
            "n": 1,
        });
        if let Some(img) = source_image(request)? {
            payload["subject_reference"] = json!([{
                "type": "character",
                "image_file": img.to_data_uri(),
            }]);
        }
        if let Some(seed) = request.seed.filter(|s| *s > 0) {
            payload["seed"] = json!(seed);
        }

        let body = self
            .call(self.transport.post("/image_generation").json(&payload))
            .await?;
        let (_, url) = PathMapper::first_str(&body, &["data.image_urls[0]", "data.image_url"])
            .ok_or_else(|| Error::no_result("No image returned from Minimax"))?;
        let (data, content_type) = self.transport.download_base64(url, false).await?;
        Ok(GenerationData::from_base64(
            data,
            content_type.unwrap_or_else(|| "image/png".into()),
            ProviderId::MINIMAX,
        )
        .with_seed(request.seed))
    }

    fn classify_task(status: &Value) -> Result<PollStatus<String>> {
        Self::check_base_resp(status)?;
        let state = PathMapper::get_str(status, "status").unwrap_or("");
        Ok(match state {
            "Success" | "Finished" => {
                match PathMapper::first_str(status, &["file_id", "data.file_id"]) {
                    Some((_, id)) => PollStatus::Done(id.to_string()),
                    None => PollStatus::Failed(Error::no_result("Minimax task finished without a file")),
                }
            }
            "Fail" | "Failed" => PollStatus::Failed(Error::provider(
                ErrorKind::Unknown,
                "Minimax video generation failed",
            )),
            _ => PollStatus::Pending,
        })
    }

    async fn video(&self, request: &GenerationRequest) -> Result<GenerationData> {
        let mut payload = json!({
            "model": "video-01",
            "prompt": compose_prompt(&request.prompt, request.style.as_deref(), Self::STYLE),
        });
        if let Some(img) = source_image(request)? {
            payload["first_frame_image"] = json!(img.to_data_uri());
        }

        let created = self
            .call(
                self.transport
                    .post("/video_generation")
                    .timeout(VIDEO_SUBMIT_TIMEOUT)
                    .json(&payload),
            )
            .await?;
        let task_id = PathMapper::get_str(&created, "task_id")
            .ok_or_else(|| Error::no_result("Minimax did not return a task id"))?
            .to_string();
        tracing::info!(provider = "minimax", task_id = %task_id, "video task created");

        let file_id = poll_until(&self.video_poll, self.sleeper.as_ref(), |_| {
            let task_id = task_id.clone();
            async move {
                let req = self
                    .transport
                    .get("/query/video_generation")
                    .query(&[("task_id", task_id.as_str())]);
                let status = self.transport.send_json(self.with_group(req)).await?;
                Self::classify_task(&status)
            }
        })
        .await?;

        let file = self
            .call(
                self.transport
                    .get("/files/retrieve")
                    .query(&[("file_id", file_id.as_str())]),
            )
            .await?;
        let url = PathMapper::first_str(&file, &["file.download_url", "file.backup_download_url"])
            .map(|(_, u)| u.to_string())
            .ok_or_else(|| Error::no_result("Minimax returned no download link for the video"))?;
        let (data, content_type) = self.transport.download_base64(&url, false).await?;
        Ok(GenerationData::from_base64(
            data,
            content_type.unwrap_or_else(|| "video/mp4".into()),
            ProviderId::MINIMAX,
        ))
    }
}

#[async_trait]
impl ProviderAdapter for MinimaxAdapter {
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
