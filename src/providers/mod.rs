//! Provider 适配层：通过 trait 对多个生成式媒体厂商 API 做统一分发
//!
//! Provider adapter layer. Each vendor API sits behind [`ProviderAdapter`];
//! the registry stores them as `Arc<dyn ProviderAdapter>` and the dispatcher
//! never sees a vendor-specific type.
//!
//! Every adapter follows the same skeleton:
//!
//! 1. compose the prompt with the request's style ([`compose_prompt`])
//! 2. map the aspect ratio to the vendor's own values
//! 3. attach source images in the vendor's format ([`ImagePayload`])
//! 4. call the vendor with its auth scheme ([`HttpTransport`](crate::transport::HttpTransport))
//! 5. read the result directly, or poll a job ([`poll_until`](crate::resilience::poll_until))
//! 6. pull media out of the body via an ordered path list ([`PathMapper`](crate::utils::PathMapper))
//! 7. wrap it with provider id and unit cost, or turn the error into a
//!    failure response ([`finish`])

pub mod devstral;
pub mod falai;
pub mod google;
pub mod minimax;
pub mod openrouter;
pub mod replicate;
pub mod runpod;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ProviderEntry;
use crate::error_code::ErrorKind;
use crate::resilience::{PollPolicy, Sleeper, TokioSleeper};
use crate::types::{
    GenerationData, GenerationRequest, GenerationResponse, ImagePayload, MediaType,
    ModelCapabilities, ProviderId,
};
use crate::{Error, Result};

pub use devstral::DevstralAdapter;
pub use falai::FalAiAdapter;
pub use google::GoogleAdapter;
pub use minimax::MinimaxAdapter;
pub use openrouter::OpenRouterAdapter;
pub use replicate::ReplicateAdapter;
pub use runpod::RunpodAdapter;

/// One external generative-media API behind a uniform interface.
///
/// Operations never fail as Rust errors: vendor trouble of every kind comes
/// back as a [`GenerationResponse::Failure`]. An adapter that cannot perform
/// an operation at all answers with a worded failure too.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + std::fmt::Debug {
    /// Fixed descriptor chosen at construction.
    fn capabilities(&self) -> &ModelCapabilities;

    fn provider_id(&self) -> &ProviderId {
        &self.capabilities().provider
    }

    async fn generate_image(&self, request: &GenerationRequest) -> GenerationResponse;

    async fn generate_video(&self, request: &GenerationRequest) -> GenerationResponse;

    async fn generate_text(&self, _request: &GenerationRequest) -> GenerationResponse {
        unsupported(self.capabilities(), MediaType::Text)
    }
}

/// Failure response for an operation an adapter does not offer.
pub fn unsupported(caps: &ModelCapabilities, op: MediaType) -> GenerationResponse {
    GenerationResponse::failure(
        ErrorKind::CapabilityMismatch,
        format!("{} does not support {} generation", caps.name, op),
    )
}

/// Where an adapter puts the style text relative to the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleConvention {
    /// `"{prompt} {style}"`
    Suffix,
    /// `"{style}\n\n{prompt}"`
    Prefix,
}

/// Style value meaning "no style".
pub const NO_STYLE: &str = "none";

/// Folds the request's style into its prompt.
///
/// Absent, blank and `"none"` (any case) styles leave the prompt unchanged.
pub fn compose_prompt(prompt: &str, style: Option<&str>, convention: StyleConvention) -> String {
    let prompt = prompt.trim();
    let style = match effective_style(style) {
        Some(s) => s,
        None => return prompt.to_string(),
    };
    match convention {
        StyleConvention::Suffix => format!("{} {}", prompt, style),
        StyleConvention::Prefix => format!("{}\n\n{}", style, prompt),
    }
}

/// Trimmed style text, or `None` when absent, blank or `"none"`.
pub fn effective_style(style: Option<&str>) -> Option<&str> {
    style
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(NO_STYLE))
}

/// Requested clip length in seconds, capped at the provider's maximum.
pub fn clip_seconds(request: &GenerationRequest, caps: &ModelCapabilities) -> Option<u32> {
    let secs = request.video_config.as_ref()?.duration?;
    Some(caps.max_video_duration.map_or(secs, |max| secs.min(max)))
}

/// The request's single source image, checked.
pub fn source_image(request: &GenerationRequest) -> Result<Option<ImagePayload>> {
    request
        .source_image
        .as_deref()
        .map(|img| ImagePayload::parse(img, request.source_mime_type.as_deref()))
        .transpose()
}

/// Every reference image on the request, single image first.
pub fn all_source_images(request: &GenerationRequest) -> Result<Vec<ImagePayload>> {
    let hint = request.source_mime_type.as_deref();
    request
        .source_image
        .iter()
        .chain(request.source_images.iter())
        .map(|img| ImagePayload::parse(img, hint))
        .collect()
}

/// Provider-attributed wording for the causes that need user action.
#[derive(Debug, Clone, Copy)]
pub struct FailureText {
    pub authentication: &'static str,
    pub quota: &'static str,
    pub content_safety: &'static str,
}

impl FailureText {
    pub const GENERIC: FailureText = FailureText {
        authentication: "Authentication failed. Check API key.",
        quota: "Rate limit exceeded. Try again later.",
        content_safety: "Request blocked by content filtering. Try a different prompt or provider.",
    };
}

/// User-facing message for a failed operation.
///
/// Causes that need user action get the provider's fixed advice, with the
/// vendor's own text appended when there is any. Everything else passes the
/// vendor text through, falling back to a per-operation message.
pub fn describe_failure(err: &Error, op: MediaType, text: &FailureText) -> String {
    let with_detail = |advice: &str| match err.vendor_message() {
        Some(detail) if !advice.contains(detail) => format!("{} ({})", advice, detail),
        _ => advice.to_string(),
    };
    match err.kind() {
        ErrorKind::Authentication => with_detail(text.authentication),
        ErrorKind::QuotaExceeded => with_detail(text.quota),
        ErrorKind::ContentSafety => with_detail(text.content_safety),
        ErrorKind::Timeout => match err {
            Error::Timeout { attempts } => format!(
                "{} timed out after {} polling attempts",
                op.generic_failure().trim_end_matches(" failed"),
                attempts
            ),
            _ => format!("{}: request timed out", op.generic_failure()),
        },
        ErrorKind::NoResult => match err {
            Error::NoResult { message } => message.clone(),
            _ => format!("No {} returned", op),
        },
        _ => err
            .vendor_message()
            .map(str::to_string)
            .unwrap_or_else(|| op.generic_failure().to_string()),
    }
}

/// Turns an adapter's internal result into the shared response contract.
///
/// Success gets the provider id and the descriptor's unit cost for `op`
/// (unless the adapter already priced it). Errors are logged and converted.
pub fn finish(
    caps: &ModelCapabilities,
    op: MediaType,
    text: &FailureText,
    result: Result<GenerationData>,
) -> GenerationResponse {
    match result {
        Ok(mut data) => {
            data.provider = caps.provider.clone();
            if data.cost.is_none() {
                data.cost = match op {
                    MediaType::Image => caps.cost_per_image,
                    MediaType::Video => caps.cost_per_video,
                    _ => None,
                };
            }
            GenerationResponse::success(data)
        }
        Err(err) => {
            tracing::warn!(
                provider = %caps.provider,
                media_type = %op,
                kind = err.kind().name(),
                error = %err,
                "generation failed"
            );
            GenerationResponse::failure(err.kind(), describe_failure(&err, op, text))
        }
    }
}

/// Settings every adapter reads from its [`ProviderEntry`].
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub api_key: String,
    pub base_url: Option<String>,
    pub sleeper: Arc<dyn Sleeper>,
    interval_override: Option<u64>,
    attempts_override: Option<u32>,
}

impl AdapterOptions {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            sleeper: Arc::new(TokioSleeper),
            interval_override: None,
            attempts_override: None,
        }
    }

    /// Reads key, base URL and poll overrides. Fails only when the key is absent.
    pub fn from_entry(entry: &ProviderEntry) -> Result<Self> {
        let api_key = entry.api_key().ok_or_else(|| {
            Error::configuration_with_context(
                format!("provider '{}' has no API key", entry.id),
                crate::ErrorContext::new().with_field_path(format!("{}.api_key", entry.id)),
            )
        })?;
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: entry.base_url.clone().filter(|u| !u.trim().is_empty()),
            sleeper: Arc::new(TokioSleeper),
            interval_override: entry.poll_interval_secs,
            attempts_override: entry.poll_max_attempts,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_poll_overrides(mut self, interval_secs: Option<u64>, max_attempts: Option<u32>) -> Self {
        self.interval_override = interval_secs;
        self.attempts_override = max_attempts;
        self
    }

    /// Base URL override, or the vendor's public endpoint.
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url.clone().unwrap_or_else(|| default.to_string())
    }

    /// Vendor default schedule with any configured overrides applied.
    pub fn poll_policy(&self, default: PollPolicy) -> PollPolicy {
        default.with_overrides(self.interval_override, self.attempts_override)
    }
}

/// Builds the adapter for a configured provider id.
///
/// Returns `Ok(None)` for ids this crate has no adapter for.
pub fn create_adapter(entry: &ProviderEntry) -> Result<Option<Arc<dyn ProviderAdapter>>> {
    let adapter: Arc<dyn ProviderAdapter> = match entry.id.as_str() {
        "google" => Arc::new(GoogleAdapter::from_entry(entry)?),
        "falai" => Arc::new(FalAiAdapter::from_entry(entry)?),
        "replicate" => Arc::new(ReplicateAdapter::from_entry(entry)?),
        "minimax" => Arc::new(MinimaxAdapter::from_entry(entry)?),
        "openrouter" => Arc::new(OpenRouterAdapter::from_entry(entry)?),
        "runpod" => Arc::new(RunpodAdapter::from_entry(entry)?),
        "devstral" => Arc::new(DevstralAdapter::from_entry(entry)?),
        _ => return Ok(None),
    };
    Ok(Some(adapter))
}
