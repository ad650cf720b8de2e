//! Normalized generation request.

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Identifier of a configured provider (e.g. `"google"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(Cow<'static, str>);

impl ProviderId {
    pub const GOOGLE: ProviderId = ProviderId(Cow::Borrowed("google"));
    pub const FALAI: ProviderId = ProviderId(Cow::Borrowed("falai"));
    pub const REPLICATE: ProviderId = ProviderId(Cow::Borrowed("replicate"));
    pub const MINIMAX: ProviderId = ProviderId(Cow::Borrowed("minimax"));
    pub const OPENROUTER: ProviderId = ProviderId(Cow::Borrowed("openrouter"));
    pub const RUNPOD: ProviderId = ProviderId(Cow::Borrowed("runpod"));
    /// The single provider allowed to serve text requests.
    pub const DEVSTRAL: ProviderId = ProviderId(Cow::Borrowed("devstral"));

    pub fn new(id: impl Into<String>) -> Self {
        ProviderId(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty or whitespace-only ids name no provider.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Whether this provider is the designated text provider.
    pub fn is_text_provider(&self) -> bool {
        *self == Self::DEVSTRAL
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        ProviderId::new(s)
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        ProviderId(Cow::Owned(s))
    }
}

/// What kind of output is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Text,
    /// Any type string this crate does not know; dispatch rejects it.
    #[serde(other)]
    Unrecognized,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Text => "text",
            MediaType::Unrecognized => "unrecognized",
        }
    }

    /// Fallback failure text for this operation.
    pub fn generic_failure(&self) -> &'static str {
        match self {
            MediaType::Image => "Image generation failed",
            MediaType::Video => "Video generation failed",
            MediaType::Text => "Text generation failed",
            MediaType::Unrecognized => "Generation failed",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(other)]
    Unrecognized,
}

impl AspectRatio {
    /// Canonical default for absent or unrecognized ratios.
    pub const DEFAULT: AspectRatio = AspectRatio::Square;

    /// Collapses `None` and unrecognized values onto the canonical default.
    pub fn resolve(ratio: Option<AspectRatio>) -> AspectRatio {
        match ratio {
            Some(AspectRatio::Unrecognized) | None => Self::DEFAULT,
            Some(r) => r,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square | AspectRatio::Unrecognized => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    Minimal,
    Default,
    Strict,
}

/// How multi-reference providers combine `sourceImages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    Merge,
    Couple,
}

impl ImageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMode::Merge => "merge",
            ImageMode::Couple => "couple",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoResolution {
    #[serde(rename = "720p")]
    Hd,
    #[serde(rename = "1080p")]
    FullHd,
}

impl VideoResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoResolution::Hd => "720p",
            VideoResolution::FullHd => "1080p",
        }
    }
}

/// Video-specific tuning knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<VideoResolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extend: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
}

/// One generation task, as decoded from the dispatch boundary.
///
/// `prompt`, `provider` and `media_type` tolerate absence on decode so that
/// [`Dispatcher::dispatch`](crate::dispatch::Dispatcher::dispatch) can reject
/// the request with a structured failure instead of a decode error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    #[serde(
        rename = "type",
        alias = "mediaType",
        default,
        deserialize_with = "blank_type_as_missing",
        skip_serializing_if = "Option::is_none"
    )]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Base64 or data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_mode: Option<ImageMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_config: Option<VideoConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_level: Option<SafetyLevel>,
}

/// An empty `type` string counts as absent; any other unknown string is
/// kept as [`MediaType::Unrecognized`].
fn blank_type_as_missing<'de, D>(deserializer: D) -> std::result::Result<Option<MediaType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(match raw.as_deref().map(str::trim) {
        None | Some("") => None,
        Some("image") => Some(MediaType::Image),
        Some("video") => Some(MediaType::Video),
        Some("text") => Some(MediaType::Text),
        Some(_) => Some(MediaType::Unrecognized),
    })
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, provider: ProviderId, media_type: MediaType) -> Self {
        Self {
            prompt: prompt.into(),
            provider: Some(provider),
            media_type: Some(media_type),
            ..Default::default()
        }
    }

    pub fn image(prompt: impl Into<String>, provider: ProviderId) -> Self {
        Self::new(prompt, provider, MediaType::Image)
    }

    pub fn video(prompt: impl Into<String>, provider: ProviderId) -> Self {
        Self::new(prompt, provider, MediaType::Video)
    }

    pub fn text(prompt: impl Into<String>, provider: ProviderId) -> Self {
        Self::new(prompt, provider, MediaType::Text)
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_source_image(mut self, image: impl Into<String>) -> Self {
        self.source_image = Some(image.into());
        self
    }

    pub fn with_source_images(mut self, images: Vec<String>) -> Self {
        self.source_images = images;
        self
    }

    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative.into());
        self
    }

    pub fn with_video_config(mut self, config: VideoConfig) -> Self {
        self.video_config = Some(config);
        self
    }

    /// True when prompt, provider and type are all present and non-blank.
    pub fn has_required_fields(&self) -> bool {
        !self.prompt.trim().is_empty()
            && self.provider.as_ref().is_some_and(|p| !p.is_blank())
            && self.media_type.is_some()
    }

    /// Aspect ratio with the canonical default applied.
    pub fn resolved_aspect_ratio(&self) -> AspectRatio {
        AspectRatio::resolve(self.aspect_ratio)
    }
}
