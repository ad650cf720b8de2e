//! Static per-provider capability descriptor.

use crate::types::request::ProviderId;
use serde::{Deserialize, Serialize};

/// What one provider can do, and what it costs.
///
/// Built once when an adapter is constructed and only ever handed out by
/// shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCapabilities {
    pub provider: ProviderId,
    pub name: String,
    pub supports_image: bool,
    pub supports_video: bool,
    pub supports_image_to_image: bool,
    pub supports_image_to_video: bool,
    pub supports_multiple_images: bool,
    pub supports_safety_controls: bool,
    #[serde(
        rename = "maxImageResolution",
        alias = "maxResolution",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_resolution: Option<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_video_duration: Option<u32>,
    pub censored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_image: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_video: Option<f64>,
}

impl ModelCapabilities {
    /// A descriptor with every flag off; adapters switch on what they support.
    pub fn new(provider: ProviderId, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            supports_image: false,
            supports_video: false,
            supports_image_to_image: false,
            supports_image_to_video: false,
            supports_multiple_images: false,
            supports_safety_controls: false,
            max_resolution: None,
            max_video_duration: None,
            censored: false,
            cost_per_image: None,
            cost_per_video: None,
        }
    }
}

/// Entry returned by
/// [`ProviderRegistry::all_capabilities`](crate::registry::ProviderRegistry::all_capabilities).
///
/// Only configured providers are listed, so `available` is always `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderListing {
    #[serde(flatten)]
    pub capabilities: ModelCapabilities,
    pub available: bool,
}

impl From<&ModelCapabilities> for ProviderListing {
    fn from(caps: &ModelCapabilities) -> Self {
        Self {
            capabilities: caps.clone(),
            available: true,
        }
    }
}
