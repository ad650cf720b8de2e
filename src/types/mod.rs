//! 类型模块：分发边界上的请求、响应与能力描述类型。
//!
//! # Types Module
//!
//! Vendor-agnostic shapes that cross the dispatch boundary. Callers build a
//! [`GenerationRequest`], get back a [`GenerationResponse`], and can inspect
//! what each provider offers through [`ModelCapabilities`].
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`GenerationRequest`] | One image/video/text task |
//! | [`GenerationResponse`] | Success with media, or a single error string |
//! | [`ModelCapabilities`] | Static per-provider support flags and cost |
//! | [`ProviderListing`] | Capabilities plus the `available` marker |
//! | [`ImagePayload`] | Checked source image (base64 + mime) |
//!
//! ## Example
//!
//! ```rust
//! use media_dispatch::types::{AspectRatio, GenerationRequest, ProviderId};
//!
//! let req = GenerationRequest::image("a red apple", ProviderId::FALAI)
//!     .with_aspect_ratio(AspectRatio::Landscape)
//!     .with_style("watercolor");
//! assert!(req.has_required_fields());
//! ```

pub mod capabilities;
pub mod media;
pub mod request;
pub mod response;

pub use capabilities::{ModelCapabilities, ProviderListing};
pub use media::ImagePayload;
pub use request::{
    AspectRatio, GenerationRequest, ImageMode, MediaType, ProviderId, SafetyLevel, VideoConfig,
    VideoResolution,
};
pub use response::{GenerationData, GenerationResponse};
