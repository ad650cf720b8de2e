//! # media-dispatch
//!
//! 多厂商生成式媒体 API 的统一分发核心：一个请求进来，一个规范化响应出去。
//!
//! Provider-dispatch core for generative-media APIs. A caller hands over one
//! [`GenerationRequest`] (image, video or text) naming a provider; the crate
//! checks it against that provider's [`ModelCapabilities`], calls the vendor
//! (polling long-running jobs where the vendor works that way) and answers
//! with one [`GenerationResponse`].
//!
//! ## Core Ideas
//!
//! - **One contract**: every provider answers with the same success/failure
//!   shape; vendor trouble never escapes as a panic or a Rust error
//! - **Validate first**: capability mismatches are refused before any
//!   network call
//! - **Configured once**: the [`ProviderRegistry`] is built at startup from
//!   [`Settings`] and is read-only afterwards
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use media_dispatch::{Dispatcher, GenerationRequest, ProviderId, ProviderRegistry, Settings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> media_dispatch::Result<()> {
//!     let registry = ProviderRegistry::initialize(&Settings::load()?);
//!     let dispatcher = Dispatcher::new(Arc::new(registry));
//!
//!     let request = GenerationRequest::image("a lighthouse at dusk", ProviderId::FALAI)
//!         .with_style("oil painting");
//!     let response = dispatcher.dispatch(&request).await;
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Request, response and capability types |
//! | [`config`] | Provider credentials from env or YAML |
//! | [`providers`] | Adapter trait and one adapter per vendor |
//! | [`registry`] | Configured adapters, keyed by provider id |
//! | [`dispatch`] | Entry point and capability validator |
//! | [`resilience`] | Bounded job polling |
//! | [`transport`] | HTTP client with per-vendor auth |
//! | [`error_code`] | Stable failure taxonomy |

pub mod config;
pub mod dispatch;
pub mod error_code;
pub mod providers;
pub mod registry;
pub mod resilience;
pub mod transport;
pub mod types;
pub mod utils;

pub use config::{ProviderEntry, Settings};
pub use dispatch::{validate, Dispatcher, Violation};
pub use error_code::ErrorKind;
pub use providers::ProviderAdapter;
pub use registry::ProviderRegistry;
pub use types::{
    AspectRatio, GenerationData, GenerationRequest, GenerationResponse, MediaType,
    ModelCapabilities, ProviderId, ProviderListing,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
