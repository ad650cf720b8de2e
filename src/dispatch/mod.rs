//! 分发入口：注册表查找 → 能力校验 → 调用适配器
//!
//! Dispatch entry point. Ties the registry, the validator and one adapter
//! together for a single request. No retries happen here; whatever the
//! adapter returns is final.

pub mod validation;

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error_code::ErrorKind;
use crate::registry::ProviderRegistry;
use crate::types::{GenerationRequest, GenerationResponse, MediaType};

pub use validation::{validate, Violation};

pub const MISSING_FIELDS: &str = "Missing required fields: prompt, provider, type";
pub const INVALID_TYPE: &str = "Invalid type. Must be \"image\", \"video\" or \"text\"";

/// Routes requests to configured providers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Runs one request to completion.
    ///
    /// Input errors (missing fields, unknown provider, capability mismatch,
    /// unrecognized type) are answered before any network call.
    pub async fn dispatch(&self, request: &GenerationRequest) -> GenerationResponse {
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        let (Some(provider), Some(media_type)) = (&request.provider, request.media_type) else {
            return reject(request_id, ErrorKind::InvalidInput, MISSING_FIELDS);
        };
        if !request.has_required_fields() {
            return reject(request_id, ErrorKind::InvalidInput, MISSING_FIELDS);
        }

        let Some(adapter) = self.registry.get(provider) else {
            return reject(
                request_id,
                ErrorKind::ProviderUnavailable,
                format!("Provider '{}' not available. Check server configuration.", provider),
            );
        };

        if let Err(violation) = validate(request, adapter.capabilities()) {
            return reject(request_id, violation.kind(), violation.to_string());
        }

        info!(
            request_id = %request_id,
            provider = %provider,
            media_type = %media_type,
            "dispatching generation request"
        );
        let response = match media_type {
            MediaType::Image => adapter.generate_image(request).await,
            MediaType::Video => adapter.generate_video(request).await,
            MediaType::Text => adapter.generate_text(request).await,
            MediaType::Unrecognized => {
                return reject(request_id, ErrorKind::InvalidInput, INVALID_TYPE);
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &response {
            GenerationResponse::Success(data) => info!(
                request_id = %request_id,
                provider = %provider,
                mime_type = %data.mime_type,
                elapsed_ms,
                "generation succeeded"
            ),
            GenerationResponse::Failure { kind, error } => warn!(
                request_id = %request_id,
                provider = %provider,
                kind = kind.name(),
                error = %error,
                elapsed_ms,
                "generation failed"
            ),
        }
        response
    }
}

fn reject(request_id: Uuid, kind: ErrorKind, message: impl Into<String>) -> GenerationResponse {
    let message = message.into();
    info!(request_id = %request_id, kind = kind.name(), reason = %message, "request rejected");
    GenerationResponse::failure(kind, message)
}
