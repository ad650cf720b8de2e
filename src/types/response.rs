//! Normalized generation response.
//!
//! On the wire a response is `{ "success": true, "data": {...} }` or
//! `{ "success": false, "error": "...", "errorKind": "..." }`. In Rust it is an
//! enum, so a value carrying both data and an error cannot be built.

use crate::error_code::ErrorKind;
use crate::types::request::ProviderId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of a successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_base64: Option<String>,
    pub mime_type: String,
    pub provider: ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl GenerationData {
    pub fn from_url(url: impl Into<String>, mime_type: impl Into<String>, provider: ProviderId) -> Self {
        Self {
            media_url: Some(url.into()),
            media_base64: None,
            mime_type: mime_type.into(),
            provider,
            cost: None,
            seed: None,
            metadata: None,
        }
    }

    pub fn from_base64(
        data: impl Into<String>,
        mime_type: impl Into<String>,
        provider: ProviderId,
    ) -> Self {
        Self {
            media_url: None,
            media_base64: Some(data.into()),
            mime_type: mime_type.into(),
            provider,
            cost: None,
            seed: None,
            metadata: None,
        }
    }

    pub fn with_cost(mut self, cost: Option<f64>) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Result of one dispatch: either full media or a single descriptive error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireResponse", try_from = "WireResponse")]
pub enum GenerationResponse {
    Success(GenerationData),
    Failure { kind: ErrorKind, error: String },
}

impl GenerationResponse {
    pub fn success(data: GenerationData) -> Self {
        GenerationResponse::Success(data)
    }

    pub fn failure(kind: ErrorKind, error: impl Into<String>) -> Self {
        GenerationResponse::Failure {
            kind,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResponse::Success(_))
    }

    pub fn data(&self) -> Option<&GenerationData> {
        match self {
            GenerationResponse::Success(data) => Some(data),
            GenerationResponse::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            GenerationResponse::Success(_) => None,
            GenerationResponse::Failure { error, .. } => Some(error),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            GenerationResponse::Success(_) => None,
            GenerationResponse::Failure { kind, .. } => Some(*kind),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<GenerationData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

impl From<GenerationResponse> for WireResponse {
    fn from(resp: GenerationResponse) -> Self {
        match resp {
            GenerationResponse::Success(data) => WireResponse {
                success: true,
                data: Some(data),
                error: None,
                error_kind: None,
            },
            GenerationResponse::Failure { kind, error } => WireResponse {
                success: false,
                data: None,
                error: Some(error),
                error_kind: Some(kind),
            },
        }
    }
}

impl TryFrom<WireResponse> for GenerationResponse {
    type Error = String;

    fn try_from(wire: WireResponse) -> std::result::Result<Self, Self::Error> {
        let has_error = wire.error.as_deref().is_some_and(|e| !e.is_empty());
        match (wire.success, wire.data, has_error) {
            (true, Some(data), false) => Ok(GenerationResponse::Success(data)),
            (true, None, _) => Err("successful response without data".to_string()),
            (false, None, _) => Ok(GenerationResponse::Failure {
                kind: wire.error_kind.unwrap_or(ErrorKind::Unknown),
                error: wire
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "Generation failed".to_string()),
            }),
            _ => Err("response carries both data and error".to_string()),
        }
    }
}
