//! Failure taxonomy for generation responses.
//!
//! Every failed [`GenerationResponse`](crate::types::GenerationResponse) carries
//! one [`ErrorKind`]. Kinds are stable across providers, so callers can branch
//! on them without parsing message text.
//!
//! ## Code Categories
//!
//! | Prefix | Category | Description                                   |
//! |--------|----------|-----------------------------------------------|
//! | E1xxx  | request  | Rejected before any vendor call is made       |
//! | E2xxx  | access   | Vendor refused the credentials or throttled   |
//! | E3xxx  | outcome  | Vendor call ran but produced no usable media  |
//! | E9xxx  | unknown  | Catch-all / unclassified                      |
//!
//! ## Example
//!
//! ```rust
//! use media_dispatch::error_code::ErrorKind;
//!
//! let kind = ErrorKind::from_http_status(429);
//! assert_eq!(kind, ErrorKind::QuotaExceeded);
//! assert_eq!(kind.code(), "E2002");
//! assert_eq!(kind.category(), "access");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// General cause of a failed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// E1001: Missing prompt/provider/type, unknown media type, or undecodable source image
    InvalidInput,
    /// E1002: Requested provider is not registered
    ProviderUnavailable,
    /// E1003: Provider's capabilities exclude the requested operation
    CapabilityMismatch,
    /// E2001: Vendor rejected the credentials
    Authentication,
    /// E2002: Vendor throttled the request or the account quota is spent
    QuotaExceeded,
    /// E3001: Vendor blocked generation on policy grounds
    ContentSafety,
    /// E3002: Vendor call succeeded but no media was found in the response
    NoResult,
    /// E3003: Poll loop ran out of attempts
    Timeout,
    /// E9999: Anything else
    Unknown,
}

impl ErrorKind {
    /// Returns the stable code string (e.g., `"E1001"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput => "E1001",
            Self::ProviderUnavailable => "E1002",
            Self::CapabilityMismatch => "E1003",
            Self::Authentication => "E2001",
            Self::QuotaExceeded => "E2002",
            Self::ContentSafety => "E3001",
            Self::NoResult => "E3002",
            Self::Timeout => "E3003",
            Self::Unknown => "E9999",
        }
    }

    /// Returns the snake_case name used on the wire (e.g., `"quota_exceeded"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::CapabilityMismatch => "capability_mismatch",
            Self::Authentication => "authentication",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ContentSafety => "content_safety",
            Self::NoResult => "no_result",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Returns the category: `"request"`, `"access"`, `"outcome"`, or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput | Self::ProviderUnavailable | Self::CapabilityMismatch => "request",
            Self::Authentication | Self::QuotaExceeded => "access",
            Self::ContentSafety | Self::NoResult | Self::Timeout => "outcome",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the failure was decided locally, before any vendor call.
    #[inline]
    pub fn is_pre_dispatch(&self) -> bool {
        self.category() == "request"
    }

    /// Maps a vendor error code/type string to a kind.
    ///
    /// Covers the common spellings vendors use in their error payloads,
    /// e.g. `"invalid_api_key"`, `"rate_limit_exceeded"`, `"content_policy_violation"`.
    pub fn from_provider_code(provider_code: &str) -> Option<Self> {
        let kind = match provider_code {
            "unauthenticated" | "invalid_api_key" | "authentication_error" | "permission_denied"
            | "PERMISSION_DENIED" | "UNAUTHENTICATED" => Self::Authentication,
            "rate_limited" | "rate_limit_exceeded" | "insufficient_quota" | "quota_exceeded"
            | "RESOURCE_EXHAUSTED" => Self::QuotaExceeded,
            "content_policy_violation" | "safety" | "SAFETY" | "PROHIBITED_CONTENT" | "nsfw" => {
                Self::ContentSafety
            }
            "timeout" | "DEADLINE_EXCEEDED" => Self::Timeout,
            _ => return None,
        };
        Some(kind)
    }

    /// Maps an HTTP status code to the most likely kind.
    ///
    /// Status codes without a mapping return `ErrorKind::Unknown`.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            402 | 429 => Self::QuotaExceeded,
            408 | 504 => Self::Timeout,
            451 => Self::ContentSafety,
            _ => Self::Unknown,
        }
    }

    /// Looks for policy-block wording in a vendor message.
    ///
    /// Vendors rarely return a dedicated status for safety blocks; the text is
    /// the only signal.
    pub fn from_vendor_message(message: &str) -> Option<Self> {
        let lower = message.to_ascii_lowercase();
        const SAFETY_MARKERS: [&str; 5] = ["filtered", "nsfw", "safety", "content policy", "blocked"];
        if SAFETY_MARKERS.iter().any(|m| lower.contains(m)) {
            return Some(Self::ContentSafety);
        }
        if lower.contains("quota") || lower.contains("rate limit") {
            return Some(Self::QuotaExceeded);
        }
        if lower.contains("unauthorized") || lower.contains("invalid api key") {
            return Some(Self::Authentication);
        }
        None
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
