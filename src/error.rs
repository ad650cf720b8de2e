use crate::error_code::ErrorKind;
use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "providers[2].api_key", "request.sourceImage")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "google.video")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for media-dispatch.
///
/// Adapters use this internally and convert it into a failed
/// [`GenerationResponse`](crate::types::GenerationResponse) at their boundary;
/// only configuration loading and transport construction surface it directly.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote error: HTTP {status} ({kind}): {message}")]
    Remote {
        status: u16,
        kind: ErrorKind,
        message: String,
    },

    /// Vendor answered normally but reported the job as failed or blocked.
    #[error("Provider error ({kind}): {message}")]
    Provider { kind: ErrorKind, message: String },

    #[error("No media in response: {message}")]
    NoResult { message: String },

    #[error("Timed out after {attempts} poll attempts")]
    Timeout { attempts: u32 },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn provider(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Error::Provider {
            kind,
            message: msg.into(),
        }
    }

    pub fn no_result(msg: impl Into<String>) -> Self {
        Error::NoResult {
            message: msg.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Validation { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::InvalidInput,
            Error::Remote { kind, .. } | Error::Provider { kind, .. } => *kind,
            Error::NoResult { .. } => ErrorKind::NoResult,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Transport(TransportError::Http(e)) if e.is_timeout() => ErrorKind::Timeout,
            Error::Configuration { .. }
            | Error::Transport(_)
            | Error::Io(_)
            | Error::Serialization(_) => ErrorKind::Unknown,
        }
    }

    /// The vendor's (or validator's) own wording, when there is any.
    pub fn vendor_message(&self) -> Option<&str> {
        let msg = match self {
            Error::Remote { message, .. }
            | Error::Provider { message, .. }
            | Error::Validation { message, .. } => message.as_str(),
            _ => return None,
        };
        let msg = msg.trim();
        if msg.is_empty() {
            None
        } else {
            Some(msg)
        }
    }
}
