//! 请求能力校验：在任何网络调用之前，检查请求是否在提供商能力范围内。
//!
//! Request-vs-capability check, run before any network call.

use thiserror::Error;

use crate::error_code::ErrorKind;
use crate::types::{GenerationRequest, MediaType, ModelCapabilities};
use crate::{Error as CrateError, ErrorContext};

/// The first rule a request breaks. `Display` is the user-facing reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("Provider does not support image generation")]
    ImageUnsupported,
    #[error("Provider does not support video generation")]
    VideoUnsupported,
    #[error("Provider does not support text generation")]
    TextUnsupported,
    #[error("Provider does not support image-to-image")]
    ImageToImageUnsupported,
    #[error("Provider does not support image-to-video")]
    ImageToVideoUnsupported,
    #[error("Provider does not support multiple source images")]
    MultipleImagesUnsupported,
}

impl Violation {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::CapabilityMismatch
    }

    fn field_path(&self) -> &'static str {
        match self {
            Violation::ImageUnsupported | Violation::VideoUnsupported | Violation::TextUnsupported => {
                "request.type"
            }
            Violation::ImageToImageUnsupported | Violation::ImageToVideoUnsupported => {
                "request.sourceImage"
            }
            Violation::MultipleImagesUnsupported => "request.sourceImages",
        }
    }
}

impl From<Violation> for CrateError {
    fn from(v: Violation) -> Self {
        CrateError::validation_with_context(
            v.to_string(),
            ErrorContext::new()
                .with_field_path(v.field_path())
                .with_source("capability_validator"),
        )
    }
}

/// Checks `request` against `caps`. Pure; rules apply in a fixed order and
/// the first failure is returned.
///
/// Text is gated on the provider being the designated text provider rather
/// than on a descriptor flag. Requests without a recognized media type are
/// left for the dispatcher to reject.
pub fn validate(request: &GenerationRequest, caps: &ModelCapabilities) -> Result<(), Violation> {
    match request.media_type {
        Some(MediaType::Image) if !caps.supports_image => return Err(Violation::ImageUnsupported),
        Some(MediaType::Video) if !caps.supports_video => return Err(Violation::VideoUnsupported),
        Some(MediaType::Text) if !caps.provider.is_text_provider() => {
            return Err(Violation::TextUnsupported)
        }
        _ => {}
    }

    if request.source_image.is_some() {
        match request.media_type {
            Some(MediaType::Image) if !caps.supports_image_to_image => {
                return Err(Violation::ImageToImageUnsupported)
            }
            Some(MediaType::Video) if !caps.supports_image_to_video => {
                return Err(Violation::ImageToVideoUnsupported)
            }
            _ => {}
        }
    }

    if request.source_images.len() > 1 && !caps.supports_multiple_images {
        return Err(Violation::MultipleImagesUnsupported);
    }

    Ok(())
}
