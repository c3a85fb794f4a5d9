use crate::client::ApiError;
use thiserror::Error;

/// Classified failures surfaced by the batch pipeline
#[derive(Debug, Error)]
pub enum IconifyError {
    /// Required credential missing; fatal for the whole batch
    #[error("{0}")]
    Configuration(String),

    /// A single input is empty or unusable
    #[error("{0}")]
    Validation(String),

    /// The image service failed for a reason other than parameter support
    #[error(transparent)]
    Upstream(#[from] ApiError),

    /// Neither inline data nor a link came back after the fallback call
    #[error("No image returned by API")]
    EmptyResponse,
}

impl IconifyError {
    pub fn missing_credential() -> Self {
        Self::Configuration(
            "OpenAI API key not configured. Please check your environment variables.".to_string(),
        )
    }

    pub fn empty_batch() -> Self {
        Self::Validation(
            "No images provided. Please select at least one image to process.".to_string(),
        )
    }

    pub fn empty_file() -> Self {
        Self::Validation("Invalid or empty file".to_string())
    }

    /// True for errors that abort the batch before any item is processed
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
