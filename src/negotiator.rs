use crate::client::{ApiError, Background, EditRequest, EditResponse, ImageEditApi};
use crate::error::IconifyError;
use crate::types::SourceImage;
use base64::{engine::general_purpose, Engine};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The call shapes tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// Edit with the transparent-background directive
    WithTransparency,
    /// Same edit without the directive
    Plain,
}

impl RequestShape {
    fn background(self) -> Option<Background> {
        match self {
            Self::WithTransparency => Some(Background::Transparent),
            Self::Plain => None,
        }
    }

    fn tier(self) -> u8 {
        match self {
            Self::WithTransparency => 1,
            Self::Plain => 2,
        }
    }
}

/// Outcome of a single tier that did not produce an image
#[derive(Debug)]
pub enum AttemptError {
    /// The service does not support a parameter of this shape
    CompatibilityRejected(ApiError),
    /// The call succeeded but carried neither inline data nor a link
    NoImage,
    /// Anything else; never retried
    Fatal(IconifyError),
}

/// Output shape requested from the service
#[derive(Debug, Clone)]
pub struct NegotiatorSettings {
    pub model: String,
    pub size: String,
}

impl Default for NegotiatorSettings {
    fn default() -> Self {
        Self {
            model: crate::client::DEFAULT_MODEL.to_string(),
            size: crate::client::DEFAULT_SIZE.to_string(),
        }
    }
}

/// Turns one source image plus instruction text into one base64 PNG.
///
/// The first call asks for a transparent background. Only a parameter
/// rejection of that call leads to a second call without it, so at most
/// two edit calls and one link fetch are made per image.
pub struct RequestNegotiator<A> {
    api: Arc<A>,
    settings: NegotiatorSettings,
}

impl<A: ImageEditApi> RequestNegotiator<A> {
    pub fn new(api: Arc<A>, settings: NegotiatorSettings) -> Self {
        Self { api, settings }
    }

    /// Produce a base64-encoded PNG for `source`.
    ///
    /// Never returns an empty string on success.
    pub async fn transform(
        &self,
        source: &SourceImage,
        instruction: &str,
    ) -> Result<String, IconifyError> {
        if source.is_empty() {
            return Err(IconifyError::empty_file());
        }

        match self.attempt(RequestShape::WithTransparency, source, instruction).await {
            Ok(b64) => return Ok(b64),
            Err(AttemptError::CompatibilityRejected(e)) => {
                info!(
                    image = source.upload_name(),
                    param = e.param().unwrap_or_default(),
                    error = %e,
                    "Transparent background not supported, retrying without it"
                );
            }
            Err(AttemptError::NoImage) => {
                warn!(
                    image = source.upload_name(),
                    "No image in transparent-background response, retrying without it"
                );
            }
            Err(AttemptError::Fatal(e)) => return Err(e),
        }

        match self.attempt(RequestShape::Plain, source, instruction).await {
            Ok(b64) => Ok(b64),
            Err(AttemptError::NoImage) => Err(IconifyError::EmptyResponse),
            // A rejection on the plain shape is a genuine upstream failure
            Err(AttemptError::CompatibilityRejected(e)) => Err(IconifyError::Upstream(e)),
            Err(AttemptError::Fatal(e)) => Err(e),
        }
    }

    /// Run one tier and extract its payload
    pub async fn attempt(
        &self,
        shape: RequestShape,
        source: &SourceImage,
        instruction: &str,
    ) -> Result<String, AttemptError> {
        let request = EditRequest {
            model: &self.settings.model,
            prompt: instruction,
            image: source,
            size: &self.settings.size,
            n: 1,
            background: shape.background(),
        };

        debug!(tier = shape.tier(), image = source.upload_name(), "Edit attempt");

        let response = match self.api.edit(request).await {
            Ok(response) => response,
            Err(e) if shape == RequestShape::WithTransparency && e.is_unsupported_parameter() => {
                return Err(AttemptError::CompatibilityRejected(e));
            }
            Err(e) => return Err(AttemptError::Fatal(IconifyError::Upstream(e))),
        };

        self.extract_payload(&response).await
    }

    /// Inline base64 first, then the linked image re-encoded
    async fn extract_payload(&self, response: &EditResponse) -> Result<String, AttemptError> {
        if let Some(b64) = response.inline_b64() {
            return Ok(b64.to_string());
        }

        let Some(url) = response.image_url() else {
            return Err(AttemptError::NoImage);
        };

        let bytes = self
            .api
            .fetch_image(url)
            .await
            .map_err(|e| AttemptError::Fatal(IconifyError::Upstream(e)))?;

        // The service did answer with an image; an empty download is not retried
        if bytes.is_empty() {
            return Err(AttemptError::Fatal(IconifyError::EmptyResponse));
        }

        Ok(general_purpose::STANDARD.encode(bytes))
    }
}
