use crate::types::SourceImage;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-image-1";
pub const DEFAULT_SIZE: &str = "1024x1024";

/// Error codes the service uses when it rejects a request parameter
const UNSUPPORTED_PARAMETER_CODES: [&str; 2] = ["unknown_parameter", "invalid_parameter"];

/// Message fragments that mean the same thing when no code is present
const UNSUPPORTED_PARAMETER_MESSAGES: [&str; 2] = ["unknown parameter", "invalid parameter"];

/// Background directive sent with the optimistic request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Transparent,
}

impl Background {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
        }
    }
}

/// One edit call: a single image, the instruction, and the output shape
#[derive(Debug, Clone)]
pub struct EditRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub image: &'a SourceImage,
    pub size: &'a str,
    pub n: u32,
    pub background: Option<Background>,
}

/// Response body of the edit endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditResponse {
    #[serde(default)]
    pub data: Vec<ImageDatum>,
}

/// A single generated output; the service fills one of the two fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageDatum {
    #[serde(default)]
    pub b64_json: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl EditResponse {
    /// Non-empty inline payload of the first output
    pub fn inline_b64(&self) -> Option<&str> {
        self.data
            .first()
            .and_then(|d| d.b64_json.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Non-empty link to the first output
    pub fn image_url(&self) -> Option<&str> {
        self.data
            .first()
            .and_then(|d| d.url.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Errors from the image API layer
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status
    #[error("Image API error ({status}): {message}")]
    Status {
        status: u16,
        message: String,
        code: Option<String>,
        param: Option<String>,
    },

    /// A 2xx response whose body could not be decoded
    #[error("Invalid response from image API: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the service rejected a request parameter it does not support.
    /// The structured error code wins; message text is the fallback.
    pub fn is_unsupported_parameter(&self) -> bool {
        match self {
            Self::Status { code, message, .. } => {
                if let Some(code) = code {
                    if UNSUPPORTED_PARAMETER_CODES.contains(&code.as_str()) {
                        return true;
                    }
                }
                let lower = message.to_lowercase();
                UNSUPPORTED_PARAMETER_MESSAGES
                    .iter()
                    .any(|needle| lower.contains(needle))
            }
            Self::Request(_) | Self::Decode(_) => false,
        }
    }

    /// Request parameter the service named in its error, if any
    pub fn param(&self) -> Option<&str> {
        match self {
            Self::Status { param, .. } => param.as_deref(),
            Self::Request(_) | Self::Decode(_) => None,
        }
    }
}

/// `{"error": {...}}` envelope returned with non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    param: Option<String>,
}

/// Build a status error from a response body, preferring the JSON envelope
fn status_error(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ApiError::Status {
            status,
            message: envelope.error.message,
            code: envelope.error.code,
            param: envelope.error.param,
        },
        Err(_) => ApiError::Status {
            status,
            message: body.trim().to_string(),
            code: None,
            param: None,
        },
    }
}

/// The external image-editing service
#[async_trait]
pub trait ImageEditApi: Send + Sync {
    /// Submit one edit call
    async fn edit(&self, request: EditRequest<'_>) -> Result<EditResponse, ApiError>;

    /// Retrieve the bytes of an image returned by link
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

/// OpenAI-compatible images client
pub struct OpenAiImages {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiImages {
    /// Create a client. `timeout` of `None` waits indefinitely.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Reuse an existing [`reqwest::Client`]
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_key: api_key.into(),
        }
    }

    fn build_form(request: &EditRequest<'_>) -> Result<Form, ApiError> {
        let image = Part::bytes(request.image.bytes.clone())
            .file_name(request.image.upload_name().to_string())
            .mime_str(request.image.upload_media_type())?;

        let mut form = Form::new()
            .text("model", request.model.to_string())
            .text("prompt", request.prompt.to_string())
            .part("image", image)
            .text("size", request.size.to_string())
            .text("n", request.n.to_string());

        if let Some(background) = request.background {
            form = form.text("background", background.as_str());
        }

        Ok(form)
    }

    /// Return the response unchanged on 2xx, or a status error built from its body
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(status_error(status.as_u16(), &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ImageEditApi for OpenAiImages {
    async fn edit(&self, request: EditRequest<'_>) -> Result<EditResponse, ApiError> {
        let form = Self::build_form(&request)?;

        debug!(
            model = request.model,
            size = request.size,
            background = request.background.map(Background::as_str),
            image = request.image.upload_name(),
            "Submitting image edit"
        );

        let response = self
            .client
            .post(format!("{}/images/edits", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        debug!(url = %url, "Fetching linked image");

        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
