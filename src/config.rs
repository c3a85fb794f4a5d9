use crate::cli::Cli;
use crate::client::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_SIZE};
use crate::error::IconifyError;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for one batch
#[derive(Debug, Clone)]
pub struct Config {
    /// Service credential; absence is reported per batch, not at startup
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Square size token, e.g. "1024x1024"
    pub size: String,
    pub request_timeout: Option<Duration>,
    pub out_dir: PathBuf,
    pub manifest: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            size: DEFAULT_SIZE.to_string(),
            request_timeout: None,
            out_dir: PathBuf::from("./icons"),
            manifest: None,
        }
    }
}

impl Config {
    /// Create a new config from CLI arguments
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        if !is_square_size(&cli.size) {
            anyhow::bail!("--size must be a square WxH token, got {:?}", cli.size);
        }
        if cli.timeout_secs == Some(0) {
            anyhow::bail!("--timeout-secs must be at least 1");
        }
        if cli.model.trim().is_empty() {
            anyhow::bail!("--model must not be empty");
        }

        Ok(Self {
            api_key: cli.api_key.clone(),
            base_url: cli.base_url.clone(),
            model: cli.model.clone(),
            size: cli.size.clone(),
            request_timeout: cli.timeout_secs.map(Duration::from_secs),
            out_dir: cli.out_dir.clone(),
            manifest: cli.manifest.clone(),
        })
    }

    /// The API key, or the batch-level configuration error
    pub fn credential(&self) -> Result<&str, IconifyError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(IconifyError::missing_credential)
    }
}

/// "1024x1024" style token with equal, non-zero sides
fn is_square_size(size: &str) -> bool {
    match size.split_once('x') {
        Some((w, h)) => match (w.parse::<u32>(), h.parse::<u32>()) {
            (Ok(w), Ok(h)) => w > 0 && w == h,
            _ => false,
        },
        None => false,
    }
}
