use crate::client::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_SIZE};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "iconify-runner")]
#[command(about = "Turn reference images into styled 3D icons, one at a time")]
#[command(version)]
pub struct Cli {
    /// Reference images to transform, processed in the order given
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Directory the generated icons are written to
    #[arg(short, long, default_value = "./icons")]
    pub out_dir: PathBuf,

    /// Write a JSON manifest of every result to this path
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// API key for the image service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the image service
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Image model identifier
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Square output size token
    #[arg(long, default_value = DEFAULT_SIZE)]
    pub size: String,

    /// Per-request timeout in seconds (waits indefinitely when unset)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the instruction text and planned outputs without calling the service
    #[arg(long)]
    pub dry_run: bool,
}
