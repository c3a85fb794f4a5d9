mod cli;
mod client;
mod config;
mod error;
mod files;
mod negotiator;
mod prompt;
mod queue;
mod runner;
mod style;
#[cfg(test)]
mod stub;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use config::Config;
use style::StylePreset;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    // A missing .env is fine; the key may come from the environment or --api-key
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;
    let preset = StylePreset::baked()?;

    let sources = files::load_sources(&cli.images)?;
    info!(images = sources.len(), preset = %preset.name, "Loaded reference images");

    // Dry run: show the instruction and planned outputs, make no calls
    if cli.dry_run {
        let instruction = prompt::build_instruction(&preset)?;
        println!("{}", instruction);
        for source in &sources {
            info!(
                source = %source.name,
                output = %types::output_name(&source.name),
                bytes = source.bytes.len(),
                "Planned"
            );
        }
        info!("Dry run complete - no requests sent");
        return Ok(());
    }

    // Set up shutdown signal handler
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, abandoning remaining items");
        let _ = shutdown_tx.send(());
    });

    let results = runner::run(&config, &preset, sources, shutdown_rx).await?;

    let written = files::write_icons(&config.out_dir, &results)?;
    if let Some(ref manifest) = config.manifest {
        files::write_manifest(manifest, &results)
            .with_context(|| format!("Failed to save manifest: {}", manifest.display()))?;
        info!(manifest = %manifest.display(), "Saved manifest");
    }

    let failures: Vec<_> = results.iter().filter(|r| r.is_error()).collect();
    for failure in &failures {
        error!(
            name = %failure.name,
            error = failure.error.as_deref().unwrap_or_default(),
            "Not generated"
        );
    }
    info!(
        written = written.len(),
        failed = failures.len(),
        out_dir = %config.out_dir.display(),
        "Done"
    );

    if !failures.is_empty() && written.is_empty() {
        anyhow::bail!("No icons were generated");
    }

    Ok(())
}
