use crate::client::{ImageEditApi, OpenAiImages};
use crate::config::Config;
use crate::error::IconifyError;
use crate::negotiator::{NegotiatorSettings, RequestNegotiator};
use crate::prompt::build_instruction;
use crate::queue::{BatchQueue, QueueEvent};
use crate::style::StylePreset;
use crate::types::{IconResult, ItemStatus, SourceImage};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Name used for results that describe the whole batch rather than one file
pub const BATCH_ERROR_NAME: &str = "error";

/// Run one batch against the configured image service.
///
/// Batch-level problems (missing credential, nothing to process) come back
/// as a single error result and no request is made.
pub async fn run(
    config: &Config,
    preset: &StylePreset,
    files: Vec<SourceImage>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<Vec<IconResult>> {
    let api_key = match config.credential() {
        Ok(key) => key,
        Err(e) => return Ok(vec![batch_error(e)]),
    };

    let api = OpenAiImages::new(&config.base_url, api_key, config.request_timeout)?;
    run_with_api(config, preset, Arc::new(api), files, shutdown_rx).await
}

/// Same as [`run`] with a caller-supplied API, after the credential check
pub async fn run_with_api<A>(
    config: &Config,
    preset: &StylePreset,
    api: Arc<A>,
    files: Vec<SourceImage>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<Vec<IconResult>>
where
    A: ImageEditApi + 'static,
{
    if files.is_empty() {
        return Ok(vec![batch_error(IconifyError::empty_batch())]);
    }

    let instruction = build_instruction(preset)?;
    let negotiator = RequestNegotiator::new(
        api,
        NegotiatorSettings {
            model: config.model.clone(),
            size: config.size.clone(),
        },
    );
    let queue = BatchQueue::spawn(negotiator, instruction);

    let observer = tokio::spawn(log_events(queue.subscribe()));

    let total = files.len();
    queue.submit(files).await?;
    info!(files = total, model = %config.model, size = %config.size, "Starting batch");

    let mut shutdown_rx = shutdown_rx;
    tokio::select! {
        _ = queue.wait_idle() => {
            info!("All items resolved");
        }
        Ok(()) = shutdown_rx.recv() => {
            let unfinished: Vec<_> = queue
                .snapshot()
                .await
                .into_iter()
                .filter(|item| !item.status.is_terminal())
                .collect();
            for item in &unfinished {
                warn!(item = %item.id, name = %item.output_name, status = %item.status, "Abandoned");
            }
            warn!(
                abandoned = unfinished.len(),
                "Shutdown requested, abandoning unfinished items"
            );
        }
    }

    let results = queue.results().await;
    let summary = queue.summary().await;
    info!(
        total = summary.total,
        complete = summary.complete,
        failed = summary.failed,
        "Batch finished"
    );

    queue.clear().await;
    drop(queue);
    let _ = observer.await;

    Ok(results)
}

fn batch_error(e: IconifyError) -> IconResult {
    if e.is_batch_fatal() {
        error!(error = %e, "Batch rejected");
    } else {
        warn!(error = %e, "Batch rejected");
    }
    IconResult::error(BATCH_ERROR_NAME, &e.to_string())
}

/// Log queue transitions as they happen
async fn log_events(mut rx: broadcast::Receiver<QueueEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event.status {
                ItemStatus::Pending => {}
                ItemStatus::InProgress => info!(item = %event.item_id, name = %event.name, "Generating…"),
                ItemStatus::Complete => info!(item = %event.item_id, name = %event.name, "Ready"),
                ItemStatus::Failed => warn!(item = %event.item_id, name = %event.name, "Failed"),
            },
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Event observer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
