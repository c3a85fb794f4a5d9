use crate::client::ImageEditApi;
use crate::error::IconifyError;
use crate::negotiator::RequestNegotiator;
use crate::types::{
    IconResult, ItemId, ItemOutcome, ItemStatus, SourceImage, WorkItem, WorkItemSnapshot,
};
use async_channel::{unbounded, Receiver, Sender};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Buffered events per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 256;

/// Emitted on every work item transition, including enqueue
#[derive(Debug, Clone, Serialize)]
pub struct QueueEvent {
    pub item_id: ItemId,
    /// Output name of the item
    pub name: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ItemOutcome>,
}

/// Counts per status
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub complete: usize,
    pub failed: usize,
}

/// State shared between the controller handle and its worker
struct Shared {
    items: Mutex<Vec<WorkItem>>,
    events: broadcast::Sender<QueueEvent>,
    idle: Notify,
    next_id: AtomicU64,
}

impl Shared {
    fn emit(&self, item: &WorkItem) {
        // No subscribers is fine
        let _ = self.events.send(QueueEvent {
            item_id: item.id,
            name: item.output_name.clone(),
            status: item.status,
            outcome: item.outcome.clone(),
        });
    }

    /// Move an item to in-progress and hand back its source.
    /// Returns None if the item was cleared or is not pending.
    async fn begin(&self, id: ItemId) -> Option<SourceImage> {
        let mut items = self.items.lock().await;
        let item = items.iter_mut().find(|item| item.id == id)?;

        if !item.status.can_advance_to(ItemStatus::InProgress) {
            warn!(item = %id, status = %item.status, "Refusing to start item");
            return None;
        }

        item.status = ItemStatus::InProgress;
        self.emit(item);
        Some(item.source.clone())
    }

    /// Record the terminal state of an item
    async fn finish(&self, id: ItemId, result: Result<String, IconifyError>) {
        let mut items = self.items.lock().await;

        match items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                let (status, outcome) = match result {
                    Ok(b64) => (ItemStatus::Complete, ItemOutcome::Image { b64 }),
                    Err(e) => (
                        ItemStatus::Failed,
                        ItemOutcome::Error {
                            message: e.to_string(),
                        },
                    ),
                };

                if !item.status.can_advance_to(status) {
                    warn!(item = %id, from = %item.status, to = %status, "Refusing transition");
                    return;
                }

                item.status = status;
                item.outcome = Some(outcome);
                item.finished_at = Some(Utc::now());
                self.emit(item);
            }
            None => {
                info!(item = %id, "Item cleared while in flight, discarding result");
            }
        }

        if items.iter().all(|item| item.status.is_terminal()) {
            self.idle.notify_waiters();
        }
    }
}

/// Ordered, observable queue of icon transformations.
///
/// A single worker drains the queue, so exactly one item is in flight at a
/// time and items resolve in submission order.
pub struct BatchQueue {
    shared: Arc<Shared>,
    tx: Sender<ItemId>,
    worker: JoinHandle<()>,
}

impl BatchQueue {
    /// Start the worker. `instruction` is sent with every item.
    pub fn spawn<A>(negotiator: RequestNegotiator<A>, instruction: String) -> Self
    where
        A: ImageEditApi + 'static,
    {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            items: Mutex::new(Vec::new()),
            events,
            idle: Notify::new(),
            next_id: AtomicU64::new(1),
        });

        let (tx, rx) = unbounded::<ItemId>();
        let worker = tokio::spawn(worker(Arc::clone(&shared), rx, negotiator, instruction));

        Self { shared, tx, worker }
    }

    /// Enqueue one work item per file, in the given order
    pub async fn submit(&self, files: Vec<SourceImage>) -> Result<Vec<ItemId>, IconifyError> {
        if files.is_empty() {
            return Err(IconifyError::empty_batch());
        }

        let mut ids = Vec::with_capacity(files.len());
        let mut items = self.shared.items.lock().await;
        for source in files {
            let id = ItemId(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
            let item = WorkItem::new(id, source);
            info!(item = %id, name = %item.output_name, bytes = item.source.bytes.len(), "Queued");
            self.shared.emit(&item);
            items.push(item);
            ids.push(id);

            // Sent under the items lock so channel order matches queue order
            if self.tx.try_send(id).is_err() {
                error!(item = %id, "Worker is gone, item will not be processed");
            }
        }

        Ok(ids)
    }

    /// Ordered snapshots of every item
    pub async fn snapshot(&self) -> Vec<WorkItemSnapshot> {
        let items = self.shared.items.lock().await;
        items.iter().map(WorkItem::snapshot).collect()
    }

    /// Result records for every terminal item, in submission order
    pub async fn results(&self) -> Vec<IconResult> {
        let items = self.shared.items.lock().await;
        items.iter().filter_map(WorkItem::result).collect()
    }

    /// Receive every transition from now on
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }

    pub async fn is_idle(&self) -> bool {
        let items = self.shared.items.lock().await;
        items.iter().all(|item| item.status.is_terminal())
    }

    /// Resolve once no item is pending or in progress
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.is_idle().await {
                return;
            }
            notified.await;
        }
    }

    /// Discard every item. A result still in flight is dropped on arrival.
    pub async fn clear(&self) -> usize {
        let mut items = self.shared.items.lock().await;
        let discarded = items.len();
        items.clear();
        self.shared.idle.notify_waiters();
        info!(discarded, "Queue cleared");
        discarded
    }

    pub async fn summary(&self) -> QueueSummary {
        let items = self.shared.items.lock().await;
        let mut summary = QueueSummary::default();
        for item in items.iter() {
            match item.status {
                ItemStatus::Pending => summary.pending += 1,
                ItemStatus::InProgress => summary.in_progress += 1,
                ItemStatus::Complete => summary.complete += 1,
                ItemStatus::Failed => summary.failed += 1,
            }
        }
        summary.total = items.len();
        summary
    }
}

impl Drop for BatchQueue {
    fn drop(&mut self) {
        self.tx.close();
        self.worker.abort();
    }
}

async fn worker<A: ImageEditApi>(
    shared: Arc<Shared>,
    rx: Receiver<ItemId>,
    negotiator: RequestNegotiator<A>,
    instruction: String,
) {
    while let Ok(id) = rx.recv().await {
        let Some(source) = shared.begin(id).await else {
            continue;
        };

        info!(item = %id, name = %source.upload_name(), "Generating icon");

        let result = if source.is_empty() {
            Err(IconifyError::empty_file())
        } else {
            negotiator.transform(&source, &instruction).await
        };

        match &result {
            Ok(_) => info!(item = %id, "Icon complete"),
            Err(e) => error!(item = %id, name = %source.upload_name(), error = %e, "Icon failed"),
        }

        shared.finish(id, result).await;
    }

    info!("Queue worker shutting down");
}
