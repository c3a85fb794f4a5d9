use crate::client::{ApiError, Background, EditRequest, EditResponse, ImageDatum, ImageEditApi};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{Notify, Semaphore};

/// What the stub saw for one edit call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEdit {
    pub image_name: String,
    pub background: Option<Background>,
    pub model: String,
    pub prompt: String,
    pub size: String,
    pub n: u32,
}

/// Replays scripted edit responses in order and records every call
#[derive(Default)]
pub struct ScriptedApi {
    edits: Mutex<VecDeque<Result<EditResponse, ApiError>>>,
    fetches: Mutex<HashMap<String, Result<Vec<u8>, ApiError>>>,
    recorded: Mutex<Vec<RecordedEdit>>,
    fetch_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// When set, each edit call holds until a permit is released
    gate: Option<Semaphore>,
    entered: Notify,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit calls block after being recorded until [`ScriptedApi::release`]
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Let `n` more gated edit calls return
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Resolve once at least `n` edit calls have been recorded
    pub async fn wait_for_edits(&self, n: usize) {
        loop {
            let entered = self.entered.notified();
            if self.edit_count() >= n {
                return;
            }
            entered.await;
        }
    }

    pub fn push_edit(&self, result: Result<EditResponse, ApiError>) -> &Self {
        self.edits.lock().unwrap().push_back(result);
        self
    }

    pub fn push_inline(&self, b64: &str) -> &Self {
        self.push_edit(Ok(inline(b64)))
    }

    pub fn push_url(&self, url: &str) -> &Self {
        self.push_edit(Ok(linked(url)))
    }

    pub fn push_error(&self, status: u16, message: &str) -> &Self {
        self.push_edit(Err(api_error(status, message)))
    }

    pub fn serve(&self, url: &str, bytes: Vec<u8>) -> &Self {
        self.fetches.lock().unwrap().insert(url.to_string(), Ok(bytes));
        self
    }

    pub fn edits(&self) -> Vec<RecordedEdit> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn edit_count(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub fn inline(b64: &str) -> EditResponse {
    EditResponse {
        data: vec![ImageDatum {
            b64_json: Some(b64.to_string()),
            url: None,
        }],
    }
}

pub fn linked(url: &str) -> EditResponse {
    EditResponse {
        data: vec![ImageDatum {
            b64_json: None,
            url: Some(url.to_string()),
        }],
    }
}

pub fn api_error(status: u16, message: &str) -> ApiError {
    ApiError::Status {
        status,
        message: message.to_string(),
        code: None,
        param: None,
    }
}

#[async_trait]
impl ImageEditApi for ScriptedApi {
    async fn edit(&self, request: EditRequest<'_>) -> Result<EditResponse, ApiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.recorded.lock().unwrap().push(RecordedEdit {
            image_name: request.image.name.clone(),
            background: request.background,
            model: request.model.to_string(),
            prompt: request.prompt.to_string(),
            size: request.size.to_string(),
            n: request.n,
        });
        self.entered.notify_waiters();

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        // Give other tasks a chance to run while this call is "in flight"
        tokio::task::yield_now().await;

        let next = self
            .edits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(EditResponse::default()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.fetches
            .lock()
            .unwrap()
            .remove(url)
            .unwrap_or_else(|| Err(api_error(404, "Not Found")))
    }
}
