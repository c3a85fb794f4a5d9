use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to the source stem to name the generated icon
pub const OUTPUT_SUFFIX: &str = "-icon.png";

/// Name used when no usable source name exists
pub const UNKNOWN_OUTPUT_NAME: &str = "unknown-icon.png";

/// Stable identifier assigned to a work item when it is enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// An uploaded reference image, captured once and never mutated
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Display name as supplied by the caller (may be empty)
    pub name: String,
    /// Declared media type (may be empty)
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name sent with the upload
    pub fn upload_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "reference.png"
        } else {
            &self.name
        }
    }

    /// Media type sent with the upload
    pub fn upload_media_type(&self) -> &str {
        if self.media_type.trim().is_empty() {
            "image/png"
        } else {
            &self.media_type
        }
    }
}

/// Status of a work item in the batch queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Queued, not yet started
    #[default]
    Pending,
    /// Request in flight
    InProgress,
    /// Icon generated
    Complete,
    /// Validation or upstream failure
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Transitions only move forward: pending -> in_progress -> complete|failed
    pub fn can_advance_to(self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Complete)
                | (Self::InProgress, Self::Failed)
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result held by a terminal work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ItemOutcome {
    /// Base64-encoded PNG
    Image { b64: String },
    Error { message: String },
}

/// One queued image-to-icon transformation
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: ItemId,
    pub source: SourceImage,
    pub status: ItemStatus,
    pub output_name: String,
    pub outcome: Option<ItemOutcome>,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn new(id: ItemId, source: SourceImage) -> Self {
        let output_name = output_name(&source.name);
        Self {
            id,
            source,
            status: ItemStatus::Pending,
            output_name,
            outcome: None,
            enqueued_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn snapshot(&self) -> WorkItemSnapshot {
        WorkItemSnapshot {
            id: self.id,
            source_name: self.source.name.clone(),
            media_type: self.source.media_type.clone(),
            size_bytes: self.source.bytes.len(),
            status: self.status,
            output_name: self.output_name.clone(),
            outcome: self.outcome.clone(),
            enqueued_at: self.enqueued_at,
            finished_at: self.finished_at,
        }
    }

    /// Result record for this item, if it has reached a terminal state
    pub fn result(&self) -> Option<IconResult> {
        match &self.outcome {
            Some(ItemOutcome::Image { b64 }) => Some(IconResult::image(&self.output_name, b64)),
            Some(ItemOutcome::Error { message }) => {
                Some(IconResult::error(&self.output_name, message))
            }
            None => None,
        }
    }
}

/// Read-only view of a work item handed to observers
#[derive(Debug, Clone, Serialize)]
pub struct WorkItemSnapshot {
    pub id: ItemId,
    pub source_name: String,
    pub media_type: String,
    pub size_bytes: usize,
    pub status: ItemStatus,
    pub output_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ItemOutcome>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Per-item record delivered to the result consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IconResult {
    pub fn image(name: &str, b64: &str) -> Self {
        Self {
            name: name.to_string(),
            b64: Some(b64.to_string()),
            error: None,
        }
    }

    pub fn error(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            b64: None,
            error: Some(message.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Derive the icon file name from a source display name.
/// "photo.JPG" -> "photo-icon.png", "photo" -> "photo-icon.png", "" -> "unknown-icon.png"
pub fn output_name(display_name: &str) -> String {
    let name = display_name.trim();

    let stem = match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => &name[..idx],
        _ => name,
    };

    if stem.is_empty() {
        UNKNOWN_OUTPUT_NAME.to_string()
    } else {
        format!("{}{}", stem, OUTPUT_SUFFIX)
    }
}
