use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One email extracted and ready for export, fields already truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Gmail message id, used for the processed ledger, never exported
    pub message_id: String,
    pub from: String,
    pub subject: String,
    /// ISO-8601 timestamp string (kept as text, the sheet stores text)
    pub date: String,
    pub content: String,
}

impl MessageRecord {
    /// Row cells in sheet column order: From, Subject, Date, Content.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.from.clone(),
            self.subject.clone(),
            self.date.clone(),
            self.content.clone(),
        ]
    }
}

/// Why a fetched message was excluded from export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    SubjectMismatch,
    NoReplySender,
}

impl std::fmt::Display for FilterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterReason::SubjectMismatch => write!(f, "subject does not match keyword"),
            FilterReason::NoReplySender => write!(f, "sender is a no-reply address"),
        }
    }
}

/// Outcome of one append attempt for one row.
#[derive(Debug, Clone)]
pub struct RowOutcome {
    pub message_id: String,
    /// None means the row landed in the sheet
    pub error: Option<String>,
}

/// Result of appending a batch, after all fallback levels.
#[derive(Debug, Clone, Default)]
pub struct AppendResult {
    pub outcomes: Vec<RowOutcome>,
}

impl AppendResult {
    pub fn appended_ids(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.error.is_none())
            .map(|o| o.message_id.clone())
            .collect()
    }

    pub fn appended_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_none()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}

/// Counters for one pipeline run, reported at the end.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Unread messages Gmail reported
    pub candidates: usize,
    /// Skipped because the ledger already had them
    pub skipped_known: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    pub parse_failures: usize,
    pub filtered_out: usize,
    pub appended: usize,
    pub rows_failed: usize,
    pub marked_read: usize,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            candidates: 0,
            skipped_known: 0,
            fetched: 0,
            fetch_failures: 0,
            parse_failures: 0,
            filtered_out: 0,
            appended: 0,
            rows_failed: 0,
            marked_read: 0,
        }
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
