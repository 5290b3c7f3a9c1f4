//! Processed-message ledger persisted between runs.
//!
//! The ledger is what makes runs idempotent: a message id recorded here is
//! never exported to the sheet a second time, even if Gmail still reports it
//! as unread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, SyncError};

fn default_last_updated() -> DateTime<Utc> {
    Utc::now()
}

/// Set of message ids already exported, plus the time of the last flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedState {
    pub processed_message_ids: HashSet<String>,
    #[serde(default = "default_last_updated")]
    pub last_updated: DateTime<Utc>,
}

impl Default for ProcessedState {
    fn default() -> Self {
        Self {
            processed_message_ids: HashSet::new(),
            last_updated: Utc::now(),
        }
    }
}

impl ProcessedState {
    /// Load state from disk.
    ///
    /// A missing file is a normal first run and yields an empty ledger. A file
    /// that exists but cannot be parsed is fatal: silently resetting it would
    /// re-export every previously processed message.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let state: ProcessedState = serde_json::from_str(&json).map_err(|e| {
                    SyncError::StateCorrupt(format!("{}: {}", path.display(), e))
                })?;
                debug!(
                    path = %path.display(),
                    known = state.processed_message_ids.len(),
                    "loaded processed-message state"
                );
                Ok(state)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no state file found, starting fresh");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.processed_message_ids.contains(message_id)
    }

    pub fn len(&self) -> usize {
        self.processed_message_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed_message_ids.is_empty()
    }

    /// Record message ids as durably exported. Takes effect on disk only at
    /// the next [`flush`](Self::flush).
    pub fn mark_processed<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.processed_message_ids.insert(id.into());
        }
    }

    /// Write the ledger atomically: serialize to a sibling temp file, then
    /// rename over the target so a crash never leaves a half-written file.
    pub async fn flush(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        debug!(
            path = %path.display(),
            known = self.processed_message_ids.len(),
            "flushed processed-message state"
        );
        Ok(())
    }
}
