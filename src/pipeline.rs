//! The run orchestrator: one batch pass from unread inbox to sheet rows.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::MailClient;
use crate::error::Result;
use crate::models::{MessageRecord, RunSummary};
use crate::parser::{parse_message, MessageFilter};
use crate::sheets::SheetWriter;
use crate::state::ProcessedState;

/// Phases of a run, in order. `Failed` is reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Loading,
    Fetching,
    Filtering,
    Appending,
    Finalizing,
    Done,
    Failed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Loading => "loading",
            RunPhase::Fetching => "fetching",
            RunPhase::Filtering => "filtering",
            RunPhase::Appending => "appending",
            RunPhase::Finalizing => "finalizing",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One-shot batch pipeline. Construct, call [`run`](Self::run), read the
/// summary. Designed for a single instance at a time; concurrent runs
/// against the same state file would race each other.
pub struct Pipeline {
    mail: Arc<dyn MailClient>,
    writer: SheetWriter,
    filter: MessageFilter,
    state_path: PathBuf,
    max_field_chars: usize,
}

impl Pipeline {
    pub fn new(
        mail: Arc<dyn MailClient>,
        writer: SheetWriter,
        filter: MessageFilter,
        state_path: PathBuf,
        max_field_chars: usize,
    ) -> Self {
        Self {
            mail,
            writer,
            filter,
            state_path,
            max_field_chars,
        }
    }

    fn enter(phase: &mut RunPhase, next: RunPhase) {
        debug!(from = %phase, to = %next, "phase transition");
        *phase = next;
    }

    /// Execute one full pass.
    ///
    /// Ordering guarantees: a message id enters the processed ledger only
    /// after its row is durably in the sheet, the ledger is flushed before
    /// any message is marked read, and messages filtered out stay unread
    /// and unrecorded so a later config change can still pick them up.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut phase = RunPhase::Idle;
        let mut summary = RunSummary::new();

        let outcome = self.run_inner(&mut phase, &mut summary).await;
        summary.finished_at = Some(Utc::now());

        match outcome {
            Ok(()) => {
                Self::enter(&mut phase, RunPhase::Done);
                info!(
                    run_id = %summary.run_id,
                    candidates = summary.candidates,
                    appended = summary.appended,
                    rows_failed = summary.rows_failed,
                    marked_read = summary.marked_read,
                    "run complete"
                );
                Ok(summary)
            }
            Err(e) => {
                Self::enter(&mut phase, RunPhase::Failed);
                warn!(run_id = %summary.run_id, error = %e, "run failed");
                Err(e)
            }
        }
    }

    async fn run_inner(&self, phase: &mut RunPhase, summary: &mut RunSummary) -> Result<()> {
        // Load state before touching any API so a corrupt ledger aborts
        // without side effects
        Self::enter(phase, RunPhase::Loading);
        let mut state = ProcessedState::load(&self.state_path).await?;

        Self::enter(phase, RunPhase::Fetching);
        let candidate_ids = self.mail.list_unread_message_ids().await?;
        summary.candidates = candidate_ids.len();

        let new_ids: Vec<String> = candidate_ids
            .into_iter()
            .filter(|id| !state.contains(id))
            .collect();
        summary.skipped_known = summary.candidates - new_ids.len();

        if new_ids.is_empty() {
            info!("no new unread messages, nothing to do");
            return Ok(());
        }

        // Sequential fetch keeps sheet rows in the order Gmail listed them
        let mut records: Vec<MessageRecord> = Vec::with_capacity(new_ids.len());
        for id in &new_ids {
            let msg = match self.mail.get_message(id).await {
                Ok(msg) => msg,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(message_id = %id, error = %e, "fetch failed, skipping message");
                    summary.fetch_failures += 1;
                    continue;
                }
            };
            summary.fetched += 1;

            match parse_message(&msg, self.max_field_chars) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(message_id = %id, error = %e, "parse failed, skipping message");
                    summary.parse_failures += 1;
                }
            }
        }

        Self::enter(phase, RunPhase::Filtering);
        let mut kept: Vec<MessageRecord> = Vec::with_capacity(records.len());
        for record in records {
            match self.filter.evaluate(&record) {
                // Filtered messages stay unread and out of the ledger, so
                // a later filter change can still export them
                Some(reason) => {
                    debug!(message_id = %record.message_id, reason = %reason, "filtered out");
                    summary.filtered_out += 1;
                }
                None => kept.push(record),
            }
        }

        if kept.is_empty() {
            info!("all new messages filtered out, nothing to append");
            return Ok(());
        }

        Self::enter(phase, RunPhase::Appending);
        self.writer.prepare().await?;
        let append_result = self.writer.append_with_fallback(&kept).await?;
        summary.appended = append_result.appended_count();
        summary.rows_failed = append_result.failed_count();

        Self::enter(phase, RunPhase::Finalizing);
        let appended_ids = append_result.appended_ids();
        if appended_ids.is_empty() {
            return Ok(());
        }

        // Ledger first: a flushed-but-unread message is skipped next run,
        // while an unflushed-but-read one would silently disappear
        state.mark_processed(appended_ids.iter().cloned());
        state.flush(&self.state_path).await?;

        match self.mail.mark_read(&appended_ids).await {
            Ok(count) => summary.marked_read = count,
            Err(e) => {
                warn!(error = %e, "failed to mark messages read, they stay unread");
            }
        }

        Ok(())
    }
}
