//! Google Sheets output: tab management, headers, and batched appends.

use async_trait::async_trait;
use google_sheets4::api::{
    AddSheetRequest, BatchUpdateSpreadsheetRequest, Request, SheetProperties, ValueRange,
};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::SheetsHub;
use crate::error::{Result, SyncError};
use crate::models::{AppendResult, MessageRecord, RowOutcome};
use crate::retry::with_backoff;

/// Header row written to a fresh sheet, in column order
pub const EXPECTED_HEADERS: [&str; 4] = ["From", "Subject", "Date", "Content"];

/// Sheets operations the writer needs, as a trait for easier testing
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Create the named tab if the spreadsheet does not have it yet
    async fn ensure_sheet_exists(&self, sheet_name: &str) -> Result<()>;

    /// Read the first row of the tab; None when the tab is empty
    async fn read_header_row(&self, sheet_name: &str) -> Result<Option<Vec<String>>>;

    /// Overwrite the first row of the tab with the given cells
    async fn write_header_row(&self, sheet_name: &str, headers: &[String]) -> Result<()>;

    /// Append rows after the last data row of the tab
    async fn append_rows(&self, sheet_name: &str, rows: &[Vec<String>]) -> Result<()>;
}

/// Production Sheets client with retry logic
pub struct ProductionSheetsClient {
    hub: SheetsHub,
    spreadsheet_id: String,
    max_retries: u32,
    base_delay: Duration,
}

impl ProductionSheetsClient {
    pub fn new(
        hub: SheetsHub,
        spreadsheet_id: String,
        max_retries: u32,
        base_delay: Duration,
    ) -> Self {
        Self {
            hub,
            spreadsheet_id,
            max_retries,
            base_delay,
        }
    }
}

fn to_value_range(rows: &[Vec<String>]) -> ValueRange {
    let values = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| serde_json::Value::String(cell.clone()))
                .collect()
        })
        .collect();
    ValueRange {
        values: Some(values),
        ..Default::default()
    }
}

#[async_trait]
impl SheetsApi for ProductionSheetsClient {
    async fn ensure_sheet_exists(&self, sheet_name: &str) -> Result<()> {
        let spreadsheet = with_backoff(
            "spreadsheets_get",
            self.max_retries,
            self.base_delay,
            || async {
                let (_, spreadsheet) = self
                    .hub
                    .spreadsheets()
                    .get(&self.spreadsheet_id)
                    .doit()
                    .await?;
                Ok(spreadsheet)
            },
        )
        .await?;

        let exists = spreadsheet
            .sheets
            .unwrap_or_default()
            .iter()
            .filter_map(|s| s.properties.as_ref())
            .filter_map(|p| p.title.as_deref())
            .any(|title| title == sheet_name);

        if exists {
            debug!(sheet = sheet_name, "sheet tab already present");
            return Ok(());
        }

        info!(sheet = sheet_name, "creating missing sheet tab");
        let request = BatchUpdateSpreadsheetRequest {
            requests: Some(vec![Request {
                add_sheet: Some(AddSheetRequest {
                    properties: Some(SheetProperties {
                        title: Some(sheet_name.to_string()),
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };

        with_backoff(
            "spreadsheets_batch_update",
            self.max_retries,
            self.base_delay,
            || async {
                self.hub
                    .spreadsheets()
                    .batch_update(request.clone(), &self.spreadsheet_id)
                    .doit()
                    .await?;
                Ok(())
            },
        )
        .await
    }

    async fn read_header_row(&self, sheet_name: &str) -> Result<Option<Vec<String>>> {
        let range = format!("'{}'!1:1", sheet_name);
        let value_range = with_backoff(
            "values_get",
            self.max_retries,
            self.base_delay,
            || async {
                let (_, value_range) = self
                    .hub
                    .spreadsheets()
                    .values_get(&self.spreadsheet_id, &range)
                    .doit()
                    .await?;
                Ok(value_range)
            },
        )
        .await?;

        let first_row = value_range
            .values
            .and_then(|mut rows| if rows.is_empty() { None } else { Some(rows.remove(0)) })
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect()
            });

        Ok(first_row)
    }

    async fn write_header_row(&self, sheet_name: &str, headers: &[String]) -> Result<()> {
        let range = format!("'{}'!1:1", sheet_name);
        let body = to_value_range(&[headers.to_vec()]);

        with_backoff(
            "values_update",
            self.max_retries,
            self.base_delay,
            || async {
                self.hub
                    .spreadsheets()
                    .values_update(body.clone(), &self.spreadsheet_id, &range)
                    .value_input_option("RAW")
                    .doit()
                    .await?;
                Ok(())
            },
        )
        .await
    }

    async fn append_rows(&self, sheet_name: &str, rows: &[Vec<String>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let range = format!("'{}'!A:D", sheet_name);
        let body = to_value_range(rows);

        with_backoff(
            "values_append",
            self.max_retries,
            self.base_delay,
            || async {
                self.hub
                    .spreadsheets()
                    .values_append(body.clone(), &self.spreadsheet_id, &range)
                    .value_input_option("RAW")
                    .insert_data_option("INSERT_ROWS")
                    .doit()
                    .await?;
                Ok(())
            },
        )
        .await
    }
}

#[async_trait]
impl<T: SheetsApi> SheetsApi for std::sync::Arc<T> {
    async fn ensure_sheet_exists(&self, sheet_name: &str) -> Result<()> {
        (**self).ensure_sheet_exists(sheet_name).await
    }

    async fn read_header_row(&self, sheet_name: &str) -> Result<Option<Vec<String>>> {
        (**self).read_header_row(sheet_name).await
    }

    async fn write_header_row(&self, sheet_name: &str, headers: &[String]) -> Result<()> {
        (**self).write_header_row(sheet_name, headers).await
    }

    async fn append_rows(&self, sheet_name: &str, rows: &[Vec<String>]) -> Result<()> {
        (**self).append_rows(sheet_name, rows).await
    }
}

/// Appends message rows with graduated fallback.
///
/// A whole batch is tried first; on failure it is split into sub-batches,
/// and a failing sub-batch is retried row by row so one poisoned row costs
/// only itself.
pub struct SheetWriter {
    api: Box<dyn SheetsApi>,
    sheet_name: String,
    sub_batch_size: usize,
}

impl SheetWriter {
    pub fn new(api: Box<dyn SheetsApi>, sheet_name: String, sub_batch_size: usize) -> Self {
        Self {
            api,
            sheet_name,
            sub_batch_size: sub_batch_size.max(1),
        }
    }

    /// Make sure the tab exists and row 1 carries the expected headers.
    /// A first row that already matches is left untouched, so repeated
    /// calls never duplicate or churn the header.
    pub async fn prepare(&self) -> Result<()> {
        self.api.ensure_sheet_exists(&self.sheet_name).await?;

        let headers: Vec<String> = EXPECTED_HEADERS.iter().map(|h| h.to_string()).collect();
        match self.api.read_header_row(&self.sheet_name).await? {
            Some(row) if row == headers => {
                debug!(sheet = %self.sheet_name, "header row already present");
            }
            Some(row) => {
                warn!(
                    sheet = %self.sheet_name,
                    found = ?row,
                    "header row does not match expected columns, rewriting"
                );
                self.api.write_header_row(&self.sheet_name, &headers).await?;
            }
            None => {
                info!(sheet = %self.sheet_name, "writing header row");
                self.api.write_header_row(&self.sheet_name, &headers).await?;
            }
        }
        Ok(())
    }

    /// Append all records, reporting per-row outcomes.
    ///
    /// Fatal errors (auth, permissions) propagate immediately since no
    /// fallback level can succeed where the credentials fail.
    pub async fn append_with_fallback(&self, records: &[MessageRecord]) -> Result<AppendResult> {
        let mut result = AppendResult::default();
        if records.is_empty() {
            return Ok(result);
        }

        let rows: Vec<Vec<String>> = records.iter().map(|r| r.to_row()).collect();

        match self.api.append_rows(&self.sheet_name, &rows).await {
            Ok(()) => {
                for record in records {
                    result.outcomes.push(RowOutcome {
                        message_id: record.message_id.clone(),
                        error: None,
                    });
                }
                return Ok(result);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(
                    rows = records.len(),
                    error = %e,
                    "full batch append failed, splitting into sub-batches"
                );
            }
        }

        for chunk in records.chunks(self.sub_batch_size) {
            let chunk_rows: Vec<Vec<String>> = chunk.iter().map(|r| r.to_row()).collect();

            match self.api.append_rows(&self.sheet_name, &chunk_rows).await {
                Ok(()) => {
                    for record in chunk {
                        result.outcomes.push(RowOutcome {
                            message_id: record.message_id.clone(),
                            error: None,
                        });
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        rows = chunk.len(),
                        error = %e,
                        "sub-batch append failed, retrying row by row"
                    );
                    for record in chunk {
                        let row = vec![record.to_row()];
                        match self.api.append_rows(&self.sheet_name, &row).await {
                            Ok(()) => result.outcomes.push(RowOutcome {
                                message_id: record.message_id.clone(),
                                error: None,
                            }),
                            Err(e) if e.is_fatal() => return Err(e),
                            Err(e) => {
                                warn!(
                                    message_id = %record.message_id,
                                    error = %e,
                                    "row append failed, skipping row"
                                );
                                result.outcomes.push(RowOutcome {
                                    message_id: record.message_id.clone(),
                                    error: Some(e.to_string()),
                                });
                            }
                        }
                    }
                }
            }
        }

        Ok(result)
    }
}
