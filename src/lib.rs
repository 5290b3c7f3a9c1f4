//! Gmail to Sheets exporter
//!
//! A batch pipeline that reads unread Gmail messages, extracts sender,
//! subject, date, and body text, appends them as rows to a Google Sheet,
//! and marks the exported messages as read.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 with token caching, one consent for both APIs
//! - **Fetching**: Paginated unread-message listing and full-message fetch
//! - **Parsing**: MIME walk with HTML-to-text conversion and field truncation
//! - **Appending**: Batched sheet appends with graduated fallback to
//!   sub-batches and single rows
//! - **Idempotence**: A processed-message ledger on disk prevents duplicate
//!   rows across runs even when mark-read fails
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_to_sheets::{auth, client::ProductionMailClient, config::Config};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let (gmail, _sheets) = auth::initialize_hubs(
//!         "credentials.json".as_ref(),
//!         ".gmail-to-sheets/token.json".as_ref(),
//!     ).await?;
//!
//!     let client = ProductionMailClient::new(
//!         gmail,
//!         config.retry.max_retries,
//!         Duration::from_secs(config.retry.base_delay_secs),
//!         config.filter.last_day_only,
//!     );
//!
//!     // Use client to list and fetch messages
//!     // ...
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 authentication and API hub initialization
//! - [`cli`] - Command-line interface and command handlers
//! - [`client`] - Gmail API client with retry logic
//! - [`config`] - Configuration management with env overrides
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures
//! - [`parser`] - Message field extraction and filtering
//! - [`pipeline`] - The run orchestrator
//! - [`retry`] - Exponential backoff helper
//! - [`sheets`] - Sheet tab management and batched appends
//! - [`state`] - Processed-message ledger persistence
//! - [`truncate`] - Field truncation for spreadsheet cells

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod retry;
pub mod sheets;
pub mod state;
pub mod truncate;

// Re-export commonly used types for convenience
pub use error::{Result, SyncError};

// Core data models
pub use models::{AppendResult, FilterReason, MessageRecord, RowOutcome, RunSummary};

// Config types
pub use config::{Config, ExportConfig, FilterConfig, RetryConfig, SheetConfig};

// Client traits
pub use client::{MailClient, ProductionMailClient};

// Sheet output
pub use sheets::{ProductionSheetsClient, SheetWriter, SheetsApi};

// Parsing and filtering
pub use parser::{parse_message, MessageFilter};

// Pipeline
pub use pipeline::{Pipeline, RunPhase};

// State management
pub use state::ProcessedState;

// CLI types (for binary usage)
pub use cli::{Cli, Commands};
