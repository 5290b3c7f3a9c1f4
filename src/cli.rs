//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth;
use crate::client::ProductionMailClient;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::RunSummary;
use crate::parser::MessageFilter;
use crate::pipeline::Pipeline;
use crate::sheets::{ProductionSheetsClient, SheetWriter};
use crate::state::ProcessedState;

#[derive(Parser, Debug)]
#[command(name = "gmail-to-sheets")]
#[command(version = "0.1.0")]
#[command(about = "Export unread Gmail messages to a Google Sheet", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".gmail-to-sheets/token.json")]
    pub token_cache: PathBuf,

    /// Path to processed-message state file
    #[arg(long, default_value = ".gmail-to-sheets/state.json")]
    pub state_file: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with the Google APIs and cache the token
    Auth {
        /// Force re-authentication even if a token is cached
        #[arg(long)]
        force: bool,
    },

    /// Run one export pass: fetch unread mail, append rows, mark read
    Run,

    /// Show the processed-message state
    Status {
        /// List every processed message id
        #[arg(long)]
        detailed: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn cmd_auth(cli: &Cli, force: bool) -> Result<()> {
    if force && cli.token_cache.exists() {
        tokio::fs::remove_file(&cli.token_cache).await?;
        tracing::info!("Removed cached token at {:?}", cli.token_cache);
    }

    if let Some(parent) = cli.token_cache.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    auth::authenticate(&cli.credentials, &cli.token_cache).await?;
    println!("Authentication successful. Token cached at {:?}", cli.token_cache);
    Ok(())
}

pub async fn cmd_run(cli: &Cli) -> Result<RunSummary> {
    let config = Config::load(&cli.config).await?;
    config.validate()?;

    let (gmail_hub, sheets_hub) = auth::initialize_hubs(&cli.credentials, &cli.token_cache).await?;

    let base_delay = Duration::from_secs(config.retry.base_delay_secs);
    let mail = Arc::new(ProductionMailClient::new(
        gmail_hub,
        config.retry.max_retries,
        base_delay,
        config.filter.last_day_only,
    ));

    let sheets = ProductionSheetsClient::new(
        sheets_hub,
        config.sheet.spreadsheet_id.clone(),
        config.retry.max_retries,
        base_delay,
    );
    let writer = SheetWriter::new(
        Box::new(sheets),
        config.sheet.sheet_name.clone(),
        config.export.sub_batch_size,
    );

    let filter = MessageFilter {
        subject_keyword: config.filter.subject_keyword.clone(),
        exclude_no_reply: config.filter.exclude_no_reply,
    };

    let pipeline = Pipeline::new(
        mail,
        writer,
        filter,
        cli.state_file.clone(),
        config.export.max_field_chars,
    );

    pipeline.run().await
}

pub async fn cmd_status(cli: &Cli, detailed: bool) -> Result<()> {
    let state = ProcessedState::load(&cli.state_file).await?;

    println!("State file:         {:?}", cli.state_file);
    println!("Processed messages: {}", state.len());
    println!("Last updated:       {}", state.last_updated.to_rfc3339());

    if detailed {
        let mut ids: Vec<_> = state.processed_message_ids.iter().collect();
        ids.sort();
        for id in ids {
            println!("  {}", id);
        }
    }
    Ok(())
}

pub async fn cmd_init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(SyncError::ConfigError(format!(
            "{:?} already exists (use --force to overwrite)",
            output
        )));
    }

    Config::create_example(output).await?;
    println!("Example configuration written to {:?}", output);
    Ok(())
}

/// Print the run summary in a stable, line-oriented layout
pub fn print_summary(summary: &RunSummary) {
    println!("Run {} finished", summary.run_id);
    println!("  unread candidates:  {}", summary.candidates);
    println!("  already processed:  {}", summary.skipped_known);
    println!("  fetched:            {}", summary.fetched);
    if summary.fetch_failures > 0 {
        println!("  fetch failures:     {}", summary.fetch_failures);
    }
    if summary.parse_failures > 0 {
        println!("  parse failures:     {}", summary.parse_failures);
    }
    println!("  filtered out:       {}", summary.filtered_out);
    println!("  rows appended:      {}", summary.appended);
    if summary.rows_failed > 0 {
        println!("  rows failed:        {}", summary.rows_failed);
    }
    println!("  marked read:        {}", summary.marked_read);
}
