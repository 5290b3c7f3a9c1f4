use anyhow::Result;
use clap::Parser;
use gmail_to_sheets::cli::{self, Cli, Commands};
use gmail_to_sheets::error::SyncError;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Exit with proper code on error
    match run().await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            display_error(&e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    // Install default crypto provider for rustls
    // This is necessary because multiple dependencies use different crypto providers
    // On non-Windows platforms, use aws-lc-rs (better performance, FIPS support)
    // On Windows, use ring (better compatibility, no NASM/CMake required)
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing with level based on verbose flag; LOG_LEVEL and
    // RUST_LOG both work, RUST_LOG winning when set
    let default_directives = if cli.verbose {
        "gmail_to_sheets=debug,info".to_string()
    } else {
        std::env::var("LOG_LEVEL")
            .map(|level| format!("gmail_to_sheets={},warn", level.to_lowercase()))
            .unwrap_or_else(|_| "gmail_to_sheets=info,warn".to_string())
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match cli.command {
        Commands::Auth { force } => {
            cli::cmd_auth(&cli, force).await?;
            Ok(0)
        }

        Commands::Run => {
            tracing::info!("Starting export run");
            let summary = cli::cmd_run(&cli).await?;
            cli::print_summary(&summary);

            // Partial success (some rows failed) still exits non-zero so
            // cron and CI notice
            if summary.rows_failed > 0 {
                Ok(1)
            } else {
                Ok(0)
            }
        }

        Commands::Status { detailed } => {
            cli::cmd_status(&cli, detailed).await?;
            Ok(0)
        }

        Commands::InitConfig { output, force } => {
            cli::cmd_init_config(&output, force).await?;
            println!("\nKey settings to review:");
            println!("  - sheet.spreadsheet_id: The target spreadsheet (required)");
            println!("  - sheet.sheet_name: Tab to append rows to");
            println!("  - filter.subject_keyword: Only export matching subjects");
            println!("  - filter.exclude_no_reply: Skip automated senders");
            Ok(0)
        }
    }
}

/// Display error with context and a hint where one helps
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(sync_err) = error.downcast_ref::<SyncError>() {
        match sync_err {
            SyncError::AuthError(_) => {
                eprintln!("\nHint: Make sure your credentials.json file is valid.");
                eprintln!("      You can download it from Google Cloud Console.");
                eprintln!("      Try running: gmail-to-sheets auth --force");
            }
            SyncError::StateCorrupt(_) => {
                eprintln!("\nHint: The state file exists but cannot be parsed.");
                eprintln!("      Restore it from backup, or delete it to start fresh");
                eprintln!("      (already-exported unread messages would then repeat).");
            }
            SyncError::RateLimitExceeded { .. } => {
                eprintln!("\nHint: You've hit a Google API rate limit.");
                eprintln!("      Wait a few seconds and try again.");
            }
            SyncError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
                eprintln!("      Run: gmail-to-sheets init-config --force");
            }
            _ => {}
        }
    }
}
