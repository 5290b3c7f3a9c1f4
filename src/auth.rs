//! OAuth2 authentication and hub construction for the Google APIs

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use google_sheets4::Sheets;
use std::env;
use std::path::Path;
use yup_oauth2::ApplicationSecret;

use crate::error::{Result, SyncError};

/// Scopes required for the full pipeline
///
/// - gmail.modify: read messages and clear the UNREAD label (no deletion)
/// - spreadsheets: append rows and manage sheet tabs
pub const REQUIRED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/spreadsheets",
];

type Connector = hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Type alias for the Gmail hub to simplify type signatures
pub type GmailHub = Gmail<Connector>;

/// Type alias for the Sheets hub
pub type SheetsHub = Sheets<Connector>;

/// Initialize authenticated Gmail and Sheets hubs with OAuth2
///
/// Sets up:
/// - OAuth2 authentication using InstalledFlow (desktop app flow)
/// - Token persistence to disk for automatic refresh
/// - HTTP/1 client with TLS support
///
/// Both hubs share one authenticator so the user consents once for both
/// scopes. When the credentials file is missing, `GOOGLE_CLIENT_ID` /
/// `GOOGLE_CLIENT_SECRET` are tried instead.
///
/// # Arguments
/// * `credentials_path` - Path to the OAuth2 credentials JSON file
/// * `token_cache_path` - Path where access tokens will be cached
pub async fn initialize_hubs(
    credentials_path: &Path,
    token_cache_path: &Path,
) -> Result<(GmailHub, SheetsHub)> {
    // Read OAuth2 credentials, falling back to environment variables
    let secret = match yup_oauth2::read_application_secret(credentials_path).await {
        Ok(secret) => secret,
        Err(e) => load_credentials_from_env().map_err(|_| {
            SyncError::AuthError(format!(
                "Failed to read credentials from {:?} ({}) and GOOGLE_CLIENT_ID is not set",
                credentials_path, e
            ))
        })?,
    };

    // Build authenticator with token persistence
    // HTTPRedirect opens a browser for user authorization
    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| SyncError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Pre-authenticate with all scopes so the cached token covers both APIs
    let _token = auth
        .token(REQUIRED_SCOPES)
        .await
        .map_err(|e| SyncError::AuthError(format!("Failed to obtain token: {}", e)))?;

    // HTTP/1 for compatibility with the generated google-* API crates
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| SyncError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    let gmail = Gmail::new(client.clone(), auth.clone());
    let sheets = Sheets::new(client, auth);
    Ok((gmail, sheets))
}

/// Run the OAuth2 flow only, caching the token for later runs.
pub async fn authenticate(credentials_path: &Path, token_cache_path: &Path) -> Result<()> {
    let _ = initialize_hubs(credentials_path, token_cache_path).await?;
    secure_token_file(token_cache_path).await?;
    Ok(())
}

/// Load OAuth2 credentials from environment variables
///
/// Recommended for production deployments to avoid storing credentials
/// in files.
///
/// # Environment Variables
/// - `GOOGLE_CLIENT_ID`: OAuth2 client ID
/// - `GOOGLE_CLIENT_SECRET`: OAuth2 client secret
/// - `GOOGLE_REDIRECT_URI`: Redirect URI (optional, defaults to http://localhost:8080)
pub fn load_credentials_from_env() -> Result<ApplicationSecret> {
    let client_id = env::var("GOOGLE_CLIENT_ID")
        .map_err(|_| SyncError::ConfigError("GOOGLE_CLIENT_ID not set".to_string()))?;
    let client_secret = env::var("GOOGLE_CLIENT_SECRET")
        .map_err(|_| SyncError::ConfigError("GOOGLE_CLIENT_SECRET not set".to_string()))?;
    let redirect_uri =
        env::var("GOOGLE_REDIRECT_URI").unwrap_or_else(|_| "http://localhost:8080".to_string());

    Ok(ApplicationSecret {
        client_id,
        client_secret,
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        redirect_uris: vec![redirect_uri],
        ..Default::default()
    })
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600); // Read/write for owner only
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Secure token file on Windows (stub implementation)
///
/// Windows uses ACLs instead of Unix permissions
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
