use thiserror::Error;

/// Type alias for Result with SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error types for the Gmail-to-Sheets pipeline
#[derive(Error, Debug)]
pub enum SyncError {
    /// A Google API returned an error
    #[error("API error: {0}")]
    ApiError(String),

    /// Authentication failed - never retried
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded - should retry after specified seconds
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Invalid message format or parsing error - skips the message, never fatal
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Sheet-related errors
    #[error("Sheet error: {0}")]
    SheetError(String),

    /// State file exists but cannot be parsed - fatal, aborts before any API call
    #[error("State file corrupt: {0}")]
    StateCorrupt(String),

    /// State management errors other than corruption
    #[error("State error: {0}")]
    StateError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic catch-all error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SyncError {
    /// Check if the error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::RateLimitExceeded { .. }
                | SyncError::ServerError { .. }
                | SyncError::NetworkError(_)
        )
    }

    /// Check if the error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Check if the error must abort the whole run (auth/permission).
    ///
    /// Everything else is contained at the granularity it occurred at:
    /// per-message, per-row, or per-batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::AuthError(_) | SyncError::Forbidden(_))
    }
}

/// Parse the Retry-After header from an HTTP response
///
/// The Retry-After header can be specified in two formats:
/// 1. Delay-seconds: An integer indicating seconds to wait (e.g., "120")
/// 2. HTTP-date: An HTTP date format (e.g., "Wed, 21 Oct 2015 07:28:00 GMT")
///
/// Returns the number of seconds to wait. If the header is missing or invalid,
/// returns a default of 5 seconds.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    if let Some(retry_after_value) = response.headers().get("retry-after") {
        if let Ok(retry_after_str) = retry_after_value.to_str() {
            // Try to parse as integer (delay-seconds format)
            if let Ok(seconds) = retry_after_str.parse::<u64>() {
                return seconds;
            }

            // Try to parse as HTTP date format
            if let Ok(http_date) = httpdate::parse_http_date(retry_after_str) {
                let now = std::time::SystemTime::now();
                if let Ok(duration) = http_date.duration_since(now) {
                    return duration.as_secs();
                }
            }
        }
    }

    DEFAULT_RETRY_AFTER
}

/// Map an HTTP failure response (shared shape between the google-* crates)
fn from_status<B>(response: &hyper::Response<B>) -> SyncError {
    let status = response.status();
    let status_code = status.as_u16();
    let message = format!(
        "HTTP {}: {}",
        status_code,
        status.canonical_reason().unwrap_or("Unknown")
    );

    match status_code {
        // Rate limiting - transient
        429 => {
            let retry_after = parse_retry_after_header(response);
            SyncError::RateLimitExceeded { retry_after }
        }
        // Auth failure - surfaced immediately so an operator can re-authenticate
        401 => SyncError::AuthError(message),
        404 => SyncError::NotFound("Resource not found".to_string()),
        400 => SyncError::BadRequest(message),
        403 => SyncError::Forbidden(message),
        // Server errors - transient
        500..=599 => SyncError::ServerError {
            status: status_code,
            message,
        },
        _ => SyncError::ApiError(message),
    }
}

impl From<google_gmail1::Error> for SyncError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => from_status(response),
            google_gmail1::Error::BadRequest(ref err) => SyncError::BadRequest(format!("{}", err)),
            // Network/connection errors - transient
            google_gmail1::Error::HttpError(ref err) => {
                SyncError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => SyncError::NetworkError(err.to_string()),
            google_gmail1::Error::MissingToken(err) => {
                SyncError::AuthError(format!("Missing token: {}", err))
            }
            _ => SyncError::ApiError(error.to_string()),
        }
    }
}
