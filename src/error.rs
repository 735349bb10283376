//! Error types and result handling for Ensemble operations.
//!
//! This module defines the error handling system used throughout Ensemble.
//! All fallible operations return a [`Result<T>`] which is a type alias for
//! `std::result::Result<T, Error>`.
//!
//! # Error Categories
//!
//! - **Identity Errors**: a download was requested for a value with no derivable key
//! - **Provider Errors**: a single provider search failed (contained by the federator)
//! - **Transfer Errors**: the transfer engine refused to start or reported a failure
//! - **Network / Parse Errors**: raised by the HTTP catalog provider
//! - **IO / JSON Errors**: registry persistence
//!
//! # Containment
//!
//! Only [`Error::MissingIdentity`] ever reaches the caller of
//! [`DownloadCoordinator::request_download`](crate::download::DownloadCoordinator::request_download).
//! Provider and transfer failures are recorded as local state (an empty provider
//! contribution, or a task in the `Error` status) and logged.
//!
//! # Examples
//!
//! ```rust
//! use ensemble::{Error, TrackDescriptor};
//!
//! let err = TrackDescriptor::titled("Untitled").task_key("tidal").unwrap_err();
//! assert!(matches!(err, Error::MissingIdentity(_)));
//! ```

use thiserror::Error;

/// Type alias for Results with Ensemble errors.
///
/// ```rust
/// use ensemble::{Result, Error};
///
/// fn example_with_error() -> Result<()> {
///     Err(Error::parse("Something went wrong"))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Ensemble operations.
///
/// # Variants
///
/// * [`MissingIdentity`](Error::MissingIdentity) - No provider/external id could be derived
/// * [`ProviderUnavailable`](Error::ProviderUnavailable) - One provider search failed
/// * [`TransferStartFailed`](Error::TransferStartFailed) - The engine rejected a start call
/// * [`TransferRuntimeError`](Error::TransferRuntimeError) - The engine reported a failure post-start
/// * [`Network`](Error::Network) - HTTP client and connection errors
/// * [`Parse`](Error::Parse) - Data parsing and format errors
/// * [`NotFound`](Error::NotFound) - Missing resources
/// * [`RateLimit`](Error::RateLimit) - Rate limiting responses
/// * [`Io`](Error::Io) - File system and IO errors
/// * [`Json`](Error::Json) - JSON serialization errors
/// * [`Join`](Error::Join) - Task join errors
/// * [`Other`](Error::Other) - Generic error messages
#[derive(Error, Debug)]
pub enum Error {
    /// Neither a provider nor an external id could be derived from a track.
    ///
    /// Fatal to the one download request that produced it. No task is created.
    #[error("Missing identity: {0}")]
    MissingIdentity(String),

    /// A provider search failed.
    ///
    /// The federator never propagates this; the provider contributes an empty
    /// result for the generation and the failure is logged.
    #[error("Provider unavailable [{provider}]: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// The transfer engine rejected the start call for a task.
    #[error("Transfer start failed [{key}]: {message}")]
    TransferStartFailed { key: String, message: String },

    /// The transfer engine emitted an error event after the transfer started.
    #[error("Transfer failed [{key}]: {message}")]
    TransferRuntimeError { key: String, message: String },

    /// Network-related errors from HTTP operations.
    ///
    /// Wraps errors from the underlying HTTP client (reqwest), including
    /// connection timeouts, DNS resolution failures and TLS errors.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Data parsing and format errors.
    ///
    /// ```rust
    /// use ensemble::Error;
    ///
    /// let error = Error::parse("Missing title field in response");
    /// ```
    #[error("Parse error: {0}")]
    Parse(String),

    /// Resource not found errors.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote catalog throttled the request.
    ///
    /// `retry_after` carries the `Retry-After` header value in seconds when
    /// the remote sent one.
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimit { retry_after: Option<u64> },

    /// File system and IO operation errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization and deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Join errors from tokio tasks.
    #[error("Join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Generic error messages.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Creates a missing identity error describing the offending value.
    pub fn missing_identity(msg: impl Into<String>) -> Self {
        Error::MissingIdentity(msg.into())
    }

    /// Creates a provider error with provider ID and message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ensemble::Error;
    ///
    /// let error = Error::provider("tidal", "HTTP 503");
    /// assert_eq!(error.to_string(), "Provider unavailable [tidal]: HTTP 503");
    /// ```
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::ProviderUnavailable {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Creates a transfer start error for the given task key.
    pub fn start_failed(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::TransferStartFailed {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Creates a transfer runtime error for the given task key.
    pub fn runtime(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::TransferRuntimeError {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Creates a not found error with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a rate limit error with optional retry-after time.
    ///
    /// The retry-after parameter typically comes from the `Retry-After` HTTP header.
    pub fn rate_limit(retry_after: Option<u64>) -> Self {
        Error::RateLimit { retry_after }
    }
}
