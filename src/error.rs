//! Error types for torrent-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Session, Auth, Database, Config)
//! - HTTP status code mapping for the API surface
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for torrent-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for torrent-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_active_torrents")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Session registry or lifecycle error
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Token issuance or verification error
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Download engine rejected an operation
    #[error("engine error: {0}")]
    Engine(String),

    /// Magnet link could not be parsed
    #[error("invalid magnet link: {0}")]
    InvalidMagnet(String),

    /// Content hash could not be parsed
    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new torrents
    #[error("shutdown in progress: not accepting new torrents")]
    ShuttingDown,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Stored record could not be decoded
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

/// Session-related errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session is registered under the hash
    #[error("torrent {hash} not found")]
    NotFound {
        /// The content hash that was not found
        hash: String,
    },

    /// Data removal was refused because the path escapes the download directory
    #[error("refusing to delete {path}: {reason}")]
    UnsafePath {
        /// The path that was rejected
        path: PathBuf,
        /// Why the path was rejected
        reason: String,
    },
}

/// Token-related errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token is not three base64url segments with JSON header and claims
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Token header names an algorithm other than HS256
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// HMAC signature does not match the current signing key
    #[error("token signature mismatch")]
    SignatureMismatch,

    /// Claims are missing or carry the wrong issuer
    #[error("invalid token claims: {0}")]
    InvalidClaims(String),

    /// No signing key has been initialised
    #[error("no signing key available")]
    MissingSigningKey,
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "torrent_not_found",
///     "message": "session error: torrent 0123... not found",
///     "details": {
///       "hash": "0123..."
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidMagnet(_) => 422,
            Error::InvalidHash(_) => 422,

            // 401 Unauthorized
            Error::Auth(AuthError::MissingSigningKey) => 500,
            Error::Auth(_) => 401,

            // 404 Not Found
            Error::Session(SessionError::NotFound { .. }) => 404,

            // 422 Unprocessable Entity - Semantic errors
            Error::Session(SessionError::UnsafePath { .. }) => 422,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,

            // 502 Bad Gateway - Engine rejected the request
            Error::Engine(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Session(e) => match e {
                SessionError::NotFound { .. } => "torrent_not_found",
                SessionError::UnsafePath { .. } => "unsafe_path",
            },
            Error::Auth(e) => match e {
                AuthError::MalformedToken(_) => "malformed_token",
                AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
                AuthError::SignatureMismatch => "signature_mismatch",
                AuthError::InvalidClaims(_) => "invalid_claims",
                AuthError::MissingSigningKey => "missing_signing_key",
            },
            Error::Engine(_) => "engine_error",
            Error::InvalidMagnet(_) => "invalid_magnet",
            Error::InvalidHash(_) => "invalid_hash",
            Error::Io(_) => "io_error",
            Error::ShuttingDown => "shutting_down",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Session(SessionError::NotFound { hash }) => Some(serde_json::json!({
                "hash": hash,
            })),
            Error::Session(SessionError::UnsafePath { path, .. }) => Some(serde_json::json!({
                "path": path,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
