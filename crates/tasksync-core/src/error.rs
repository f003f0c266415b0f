//! Core error types for tasksync-core.
//!
//! Storage, configuration, OAuth and validation failures each get their own
//! enum; [`CoreError`] wraps them for callers that don't care which layer
//! failed. Remote and engine errors live next to their modules
//! ([`crate::remote::ProviderError`], [`crate::sync::SyncError`]).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tasksync-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// OAuth-related errors
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Credential lookup errors
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Remote provider errors
    #[error("Remote provider error: {0}")]
    Provider(#[from] crate::remote::ProviderError),

    /// Sync engine errors
    #[error("Sync error: {0}")]
    Sync(#[from] crate::sync::SyncError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Could not determine or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// OAuth-specific errors.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// Authorization failed at the provider (user denied, bad request)
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Token refresh rejected by the identity provider
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Identity provider answered with a server error or rate limit
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Token revocation failed
    #[error("Token revocation failed: {0}")]
    RevokeFailed(String),

    /// Callback timeout
    #[error("OAuth callback timeout: no callback received within {timeout_secs} seconds")]
    CallbackTimeout { timeout_secs: u64 },

    /// Invalid callback
    #[error("Invalid OAuth callback: {0}")]
    InvalidCallback(String),

    /// Credentials not configured
    #[error("OAuth client credentials not configured for {service}")]
    CredentialsNotConfigured { service: String },

    /// Transport failure talking to the identity provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring access failed
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// Local IO failure (callback listener)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OAuthError {
    /// Failures worth retrying later: the identity provider could not be
    /// reached or was temporarily unable to answer.
    pub fn is_transient(&self) -> bool {
        matches!(self, OAuthError::Http(_) | OAuthError::ProviderUnavailable(_))
    }
}

/// Why no valid credential could be produced, when the answer is not
/// simply "log in again".
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Refresh could not complete right now; the credential stays enabled
    #[error("Credential refresh temporarily unavailable: {0}")]
    Transient(#[source] OAuthError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Empty value where text is required
    #[error("'{0}' cannot be empty")]
    Empty(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Referenced row does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<keyring::Error> for OAuthError {
    fn from(err: keyring::Error) -> Self {
        OAuthError::Keyring(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
