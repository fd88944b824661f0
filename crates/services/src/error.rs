//! Shared error types for the services crate.

use thiserror::Error;

use guide_core::model::{CredentialsError, IdError, SettingsError};
use storage::repository::{AdapterError, StorageError};
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ApiClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("request failed with status {status}")]
    HttpStatus {
        status: reqwest::StatusCode,
        detail: Option<String>,
    },
    #[error("response body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Http(err) if err.is_timeout())
    }
}

/// Errors emitted by `ProgressStore`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("the auth gate has not resolved a session yet")]
    AuthUnresolved,
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("failed to persist progress: {0}")]
    PersistenceFailed(#[from] AdapterError),
}

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error("{detail}")]
    Rejected { status: u16, detail: String },
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}
