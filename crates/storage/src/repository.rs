use async_trait::async_trait;
use guide_core::model::{AssessmentId, ModuleId, ProgressState, SectionId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::sqlite::{SqliteInitError, SqliteRepository};

/// Errors surfaced by record stores.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by progress persistence adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("request failed with status {status}{}", detail_suffix(.detail))]
    Status { status: u16, detail: Option<String> },

    #[error("stored progress is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[allow(clippy::ref_option)]
fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

//
// ─── RECORD STORE ──────────────────────────────────────────────────────────────
//

/// String key/value records, the primitive both local persistence and the
/// auth gate build on.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record by key.
    ///
    /// Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace a record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a record. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

//
// ─── PROGRESS REPOSITORY ───────────────────────────────────────────────────────
//

/// Persistence capability behind the progress store, bound to one user.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Load the full progress snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` on transport, status, or decoding failures.
    async fn fetch_snapshot(&self) -> Result<ProgressState, AdapterError>;

    /// Record a section completion toggle.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the write is not acknowledged.
    async fn write_section_toggle(
        &self,
        section_id: &SectionId,
        module_id: &ModuleId,
        completed: bool,
    ) -> Result<(), AdapterError>;

    /// Record an assessment submission.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the write is not acknowledged.
    async fn write_assessment(
        &self,
        assessment_id: &AssessmentId,
        answers: &Value,
        score: f64,
    ) -> Result<(), AdapterError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Record store kept in process memory. Backs session-scoped flags and tests.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Durable and session-scoped record stores behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    /// Survives restarts; holds auth and per-user progress records.
    pub durable: Arc<dyn RecordStore>,
    /// Dropped with the process; holds the browse-mode flag.
    pub session: Arc<dyn RecordStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            durable: Arc::new(InMemoryRecordStore::new()),
            session: Arc::new(InMemoryRecordStore::new()),
        }
    }

    /// Build a `Storage` whose durable records live in `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(Self {
            durable: Arc::new(repo),
            session: Arc::new(InMemoryRecordStore::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_round_trips_and_removes() {
        let store = InMemoryRecordStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.put("k", "v1").await.unwrap();
        store.put("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_records() {
        let store = InMemoryRecordStore::new();
        let clone = store.clone();
        store.put("shared", "yes").await.unwrap();
        assert_eq!(clone.get("shared").await.unwrap().as_deref(), Some("yes"));
    }

    #[test]
    fn status_error_includes_detail() {
        let err = AdapterError::Status {
            status: 401,
            detail: Some("Invalid token".into()),
        };
        assert_eq!(err.to_string(), "request failed with status 401: Invalid token");
        let bare = AdapterError::Status {
            status: 500,
            detail: None,
        };
        assert_eq!(bare.to_string(), "request failed with status 500");
    }
}
