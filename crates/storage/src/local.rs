//! Progress persisted as one JSON record per user in a [`RecordStore`].

use std::sync::Arc;

use async_trait::async_trait;
use guide_core::model::{AssessmentId, ModuleId, ProgressState, SectionId, UserId};
use guide_core::time::Clock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::keys;
use crate::repository::{AdapterError, ProgressRepository, RecordStore, StorageError};

/// Local persistence adapter bound to a single user.
#[derive(Clone)]
pub struct LocalProgressRepository {
    store: Arc<dyn RecordStore>,
    key: String,
    clock: Clock,
}

impl LocalProgressRepository {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, user_id: &UserId, clock: Clock) -> Self {
        Self {
            store,
            key: keys::progress_key(user_id),
            clock,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn read(&self) -> Result<Option<ProgressState>, AdapterError> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(None);
        };
        serde_json::from_str::<Value>(&raw)
            .and_then(ProgressState::from_snapshot)
            .map(Some)
            .map_err(|err| AdapterError::Corrupt(err.to_string()))
    }

    /// Current record for a read-modify-write. A corrupt record is replaced.
    async fn read_for_update(&self) -> Result<ProgressState, AdapterError> {
        match self.read().await {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Ok(ProgressState::with_known_modules()),
            Err(AdapterError::Corrupt(reason)) => {
                warn!(key = %self.key, %reason, "discarding corrupt progress record");
                Ok(ProgressState::with_known_modules())
            }
            Err(err) => Err(err),
        }
    }

    async fn write(&self, state: &ProgressState) -> Result<(), AdapterError> {
        let raw = serde_json::to_string(state)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.store.put(&self.key, &raw).await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for LocalProgressRepository {
    async fn fetch_snapshot(&self) -> Result<ProgressState, AdapterError> {
        let state = self.read().await?;
        if state.is_none() {
            debug!(key = %self.key, "no progress record yet, using default snapshot");
        }
        Ok(state.unwrap_or_else(ProgressState::with_known_modules))
    }

    async fn write_section_toggle(
        &self,
        section_id: &SectionId,
        module_id: &ModuleId,
        completed: bool,
    ) -> Result<(), AdapterError> {
        let mut state = self.read_for_update().await?;
        state.apply_section_toggle(section_id, module_id, completed, self.clock.now());
        self.write(&state).await
    }

    async fn write_assessment(
        &self,
        assessment_id: &AssessmentId,
        answers: &Value,
        score: f64,
    ) -> Result<(), AdapterError> {
        let mut state = self.read_for_update().await?;
        state.upsert_assessment(assessment_id, answers.clone(), score, self.clock.now());
        self.write(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRecordStore;
    use guide_core::time::{fixed_clock, fixed_now};
    use serde_json::json;

    fn repo_for(store: &InMemoryRecordStore, user: &str) -> LocalProgressRepository {
        LocalProgressRepository::new(
            Arc::new(store.clone()),
            &UserId::new(user).unwrap(),
            fixed_clock(),
        )
    }

    #[tokio::test]
    async fn missing_record_yields_default_snapshot() {
        let store = InMemoryRecordStore::new();
        let snapshot = repo_for(&store, "u1").fetch_snapshot().await.unwrap();
        assert_eq!(snapshot, ProgressState::with_known_modules());
    }

    #[tokio::test]
    async fn toggle_round_trips_through_the_record() {
        let store = InMemoryRecordStore::new();
        let repo = repo_for(&store, "u1");
        let module = ModuleId::new("discovery").unwrap();
        let section = SectionId::new("discovery-interviews").unwrap();

        repo.write_section_toggle(&section, &module, true).await.unwrap();

        let snapshot = repo.fetch_snapshot().await.unwrap();
        assert!(snapshot.is_module_completed(&module));
        assert!(snapshot.is_section_completed(&section));
        assert_eq!(
            snapshot.module_progress[&module].completed_at,
            Some(fixed_now())
        );
        assert!((snapshot.total_progress - 100.0 / 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn records_are_namespaced_per_user() {
        let store = InMemoryRecordStore::new();
        let alice = repo_for(&store, "alice");
        let bob = repo_for(&store, "bob");
        let module = ModuleId::new("metrics").unwrap();

        alice
            .write_section_toggle(&SectionId::new("m1").unwrap(), &module, true)
            .await
            .unwrap();

        assert!(alice.fetch_snapshot().await.unwrap().is_module_completed(&module));
        assert!(!bob.fetch_snapshot().await.unwrap().is_module_completed(&module));
    }

    #[tokio::test]
    async fn assessment_writes_upsert() {
        let store = InMemoryRecordStore::new();
        let repo = repo_for(&store, "u1");
        let id = AssessmentId::new("rice-quiz").unwrap();

        repo.write_assessment(&id, &json!({"q": 1}), 40.0).await.unwrap();
        repo.write_assessment(&id, &json!({"q": 2}), 80.0).await.unwrap();

        let snapshot = repo.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.assessment_scores.len(), 1);
        assert_eq!(snapshot.assessment_score(&id), Some(80.0));
    }

    #[tokio::test]
    async fn corrupt_record_fails_fetch_but_is_replaced_on_write() {
        let store = InMemoryRecordStore::new();
        let repo = repo_for(&store, "u1");
        store.put(repo.key(), "{not json").await.unwrap();

        let err = repo.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, AdapterError::Corrupt(_)));

        let module = ModuleId::new("tools").unwrap();
        repo.write_section_toggle(&SectionId::new("t").unwrap(), &module, true)
            .await
            .unwrap();
        let snapshot = repo.fetch_snapshot().await.unwrap();
        assert!(snapshot.is_module_completed(&module));
        assert_eq!(snapshot.module_progress.len(), 6);
    }

    #[tokio::test]
    async fn non_object_record_is_corrupt() {
        let store = InMemoryRecordStore::new();
        let repo = repo_for(&store, "u1");
        store.put(repo.key(), "[]").await.unwrap();

        let err = repo.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, AdapterError::Corrupt(_)));
    }
}
