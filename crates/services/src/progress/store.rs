use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use guide_core::model::{AssessmentId, ModuleId, ProgressState, SectionId, UserIdentity};
use guide_core::time::Clock;
use serde_json::Value;
use storage::repository::ProgressRepository;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::backend::PersistenceBackend;
use crate::auth_service::AuthSession;
use crate::error::ProgressError;

//
// ─── ORIGIN ────────────────────────────────────────────────────────────────────
//

/// Where the current in-memory progress came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOrigin {
    /// Memory only: anonymous browsing, or nothing loaded yet.
    Ephemeral,
    /// Loaded from the persistence adapter.
    Snapshot,
    /// The adapter could not be read; the all-incomplete default is shown.
    Fallback,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

enum AuthPhase {
    Resolving,
    Anonymous,
    SignedIn {
        user: UserIdentity,
        adapter: Arc<dyn ProgressRepository>,
    },
}

struct StoreState {
    phase: AuthPhase,
    progress: ProgressState,
    origin: ProgressOrigin,
    // Bumped on every auth transition; reloads started under an older value are dropped.
    generation: u64,
    loading: bool,
}

impl StoreState {
    fn reset(&mut self, phase: AuthPhase) -> u64 {
        self.phase = phase;
        self.progress = ProgressState::empty();
        self.origin = ProgressOrigin::Ephemeral;
        self.loading = false;
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}

enum Binding {
    Anonymous,
    SignedIn {
        adapter: Arc<dyn ProgressRepository>,
        generation: u64,
    },
}

//
// ─── STORE ─────────────────────────────────────────────────────────────────────
//

/// Authoritative progress for the current user.
///
/// Anonymous users mutate memory only. Signed-in users go through the bound
/// adapter: every mutation writes first and then reloads the full snapshot,
/// so memory never holds a change the adapter has not accepted. Mutations and
/// reloads are serialized per store.
pub struct ProgressStore {
    backend: PersistenceBackend,
    clock: Clock,
    state: RwLock<StoreState>,
    mutations: Mutex<()>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(backend: PersistenceBackend, clock: Clock) -> Self {
        Self {
            backend,
            clock,
            state: RwLock::new(StoreState {
                phase: AuthPhase::Resolving,
                progress: ProgressState::empty(),
                origin: ProgressOrigin::Ephemeral,
                generation: 0,
                loading: false,
            }),
            mutations: Mutex::new(()),
        }
    }

    /// Follow the auth gate.
    ///
    /// `None` resets to the zero-value record and drops any adapter binding.
    /// `Some` binds an adapter for that user, starts from the zero-value
    /// record, and loads the user's snapshot.
    pub async fn set_session(&self, session: Option<&AuthSession>) {
        let Some(session) = session else {
            self.write_state().reset(AuthPhase::Anonymous);
            debug!("progress reset for anonymous browsing");
            return;
        };

        let adapter = self.backend.bind(session, self.clock);
        let generation = self.write_state().reset(AuthPhase::SignedIn {
            user: session.identity.clone(),
            adapter: Arc::clone(&adapter),
        });
        info!(user = %session.identity.id, mode = %self.backend.mode(), "progress bound to user");

        let _guard = self.mutations.lock().await;
        self.reload(adapter.as_ref(), generation).await;
    }

    /// Replace progress with the adapter's current snapshot.
    ///
    /// Adapter failures are not returned: the store falls back to the default
    /// snapshot and reports `ProgressOrigin::Fallback`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::AuthUnresolved` before the first session
    /// update and `ProgressError::NotSignedIn` for anonymous users.
    pub async fn load_progress(&self) -> Result<(), ProgressError> {
        let _guard = self.mutations.lock().await;
        match self.binding()? {
            Binding::Anonymous => Err(ProgressError::NotSignedIn),
            Binding::SignedIn {
                adapter,
                generation,
            } => {
                self.reload(adapter.as_ref(), generation).await;
                Ok(())
            }
        }
    }

    /// Mark a section (and its module) complete or incomplete.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::AuthUnresolved` before the first session
    /// update, and `ProgressError::PersistenceFailed` if the adapter rejects
    /// the write; progress is unchanged in both cases.
    pub async fn toggle_section(
        &self,
        section_id: &SectionId,
        module_id: &ModuleId,
        completed: bool,
    ) -> Result<(), ProgressError> {
        let _guard = self.mutations.lock().await;
        match self.binding()? {
            Binding::Anonymous => {
                let now = self.clock.now();
                self.write_state()
                    .progress
                    .apply_section_toggle(section_id, module_id, completed, now);
                Ok(())
            }
            Binding::SignedIn {
                adapter,
                generation,
            } => {
                adapter
                    .write_section_toggle(section_id, module_id, completed)
                    .await
                    .map_err(|err| {
                        warn!(%section_id, %module_id, error = %err, "failed to persist section toggle");
                        ProgressError::PersistenceFailed(err)
                    })?;
                self.reload(adapter.as_ref(), generation).await;
                Ok(())
            }
        }
    }

    /// Record the latest result for an assessment, replacing any earlier one.
    ///
    /// Scores are not validated here and do not affect `total_progress`.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressStore::toggle_section`].
    pub async fn submit_assessment(
        &self,
        assessment_id: &AssessmentId,
        answers: Value,
        score: f64,
    ) -> Result<(), ProgressError> {
        let _guard = self.mutations.lock().await;
        match self.binding()? {
            Binding::Anonymous => {
                let now = self.clock.now();
                self.write_state()
                    .progress
                    .upsert_assessment(assessment_id, answers, score, now);
                Ok(())
            }
            Binding::SignedIn {
                adapter,
                generation,
            } => {
                adapter
                    .write_assessment(assessment_id, &answers, score)
                    .await
                    .map_err(|err| {
                        warn!(%assessment_id, error = %err, "failed to persist assessment");
                        ProgressError::PersistenceFailed(err)
                    })?;
                self.reload(adapter.as_ref(), generation).await;
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn is_section_completed(&self, section_id: &SectionId) -> bool {
        self.read_state().progress.is_section_completed(section_id)
    }

    #[must_use]
    pub fn is_module_completed(&self, module_id: &ModuleId) -> bool {
        self.read_state().progress.is_module_completed(module_id)
    }

    #[must_use]
    pub fn assessment_score(&self, assessment_id: &AssessmentId) -> Option<f64> {
        self.read_state().progress.assessment_score(assessment_id)
    }

    #[must_use]
    pub fn total_progress(&self) -> f64 {
        self.read_state().progress.total_progress
    }

    /// Copy of the current progress, for rendering.
    #[must_use]
    pub fn snapshot(&self) -> ProgressState {
        self.read_state().progress.clone()
    }

    #[must_use]
    pub fn origin(&self) -> ProgressOrigin {
        self.read_state().origin
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read_state().loading
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self.read_state().phase, AuthPhase::Resolving)
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self.read_state().phase, AuthPhase::SignedIn { .. })
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserIdentity> {
        match &self.read_state().phase {
            AuthPhase::SignedIn { user, .. } => Some(user.clone()),
            _ => None,
        }
    }

    fn binding(&self) -> Result<Binding, ProgressError> {
        let state = self.read_state();
        match &state.phase {
            AuthPhase::Resolving => Err(ProgressError::AuthUnresolved),
            AuthPhase::Anonymous => Ok(Binding::Anonymous),
            AuthPhase::SignedIn { adapter, .. } => Ok(Binding::SignedIn {
                adapter: Arc::clone(adapter),
                generation: state.generation,
            }),
        }
    }

    async fn reload(&self, adapter: &dyn ProgressRepository, generation: u64) {
        {
            let mut state = self.write_state();
            if state.generation == generation {
                state.loading = true;
            }
        }

        let (progress, origin) = match adapter.fetch_snapshot().await {
            Ok(snapshot) => (snapshot.normalized(), ProgressOrigin::Snapshot),
            Err(err) => {
                warn!(error = %err, "failed to load progress, using default snapshot");
                (ProgressState::with_known_modules(), ProgressOrigin::Fallback)
            }
        };

        let mut state = self.write_state();
        if state.generation != generation {
            debug!("discarding progress loaded for a previous session");
            return;
        }
        state.progress = progress;
        state.origin = origin;
        state.loading = false;
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
