use std::sync::Arc;

use guide_core::model::PersistenceMode;
use guide_core::time::Clock;
use storage::LocalProgressRepository;
use storage::repository::{ProgressRepository, RecordStore};

use crate::api_client::ApiClient;
use crate::auth_service::AuthSession;
use crate::remote_progress::RemoteProgressRepository;

/// Persistence strategy for signed-in users, fixed when the store is built.
#[derive(Clone)]
pub enum PersistenceBackend {
    /// REST API; the session token becomes the bearer credential.
    Remote(ApiClient),
    /// One JSON record per user in a record store.
    Local(Arc<dyn RecordStore>),
}

impl PersistenceBackend {
    #[must_use]
    pub fn mode(&self) -> PersistenceMode {
        match self {
            PersistenceBackend::Remote(_) => PersistenceMode::Remote,
            PersistenceBackend::Local(_) => PersistenceMode::Local,
        }
    }

    /// Adapter acting on behalf of the session's user.
    pub(crate) fn bind(&self, session: &AuthSession, clock: Clock) -> Arc<dyn ProgressRepository> {
        match self {
            PersistenceBackend::Remote(client) => Arc::new(RemoteProgressRepository::new(
                client.with_token(session.token.as_str()),
            )),
            PersistenceBackend::Local(store) => Arc::new(LocalProgressRepository::new(
                Arc::clone(store),
                &session.identity.id,
                clock,
            )),
        }
    }
}
