use std::sync::Arc;

use guide_core::model::{GuideSettings, PersistenceMode, RegistrationDraft};
use storage::repository::Storage;
use tracing::info;

use crate::api_client::ApiClient;
use crate::auth_service::{AuthService, AuthSession};
use crate::error::AppServicesError;
use crate::progress::{PersistenceBackend, ProgressStore};
use crate::Clock;

/// Wires the auth gate and the progress store from one set of settings.
///
/// Sign-in and sign-out go through here so the store always follows the
/// auth gate.
#[derive(Clone)]
pub struct AppServices {
    settings: GuideSettings,
    auth: Arc<AuthService>,
    progress: Arc<ProgressStore>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the HTTP
    /// client cannot be built.
    pub async fn new_sqlite(settings: GuideSettings, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(settings.database_url()).await?;
        Self::build(settings, &storage, clock)
    }

    /// Build services over an existing storage.
    ///
    /// Remote mode uses the API for both auth and progress; local mode uses
    /// demo auth and keeps progress in the durable record store.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Api` if the HTTP client cannot be built.
    pub fn build(
        settings: GuideSettings,
        storage: &Storage,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let (auth, backend) = match settings.mode() {
            PersistenceMode::Remote => {
                let client = ApiClient::new(settings.api_base_url().clone(), settings.http_timeout())?;
                (
                    AuthService::remote(
                        client.clone(),
                        Arc::clone(&storage.durable),
                        Arc::clone(&storage.session),
                    ),
                    PersistenceBackend::Remote(client),
                )
            }
            PersistenceMode::Local => (
                AuthService::demo(Arc::clone(&storage.durable), Arc::clone(&storage.session)),
                PersistenceBackend::Local(Arc::clone(&storage.durable)),
            ),
        };

        Ok(Self {
            settings,
            auth: Arc::new(auth),
            progress: Arc::new(ProgressStore::new(backend, clock)),
        })
    }

    /// Resolve the saved session and hand it to the progress store.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Auth` if the saved session cannot be read.
    pub async fn start(&self) -> Result<Option<AuthSession>, AppServicesError> {
        let session = self.auth.restore().await?;
        self.progress.set_session(session.as_ref()).await;
        info!(
            mode = %self.settings.mode(),
            signed_in = session.is_some(),
            "services started"
        );
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `AppServicesError::Auth` if sign-in fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AppServicesError> {
        let session = self.auth.login(email, password).await?;
        self.progress.set_session(Some(&session)).await;
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `AppServicesError::Auth` if registration fails.
    pub async fn register(
        &self,
        draft: RegistrationDraft,
    ) -> Result<AuthSession, AppServicesError> {
        let session = self.auth.register(draft).await?;
        self.progress.set_session(Some(&session)).await;
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `AppServicesError::Auth` if the saved session cannot be removed.
    pub async fn logout(&self) -> Result<(), AppServicesError> {
        self.auth.logout().await?;
        self.progress.set_session(None).await;
        Ok(())
    }

    #[must_use]
    pub fn settings(&self) -> &GuideSettings {
        &self.settings
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressStore> {
        Arc::clone(&self.progress)
    }
}
