use std::fmt;
use std::sync::Arc;

use guide_core::model::{Credentials, PersistenceMode, RegistrationDraft, UserId, UserIdentity};
use serde::Deserialize;
use storage::keys;
use storage::repository::{RecordStore, StorageError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api_client::ApiClient;
use crate::error::{ApiError, AuthError};

const LOGIN_PATH: &str = "/api/auth/login";
const REGISTER_PATH: &str = "/api/auth/register";
const ME_PATH: &str = "/api/auth/me";
const DEMO_USER_ID: &str = "demo-user";

/// A resolved sign-in: who the user is and the credential to act as them.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub identity: UserIdentity,
    pub token: String,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("identity", &self.identity)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: UserIdentity,
}

#[derive(Clone, Debug)]
enum AuthBackend {
    Remote(ApiClient),
    Demo,
}

/// The auth gate: signs users in and out and remembers the session.
///
/// The token (and in demo mode the user) live in the durable record store;
/// the browse-without-saving flag lives in the session store.
#[derive(Clone)]
pub struct AuthService {
    backend: AuthBackend,
    durable: Arc<dyn RecordStore>,
    session: Arc<dyn RecordStore>,
}

impl AuthService {
    #[must_use]
    pub fn remote(
        client: ApiClient,
        durable: Arc<dyn RecordStore>,
        session: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            backend: AuthBackend::Remote(client),
            durable,
            session,
        }
    }

    /// Frontend-only mode: any well-formed credentials sign in locally.
    #[must_use]
    pub fn demo(durable: Arc<dyn RecordStore>, session: Arc<dyn RecordStore>) -> Self {
        Self {
            backend: AuthBackend::Demo,
            durable,
            session,
        }
    }

    #[must_use]
    pub fn mode(&self) -> PersistenceMode {
        match self.backend {
            AuthBackend::Remote(_) => PersistenceMode::Remote,
            AuthBackend::Demo => PersistenceMode::Local,
        }
    }

    /// Resume the saved session, if any.
    ///
    /// An unusable saved session (rejected token, missing or unreadable user)
    /// is cleared and reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the record store cannot be read.
    pub async fn restore(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some(token) = self.durable.get(keys::AUTH_TOKEN).await? else {
            return Ok(None);
        };

        let identity = match &self.backend {
            AuthBackend::Demo => self.saved_user().await?,
            AuthBackend::Remote(client) => {
                match client.with_token(&token).get_json::<UserIdentity>(ME_PATH).await {
                    Ok(user) => Some(user),
                    Err(err) => {
                        warn!(error = %err, "auth check failed");
                        None
                    }
                }
            }
        };

        match identity {
            Some(identity) => {
                debug!(user = %identity.id, "restored session");
                Ok(Some(AuthSession { identity, token }))
            }
            None => {
                self.logout().await?;
                Ok(None)
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Credentials` for malformed input,
    /// `AuthError::Rejected` when the API refuses the credentials, and
    /// transport or storage errors otherwise.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let credentials = Credentials::new(email, password)?;

        let session = match &self.backend {
            AuthBackend::Demo => AuthSession {
                identity: UserIdentity {
                    id: UserId::new(DEMO_USER_ID)?,
                    name: credentials.email_local_part().to_owned(),
                    email: credentials.email().to_owned(),
                },
                token: demo_token(),
            },
            AuthBackend::Remote(client) => {
                let reply: TokenResponse = client
                    .post_json(LOGIN_PATH, &credentials)
                    .await
                    .map_err(rejected)?;
                reply.into()
            }
        };

        self.save(&session).await?;
        info!(user = %session.identity.id, "signed in");
        Ok(session)
    }

    /// Create an account and sign in as it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Credentials` if the draft fails validation,
    /// `AuthError::Rejected` when the API refuses it (e.g. email taken), and
    /// transport or storage errors otherwise.
    pub async fn register(&self, draft: RegistrationDraft) -> Result<AuthSession, AuthError> {
        let registration = draft.validate()?;

        let session = match &self.backend {
            AuthBackend::Demo => AuthSession {
                identity: UserIdentity {
                    id: UserId::new(format!("{DEMO_USER_ID}-{}", Uuid::new_v4().simple()))?,
                    name: registration.name().to_owned(),
                    email: registration.email().to_owned(),
                },
                token: demo_token(),
            },
            AuthBackend::Remote(client) => {
                let reply: TokenResponse = client
                    .post_json(REGISTER_PATH, &registration)
                    .await
                    .map_err(rejected)?;
                reply.into()
            }
        };

        self.save(&session).await?;
        info!(user = %session.identity.id, "registered");
        Ok(session)
    }

    /// Forget the saved session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the records cannot be removed.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.durable.remove(keys::AUTH_TOKEN).await?;
        self.durable.remove(keys::AUTH_USER).await?;
        info!("signed out");
        Ok(())
    }

    /// Remember, for this session only, that the user chose to browse
    /// without saving progress.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the session store cannot be written.
    pub async fn enable_browse_mode(&self) -> Result<(), AuthError> {
        self.session.put(keys::BROWSE_MODE, "true").await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the session store cannot be read.
    pub async fn browse_mode(&self) -> Result<bool, AuthError> {
        let flag = self.session.get(keys::BROWSE_MODE).await?;
        Ok(flag.as_deref() == Some("true"))
    }

    async fn saved_user(&self) -> Result<Option<UserIdentity>, AuthError> {
        let Some(raw) = self.durable.get(keys::AUTH_USER).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(err) => {
                warn!(error = %err, "saved user record is unreadable");
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &AuthSession) -> Result<(), AuthError> {
        self.durable.put(keys::AUTH_TOKEN, &session.token).await?;
        if matches!(self.backend, AuthBackend::Demo) {
            let raw = serde_json::to_string(&session.identity)
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            self.durable.put(keys::AUTH_USER, &raw).await?;
        }
        Ok(())
    }
}

impl From<TokenResponse> for AuthSession {
    fn from(reply: TokenResponse) -> Self {
        Self {
            identity: reply.user,
            token: reply.access_token,
        }
    }
}

fn demo_token() -> String {
    format!("demo-token-{}", Uuid::new_v4().simple())
}

fn rejected(err: ApiError) -> AuthError {
    match err {
        ApiError::HttpStatus { status, detail } => AuthError::Rejected {
            status: status.as_u16(),
            detail: detail.unwrap_or_else(|| "authentication failed".to_owned()),
        },
        other => AuthError::Api(other),
    }
}
