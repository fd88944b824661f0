#![forbid(unsafe_code)]

pub mod api_client;
pub mod app_services;
pub mod auth_service;
pub mod config;
pub mod error;
pub mod progress;
pub mod remote_progress;

pub use guide_core::Clock;

pub use api_client::ApiClient;
pub use app_services::AppServices;
pub use auth_service::{AuthService, AuthSession};
pub use config::GuideConfig;
pub use error::{ApiError, AppServicesError, AuthError, ConfigError, ProgressError};
pub use progress::{PersistenceBackend, ProgressOrigin, ProgressStore};
pub use remote_progress::RemoteProgressRepository;
