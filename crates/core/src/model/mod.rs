pub mod catalog;
mod ids;
mod progress;
mod settings;
pub mod timestamp;
mod user;

pub use catalog::{KNOWN_MODULES, MODULE_COUNT, is_known_module, known_module_ids, module_title};
pub use ids::{AssessmentId, IdError, ModuleId, SectionId, UserId};
pub use progress::{AssessmentResult, ModuleStatus, ProgressState};
pub use settings::{
    DEFAULT_API_BASE_URL, DEFAULT_DATABASE_URL, DEFAULT_HTTP_TIMEOUT_SECS, GuideSettings,
    GuideSettingsDraft, PersistenceMode, SettingsError,
};
pub use user::{Credentials, CredentialsError, Registration, RegistrationDraft, UserIdentity};
