use std::env;

use guide_core::model::{GuideSettings, GuideSettingsDraft};

use crate::error::ConfigError;

pub const MODE_VAR: &str = "PM_GUIDE_MODE";
pub const API_URL_VAR: &str = "PM_GUIDE_API_URL";
pub const DB_URL_VAR: &str = "PM_GUIDE_DB_URL";
pub const HTTP_TIMEOUT_VAR: &str = "PM_GUIDE_HTTP_TIMEOUT_SECS";

/// Startup configuration gathered from the environment, before validation.
#[derive(Clone, Debug, Default)]
pub struct GuideConfig {
    draft: GuideSettingsDraft,
}

impl GuideConfig {
    /// Read `PM_GUIDE_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnv` if the timeout is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`GuideConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnv` if the timeout is not a number.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_timeout_secs = match lookup(HTTP_TIMEOUT_VAR) {
            Some(raw) if !raw.trim().is_empty() => {
                Some(raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                    var: HTTP_TIMEOUT_VAR,
                    value: raw,
                })?)
            }
            _ => None,
        };

        Ok(Self {
            draft: GuideSettingsDraft {
                mode: lookup(MODE_VAR),
                api_base_url: lookup(API_URL_VAR),
                database_url: lookup(DB_URL_VAR),
                http_timeout_secs,
            },
        })
    }

    /// Apply explicit overrides (e.g. command-line flags) on top of the
    /// environment. `None` fields keep the environment value.
    #[must_use]
    pub fn with_overrides(mut self, overrides: GuideSettingsDraft) -> Self {
        if overrides.mode.is_some() {
            self.draft.mode = overrides.mode;
        }
        if overrides.api_base_url.is_some() {
            self.draft.api_base_url = overrides.api_base_url;
        }
        if overrides.database_url.is_some() {
            self.draft.database_url = overrides.database_url;
        }
        if overrides.http_timeout_secs.is_some() {
            self.draft.http_timeout_secs = overrides.http_timeout_secs;
        }
        self
    }

    /// Validate and fill in defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Settings` if any value is rejected.
    pub fn into_settings(self) -> Result<GuideSettings, ConfigError> {
        Ok(self.draft.validate()?)
    }
}
