use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://pm_guide.sqlite3";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;
const MAX_HTTP_TIMEOUT_SECS: u64 = 120;

/// Where progress and identity are persisted. Chosen once at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PersistenceMode {
    /// REST API with bearer-token auth.
    Remote,
    /// Local records keyed by user id, demo auth.
    #[default]
    Local,
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceMode::Remote => f.write_str("remote"),
            PersistenceMode::Local => f.write_str("local"),
        }
    }
}

impl FromStr for PersistenceMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            other => Err(SettingsError::UnknownMode(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuideSettings {
    mode: PersistenceMode,
    api_base_url: Url,
    database_url: String,
    http_timeout: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct GuideSettingsDraft {
    pub mode: Option<String>,
    pub api_base_url: Option<String>,
    pub database_url: Option<String>,
    pub http_timeout_secs: Option<u64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("unknown persistence mode: {0} (expected `remote` or `local`)")]
    UnknownMode(String),
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("HTTP timeout must be between 1 and {MAX_HTTP_TIMEOUT_SECS} seconds")]
    InvalidTimeout,
}

impl GuideSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and fill in defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the mode is unknown, the base URL does not
    /// parse, or the timeout is out of range.
    pub fn validate(self) -> Result<GuideSettings, SettingsError> {
        let mode = normalize_optional(self.mode)
            .map(|raw| raw.parse::<PersistenceMode>())
            .transpose()?
            .unwrap_or_default();

        let raw_url = normalize_optional(self.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        let api_base_url =
            Url::parse(&raw_url).map_err(|_| SettingsError::InvalidBaseUrl(raw_url.clone()))?;
        if !matches!(api_base_url.scheme(), "http" | "https") {
            return Err(SettingsError::InvalidBaseUrl(raw_url));
        }

        let database_url = normalize_optional(self.database_url)
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned());

        let timeout_secs = self.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        if !(1..=MAX_HTTP_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(SettingsError::InvalidTimeout);
        }

        Ok(GuideSettings {
            mode,
            api_base_url,
            database_url,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl GuideSettings {
    #[must_use]
    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    #[must_use]
    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_uses_defaults() {
        let settings = GuideSettingsDraft::new().validate().unwrap();
        assert_eq!(settings.mode(), PersistenceMode::Local);
        assert_eq!(settings.api_base_url().as_str(), "http://localhost:8000/");
        assert_eq!(settings.database_url(), DEFAULT_DATABASE_URL);
        assert_eq!(settings.http_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn parses_remote_mode_and_url() {
        let settings = GuideSettingsDraft {
            mode: Some(" Remote ".into()),
            api_base_url: Some("https://guide.example.com".into()),
            ..GuideSettingsDraft::default()
        }
        .validate()
        .unwrap();
        assert_eq!(settings.mode(), PersistenceMode::Remote);
        assert_eq!(settings.api_base_url().host_str(), Some("guide.example.com"));
    }

    #[test]
    fn rejects_bad_values() {
        let bad_mode = GuideSettingsDraft {
            mode: Some("cloud".into()),
            ..GuideSettingsDraft::default()
        };
        assert!(matches!(bad_mode.validate(), Err(SettingsError::UnknownMode(_))));

        let bad_url = GuideSettingsDraft {
            api_base_url: Some("not a url".into()),
            ..GuideSettingsDraft::default()
        };
        assert!(matches!(bad_url.validate(), Err(SettingsError::InvalidBaseUrl(_))));

        let bad_timeout = GuideSettingsDraft {
            http_timeout_secs: Some(0),
            ..GuideSettingsDraft::default()
        };
        assert_eq!(bad_timeout.validate(), Err(SettingsError::InvalidTimeout));
    }
}
