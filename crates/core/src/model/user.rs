use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

const MIN_PASSWORD_LEN: usize = 6;

/// The signed-in learner, as reported by the auth gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CredentialsError {
    #[error("email address is required")]
    MissingEmail,
    #[error("email address is invalid")]
    InvalidEmail,
    #[error("password is required")]
    MissingPassword,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("name is required")]
    MissingName,
}

/// Validated login input.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    email: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// # Errors
    ///
    /// Returns `CredentialsError` if the email is blank or malformed, or the
    /// password is empty.
    pub fn new(email: &str, password: &str) -> Result<Self, CredentialsError> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(CredentialsError::MissingPassword);
        }
        Ok(Self {
            email,
            password: password.to_owned(),
        })
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// The part of the email before `@`, used as a display name in demo mode.
    #[must_use]
    pub fn email_local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// Raw sign-up form input.
#[derive(Clone, Debug, Default)]
pub struct RegistrationDraft {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Validated sign-up input.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    name: String,
    email: String,
    password: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RegistrationDraft {
    /// Validate and normalize the draft.
    ///
    /// # Errors
    ///
    /// Returns `CredentialsError` if the name is blank, the email is invalid,
    /// or the password is shorter than six characters.
    pub fn validate(self) -> Result<Registration, CredentialsError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(CredentialsError::MissingName);
        }
        let email = normalize_email(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CredentialsError::PasswordTooShort);
        }
        Ok(Registration {
            name,
            email,
            password: self.password,
        })
    }
}

impl Registration {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

fn normalize_email(raw: &str) -> Result<String, CredentialsError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(CredentialsError::MissingEmail);
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email.to_owned()),
        _ => Err(CredentialsError::InvalidEmail),
    }
}
