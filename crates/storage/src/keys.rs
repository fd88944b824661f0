//! Record keys shared by every record store backend.

use guide_core::model::UserId;

/// Bearer token of the signed-in user.
pub const AUTH_TOKEN: &str = "pm_guide_token";

/// Serialized `UserIdentity` of the signed-in user (demo mode only).
pub const AUTH_USER: &str = "pm_guide_user";

/// Session-scoped "browse without saving" flag. Not namespaced by user.
pub const BROWSE_MODE: &str = "pm_guide_browse_mode";

const PROGRESS_PREFIX: &str = "pm_guide_progress_";

/// Key of the progress record owned by `user_id`.
#[must_use]
pub fn progress_key(user_id: &UserId) -> String {
    format!("{PROGRESS_PREFIX}{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_key_is_namespaced_by_user() {
        let a = UserId::new("alice").unwrap();
        let b = UserId::new("bob").unwrap();
        assert_eq!(progress_key(&a), "pm_guide_progress_alice");
        assert_ne!(progress_key(&a), progress_key(&b));
    }
}
