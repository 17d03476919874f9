//! Seam to the external network client that owns the account protocol.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Registration form as sent by the front end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Any further fields are passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[cfg_attr(test, mockall::automock)]
pub trait AccountClient: Send + Sync {
    /// Sign in with stored credentials; `Ok(false)` means rejected.
    fn login(&self, username: &str, password: &str) -> Result<bool>;

    fn register(&self, form: &RegisterForm) -> Result<bool>;
}

/// Client used when no network client is wired in: accepts every request.
pub struct OfflineAccountClient;

impl AccountClient for OfflineAccountClient {
    fn login(&self, username: &str, _password: &str) -> Result<bool> {
        debug!("Offline login accepted for '{}'", username);
        Ok(true)
    }

    fn register(&self, form: &RegisterForm) -> Result<bool> {
        debug!("Offline registration accepted for '{}'", form.username);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_form_keeps_extra_fields() {
        let form: RegisterForm = serde_json::from_str(
            r#"{"username":"alice","password":"pw","email":"a@example.com","gender":"bot"}"#,
        )
        .unwrap();
        assert_eq!(form.username, "alice");
        assert_eq!(form.extra.len(), 2);
        assert_eq!(form.extra["email"], "a@example.com");
    }

    #[test]
    fn test_offline_client_accepts() {
        let client = OfflineAccountClient;
        assert!(client.login("alice", "pw").unwrap());
        assert!(client.register(&RegisterForm::default()).unwrap());
    }
}
