//! Seams to the hosted backend: identity, hierarchical records and object
//! storage. [`firebase::Firebase`] talks to the real service over REST;
//! [`memory::MemoryBackend`] keeps everything in process.

pub mod firebase;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum BaasError {
    #[error("an account with that email already exists")]
    EmailExists,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account not found")]
    AccountNotFound,
    #[error("identity token rejected")]
    InvalidToken,
    #[error("permission denied for {0}")]
    PermissionDenied(String),
    #[error("backend rejected the request: {0}")]
    Rejected(String),
    #[error("malformed backend response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl From<crate::MissingField> for BaasError {
    fn from(err: crate::MissingField) -> Self {
        BaasError::Malformed(err.to_string())
    }
}

/// Tokens returned by sign-up and sign-in.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id_token: String,
    pub local_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub local_id: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Credentials, BaasError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, BaasError>;
    async fn lookup(&self, id_token: &str) -> Result<Account, BaasError>;
    async fn set_display_name(&self, id_token: &str, name: &str) -> Result<(), BaasError>;
    async fn send_email_verification(&self, id_token: &str) -> Result<(), BaasError>;
    async fn send_password_reset(&self, email: &str) -> Result<(), BaasError>;
    /// Removes the account the token belongs to.
    async fn delete_account(&self, id_token: &str) -> Result<(), BaasError>;
}

/// A realtime-database style JSON tree addressed by `/`-separated paths.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// `None` when nothing is stored at `path`.
    async fn get(&self, token: &str, path: &str) -> Result<Option<Value>, BaasError>;
    async fn set(&self, token: &str, path: &str, value: Value) -> Result<(), BaasError>;
    /// Merges `fields` into `path`. Keys may themselves be relative paths, in
    /// which case every write lands together or not at all; `null` deletes.
    async fn update(&self, token: &str, path: &str, fields: Value) -> Result<(), BaasError>;
    /// Appends `value` under a new chronologically ordered key and returns it.
    async fn push(&self, token: &str, path: &str, value: Value) -> Result<String, BaasError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        token: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BaasError>;
}

#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub records: Arc<dyn RecordStore>,
    pub objects: Arc<dyn ObjectStore>,
}

impl Backend {
    pub fn firebase(config: &crate::config::FirebaseConfig) -> Result<Backend, BaasError> {
        let firebase = Arc::new(firebase::Firebase::new(config)?);
        Ok(Backend {
            identity: firebase.clone(),
            records: firebase.clone(),
            objects: firebase,
        })
    }
}

pub mod paths {
    pub const TUTORS: &str = "users/tutors";
    pub const STUDENTS: &str = "users/students";
    pub const MESSAGES: &str = "messages";
    pub const SESSIONS: &str = "sessions";
    pub const SCREENSHOTS: &str = "screenshots";

    pub fn tutor(name: &str) -> String {
        format!("{TUTORS}/{name}")
    }

    pub fn student(name: &str) -> String {
        format!("{STUDENTS}/{name}")
    }

    /// `"{tutor} - {student}"`, the key shared by session records and
    /// their screenshots.
    pub fn pair(tutor: &str, student: &str) -> String {
        format!("{tutor} - {student}")
    }

    /// Record-store keys may not contain these characters.
    pub fn is_valid_key(key: &str) -> bool {
        !key.trim().is_empty() && !key.contains(['.', '#', '$', '[', ']', '/'])
    }
}

/// Child keys of an object value, sorted.
pub fn child_keys(value: Option<&Value>) -> Vec<String> {
    let mut keys: Vec<String> = value
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_with_reserved_characters_are_invalid() {
        assert!(paths::is_valid_key("Jane Doe"));
        assert!(!paths::is_valid_key("Jane.Doe"));
        assert!(!paths::is_valid_key("a/b"));
        assert!(!paths::is_valid_key("  "));
    }

    #[test]
    fn child_keys_are_sorted() {
        let value = json!({ "b": 1, "a": 2 });
        assert_eq!(child_keys(Some(&value)), vec!["a", "b"]);
        assert!(child_keys(None).is_empty());
        assert!(child_keys(Some(&json!("leaf"))).is_empty());
    }
}
