//! In-process stand-ins for the hosted backend. Used by the test suite and
//! handy for poking at pages without network access.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Account, BaasError, Backend, Credentials, IdentityProvider, ObjectStore, RecordStore};

#[derive(Clone, Default)]
pub struct MemoryBackend {
    pub identity: Arc<MemoryIdentity>,
    pub records: Arc<MemoryRecords>,
    pub objects: Arc<MemoryObjects>,
}

impl MemoryBackend {
    pub fn backend(&self) -> Backend {
        Backend {
            identity: self.identity.clone(),
            records: self.records.clone(),
            objects: self.objects.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredAccount {
    password: String,
    account: Account,
}

#[derive(Default)]
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, StoredAccount>>,
    verification_emails: Mutex<Vec<String>>,
    reset_emails: Mutex<Vec<String>>,
}

fn token_for(local_id: &str) -> String {
    format!("token-{local_id}")
}

impl MemoryIdentity {
    pub async fn verify_email(&self, email: &str) {
        if let Some(stored) = self.accounts.lock().await.get_mut(email) {
            stored.account.email_verified = true;
        }
    }

    pub async fn account(&self, email: &str) -> Option<Account> {
        self.accounts.lock().await.get(email).map(|s| s.account.clone())
    }

    pub async fn verification_emails(&self) -> Vec<String> {
        self.verification_emails.lock().await.clone()
    }

    pub async fn reset_emails(&self) -> Vec<String> {
        self.reset_emails.lock().await.clone()
    }

    async fn by_token(&self, id_token: &str) -> Option<String> {
        self.accounts
            .lock()
            .await
            .iter()
            .find(|(_, s)| token_for(&s.account.local_id) == id_token)
            .map(|(email, _)| email.clone())
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Credentials, BaasError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(email) {
            return Err(BaasError::EmailExists);
        }
        let local_id = Uuid::new_v4().simple().to_string();
        accounts.insert(
            email.to_owned(),
            StoredAccount {
                password: password.to_owned(),
                account: Account {
                    local_id: local_id.clone(),
                    email: email.to_owned(),
                    email_verified: false,
                    display_name: None,
                },
            },
        );
        Ok(Credentials { id_token: token_for(&local_id), local_id })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, BaasError> {
        let accounts = self.accounts.lock().await;
        let stored = accounts.get(email).ok_or(BaasError::AccountNotFound)?;
        if stored.password != password {
            return Err(BaasError::InvalidCredentials);
        }
        Ok(Credentials {
            id_token: token_for(&stored.account.local_id),
            local_id: stored.account.local_id.clone(),
        })
    }

    async fn lookup(&self, id_token: &str) -> Result<Account, BaasError> {
        let email = self.by_token(id_token).await.ok_or(BaasError::InvalidToken)?;
        self.account(&email).await.ok_or(BaasError::AccountNotFound)
    }

    async fn set_display_name(&self, id_token: &str, name: &str) -> Result<(), BaasError> {
        let email = self.by_token(id_token).await.ok_or(BaasError::InvalidToken)?;
        if let Some(stored) = self.accounts.lock().await.get_mut(&email) {
            stored.account.display_name = Some(name.to_owned());
        }
        Ok(())
    }

    async fn send_email_verification(&self, id_token: &str) -> Result<(), BaasError> {
        let email = self.by_token(id_token).await.ok_or(BaasError::InvalidToken)?;
        self.verification_emails.lock().await.push(email);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), BaasError> {
        if !self.accounts.lock().await.contains_key(email) {
            return Err(BaasError::AccountNotFound);
        }
        self.reset_emails.lock().await.push(email.to_owned());
        Ok(())
    }

    async fn delete_account(&self, id_token: &str) -> Result<(), BaasError> {
        let email = self.by_token(id_token).await.ok_or(BaasError::InvalidToken)?;
        self.accounts.lock().await.remove(&email);
        Ok(())
    }
}

/// A single JSON tree; writes of `null` prune the node like the hosted
/// database does.
pub struct MemoryRecords {
    root: Mutex<Value>,
}

impl Default for MemoryRecords {
    fn default() -> Self {
        Self { root: Mutex::new(Value::Object(Map::new())) }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn lookup_node<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(key))
}

fn write_node(node: &mut Value, path: &[&str], value: Value) {
    let Some((key, rest)) = path.split_first() else {
        *node = if value.is_null() { Value::Object(Map::new()) } else { value };
        return;
    };

    if value.is_null() {
        remove_node(node, key, rest);
        return;
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else { return };
    let child = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    write_node(child, rest, value);
}

/// Deletes `key/rest...` and prunes parents left empty.
fn remove_node(node: &mut Value, key: &str, rest: &[&str]) {
    let Value::Object(map) = node else { return };
    match rest.split_first() {
        None => {
            map.remove(key);
        }
        Some((next, rest)) => {
            let Some(child) = map.get_mut(key) else { return };
            remove_node(child, next, rest);
            if child.as_object().is_some_and(Map::is_empty) {
                map.remove(key);
            }
        }
    }
}

impl MemoryRecords {
    /// Snapshot of `path` without going through a token.
    pub async fn read(&self, path: &str) -> Option<Value> {
        lookup_node(&*self.root.lock().await, &segments(path)).cloned()
    }

    pub async fn write(&self, path: &str, value: Value) {
        write_node(&mut *self.root.lock().await, &segments(path), value);
    }
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn get(&self, _token: &str, path: &str) -> Result<Option<Value>, BaasError> {
        Ok(self.read(path).await)
    }

    async fn set(&self, _token: &str, path: &str, value: Value) -> Result<(), BaasError> {
        self.write(path, value).await;
        Ok(())
    }

    async fn update(&self, _token: &str, path: &str, fields: Value) -> Result<(), BaasError> {
        let Value::Object(fields) = fields else {
            return Err(BaasError::Rejected(format!("update of {path} needs an object")));
        };
        let mut root = self.root.lock().await;
        for (key, value) in fields {
            let full = format!("{path}/{key}");
            write_node(&mut root, &segments(&full), value);
        }
        Ok(())
    }

    async fn push(&self, _token: &str, path: &str, value: Value) -> Result<String, BaasError> {
        let key = Uuid::now_v7().simple().to_string();
        self.write(&format!("{path}/{key}"), value).await;
        Ok(key)
    }
}

#[derive(Default)]
pub struct MemoryObjects {
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryObjects {
    pub async fn get(&self, path: &str) -> Option<(String, Vec<u8>)> {
        self.objects.lock().await.get(path).cloned()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn put(&self, _token: &str, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), BaasError> {
        self.objects
            .lock()
            .await
            .insert(path.to_owned(), (content_type.to_owned(), bytes));
        Ok(())
    }
}
