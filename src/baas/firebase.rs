use async_trait::async_trait;
use reqwest::{header, StatusCode, Url};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{config::FirebaseConfig, GetField};

use super::{Account, BaasError, Credentials, IdentityProvider, ObjectStore, RecordStore};

const IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts";
const STORAGE_URL: &str = "https://firebasestorage.googleapis.com/v0/b";

#[derive(Clone)]
pub struct Firebase {
    http: reqwest::Client,
    api_key: String,
    database_url: Url,
    storage_bucket: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

impl Firebase {
    pub fn new(config: &FirebaseConfig) -> Result<Firebase, BaasError> {
        let database_url = Url::parse(&config.database_url)
            .map_err(|e| BaasError::Malformed(format!("databaseURL {}: {e}", config.database_url)))?;
        Ok(Firebase {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            database_url,
            storage_bucket: config.storage_bucket.clone(),
        })
    }

    async fn identity_call(&self, endpoint: &str, body: &impl Serialize) -> Result<Value, BaasError> {
        let res = self
            .http
            .post(format!("{IDENTITY_URL}:{endpoint}"))
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await?;

        if res.status().is_success() {
            return Ok(res.json().await?);
        }

        let body: Value = res.json().await.unwrap_or_default();
        let code = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");
        Err(identity_error(code))
    }

    /// `{databaseURL}/{path}.json`, each segment percent-encoded.
    fn record_url(&self, path: &str, token: &str) -> Result<Url, BaasError> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let last = format!("{}.json", segments.pop().unwrap_or(""));

        let mut url = self.database_url.clone();
        url.path_segments_mut()
            .map_err(|_| BaasError::Malformed(format!("databaseURL {} cannot hold a path", self.database_url)))?
            .pop_if_empty()
            .extend(segments)
            .push(&last);
        url.query_pairs_mut().append_pair("auth", token);
        Ok(url)
    }

    async fn record_call(&self, request: reqwest::RequestBuilder, path: &str) -> Result<Value, BaasError> {
        let res = request.send().await?;
        match res.status() {
            status if status.is_success() => Ok(res.json().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BaasError::PermissionDenied(path.to_owned())),
            status => {
                let body = res.text().await.unwrap_or_default();
                Err(BaasError::Rejected(format!("{status} on {path}: {body}")))
            }
        }
    }
}

fn identity_error(code: &str) -> BaasError {
    // Codes sometimes carry a detail suffix, e.g. "WEAK_PASSWORD : Password should be ..."
    let head = code.split([' ', ':']).next().unwrap_or(code);
    match head {
        "EMAIL_EXISTS" => BaasError::EmailExists,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => BaasError::InvalidCredentials,
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => BaasError::AccountNotFound,
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_DISABLED" => BaasError::InvalidToken,
        _ => BaasError::Rejected(code.to_owned()),
    }
}

fn credentials(body: &Value) -> Result<Credentials, BaasError> {
    Ok(Credentials {
        id_token: body.get_str_field("idToken")?,
        local_id: body.get_str_field("localId")?,
    })
}

#[async_trait]
impl IdentityProvider for Firebase {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Credentials, BaasError> {
        let body = self
            .identity_call("signUp", &PasswordRequest { email, password, return_secure_token: true })
            .await?;
        credentials(&body)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, BaasError> {
        let body = self
            .identity_call(
                "signInWithPassword",
                &PasswordRequest { email, password, return_secure_token: true },
            )
            .await?;
        credentials(&body)
    }

    async fn lookup(&self, id_token: &str) -> Result<Account, BaasError> {
        let body = self.identity_call("lookup", &json!({ "idToken": id_token })).await?;
        let user = body
            .get("users")
            .and_then(|users| users.get(0))
            .ok_or(BaasError::AccountNotFound)?;

        Ok(Account {
            local_id: user.get_str_field("localId")?,
            email: user.get_str_field("email")?,
            email_verified: user.get("emailVerified").and_then(Value::as_bool).unwrap_or(false),
            display_name: user.get_str_field("displayName").ok(),
        })
    }

    async fn set_display_name(&self, id_token: &str, name: &str) -> Result<(), BaasError> {
        self.identity_call(
            "update",
            &json!({ "idToken": id_token, "displayName": name, "returnSecureToken": false }),
        )
        .await?;
        Ok(())
    }

    async fn send_email_verification(&self, id_token: &str) -> Result<(), BaasError> {
        self.identity_call("sendOobCode", &json!({ "requestType": "VERIFY_EMAIL", "idToken": id_token }))
            .await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), BaasError> {
        self.identity_call("sendOobCode", &json!({ "requestType": "PASSWORD_RESET", "email": email }))
            .await?;
        Ok(())
    }

    async fn delete_account(&self, id_token: &str) -> Result<(), BaasError> {
        self.identity_call("delete", &json!({ "idToken": id_token })).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for Firebase {
    async fn get(&self, token: &str, path: &str) -> Result<Option<Value>, BaasError> {
        let url = self.record_url(path, token)?;
        let value = self.record_call(self.http.get(url), path).await?;
        Ok(Some(value).filter(|v| !v.is_null()))
    }

    async fn set(&self, token: &str, path: &str, value: Value) -> Result<(), BaasError> {
        let url = self.record_url(path, token)?;
        self.record_call(self.http.put(url).json(&value), path).await?;
        Ok(())
    }

    async fn update(&self, token: &str, path: &str, fields: Value) -> Result<(), BaasError> {
        let url = self.record_url(path, token)?;
        self.record_call(self.http.patch(url).json(&fields), path).await?;
        Ok(())
    }

    async fn push(&self, token: &str, path: &str, value: Value) -> Result<String, BaasError> {
        let url = self.record_url(path, token)?;
        let body = self.record_call(self.http.post(url).json(&value), path).await?;
        Ok(body.get_str_field("name")?)
    }
}

#[async_trait]
impl ObjectStore for Firebase {
    async fn put(&self, token: &str, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), BaasError> {
        let res = self
            .http
            .post(format!("{STORAGE_URL}/{}/o", self.storage_bucket))
            .query(&[("name", path)])
            .header(header::AUTHORIZATION, format!("Firebase {token}"))
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        match res.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BaasError::PermissionDenied(path.to_owned())),
            status => Err(BaasError::Rejected(format!("{status} uploading {path}"))),
        }
    }
}
