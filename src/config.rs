use std::path::PathBuf;

use serde_json::Value;

use crate::{GetField, MissingField};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read firebase config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("firebase config is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Field(#[from] MissingField),
    #[error("{var} is not valid: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Keys from the Firebase web app config (the same JSON the console hands out).
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub database_url: String,
    pub storage_bucket: String,
}

impl FirebaseConfig {
    pub fn from_json(json: &Value) -> Result<FirebaseConfig, ConfigError> {
        Ok(FirebaseConfig {
            api_key: json.get_str_field("apiKey")?,
            database_url: json.get_str_field("databaseURL")?,
            storage_bucket: json.get_str_field("storageBucket")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub firebase: FirebaseConfig,
    pub chapters: Vec<String>,
    pub upload_dir: PathBuf,
    pub secure_cookies: bool,
    pub session_minutes: i64,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Reads `.env` and the process environment, then the Firebase config
    /// file named by `FIREBASE_CONFIG`.
    pub fn from_env() -> Result<Config, ConfigError> {
        dotenv::dotenv().ok();

        let path = dotenv::var("FIREBASE_CONFIG").unwrap_or_else(|_| "config.json".to_owned());
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let firebase = FirebaseConfig::from_json(&serde_json::from_str(&raw)?)?;

        Ok(Config {
            bind_addr: dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
            firebase,
            chapters: parse_chapters(&dotenv::var("CHAPTERS").unwrap_or_else(|_| "Wheeler".to_owned())),
            upload_dir: dotenv::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static/uploads")),
            secure_cookies: parse_var("SECURE_COOKIES", true)?,
            session_minutes: parse_var("SESSION_MINUTES", 60)?,
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match dotenv::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

pub fn parse_chapters(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
        .collect()
}
