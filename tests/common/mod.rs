#![allow(dead_code)]

use std::path::PathBuf;

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use tutordesk::{
    baas::{memory::MemoryBackend, IdentityProvider},
    config::FirebaseConfig,
    AppState, Config,
};

pub const BOUNDARY: &str = "tutordesk-test-boundary";

/// The whole app over an in-memory backend, with one browser's cookie jar.
pub struct TestApp {
    pub mem: MemoryBackend,
    pub upload_dir: PathBuf,
    router: Router,
    cookie: Option<String>,
}

pub fn test_config(upload_dir: PathBuf) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_owned(),
        firebase: FirebaseConfig {
            api_key: "test-key".to_owned(),
            database_url: "https://test.example.com".to_owned(),
            storage_bucket: "test.appspot.com".to_owned(),
        },
        chapters: vec!["Wheeler".to_owned(), "Lakeside".to_owned()],
        upload_dir,
        secure_cookies: false,
        session_minutes: 60,
        max_upload_bytes: 1024 * 1024,
    }
}

impl TestApp {
    pub fn new() -> TestApp {
        let mem = MemoryBackend::default();
        let upload_dir = std::env::temp_dir().join(format!("tutordesk-test-{}", uuid::Uuid::new_v4()));
        let state = AppState::new(mem.backend(), test_config(upload_dir.clone()));
        TestApp {
            mem,
            upload_dir,
            router: tutordesk::app(state),
            cookie: None,
        }
    }

    /// Same backend, fresh browser.
    pub fn forget_cookie(&mut self) {
        self.cookie = None;
    }

    pub async fn send(&mut self, request: Request<Body>) -> Response<Body> {
        let mut request = request;
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap().to_owned();
            // a removal cookie carries no value
            self.cookie = Some(pair).filter(|p| !p.ends_with('='));
        }
        response
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&mut self, uri: &str, body: &str) -> Response<Body> {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_multipart(&mut self, uri: &str, fields: &[(&str, &str)], file: (&str, &[u8])) -> Response<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            );
        }
        let (filename, bytes) = file;
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"screenshot\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Creates an account and its record directly in the backend, then logs
    /// in through the app.
    pub async fn seed_member(&mut self, email: &str, name: &str, collection: &str, record: serde_json::Value) {
        let creds = self.mem.identity.sign_up(email, "password123").await.unwrap();
        self.mem.identity.set_display_name(&creds.id_token, name).await.unwrap();
        self.mem.identity.verify_email(email).await;
        self.mem.records.write(&format!("{collection}/{name}"), record).await;
    }

    pub async fn login(&mut self, email: &str) {
        self.forget_cookie();
        let response = self
            .post_form("/login", &format!("email={}&password=password123", email.replace('@', "%40")))
            .await;
        assert_eq!(location(&response), "/home");
    }

    pub async fn login_as_tutor(&mut self, name: &str, admin: bool) -> String {
        let email = format!("{}@example.com", name.replace(' ', ".").to_lowercase());
        self.seed_member(
            &email,
            name,
            "users/tutors",
            json!({ "admin": admin, "contractSigned": true, "profile": "Math and science" }),
        )
        .await;
        self.login(&email).await;
        email
    }

    pub async fn login_as_student(&mut self, name: &str) -> String {
        let email = format!("{}@example.com", name.replace(' ', ".").to_lowercase());
        self.seed_member(&email, name, "users/students", json!({ "contractSigned": true, "subject": "Math" }))
            .await;
        self.login(&email).await;
        email
    }
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .map(|l| l.to_str().unwrap())
        .unwrap_or_default()
}

pub fn is_redirect(response: &Response<Body>) -> bool {
    response.status() == StatusCode::SEE_OTHER
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
