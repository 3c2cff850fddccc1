//! Tutors log each tutoring session with a screenshot as proof.

use std::path::{Path, PathBuf};

use axum::{
    debug_handler,
    extract::{DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Router,
};
use serde::Serialize;
use time::{macros::format_description, OffsetDateTime, Time};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    baas::{child_keys, paths, Backend},
    gate::Caller,
    include_res,
    profile::Role,
    res, session, AppError, AppResult, AppState, Config,
};

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "heic"];

pub fn router(config: &Config) -> Router<AppState> {
    Router::new().route(
        "/record-session",
        get(record_session_page)
            .post(record_session)
            .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
    )
}

/// Lowercased extension of an allowed screenshot name. Only the name is
/// checked, never the content.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn content_type(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub student_name: String,
    pub tutor_name: String,
    pub subject: String,
    pub topic: String,
    pub screenshot: String,
}

#[derive(Debug, Default)]
pub struct SessionUpload {
    pub start: Option<String>,
    pub end: Option<String>,
    pub student: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub filename: Option<String>,
    pub screenshot: Vec<u8>,
}

/// A submission that passed every check, ready to store.
#[derive(Debug)]
pub struct CheckedUpload {
    pub start: String,
    pub end: String,
    pub student: String,
    pub subject: String,
    pub topic: String,
    pub extension: String,
    pub screenshot: Vec<u8>,
}

fn parse_clock(value: &str) -> Option<Time> {
    Time::parse(value, format_description!("[hour]:[minute]")).ok()
}

impl SessionUpload {
    async fn read(mut multipart: Multipart) -> AppResult<SessionUpload> {
        let mut upload = SessionUpload::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            if name == "screenshot" {
                upload.filename = field.file_name().map(str::to_owned);
                upload.screenshot = field.bytes().await?.to_vec();
                continue;
            }
            let value = field.text().await?;
            let value = Some(value.trim().to_owned()).filter(|v| !v.is_empty());
            match name.as_str() {
                "start" => upload.start = value,
                "end" => upload.end = value,
                "student" => upload.student = value,
                "subject" => upload.subject = value,
                "topic" => upload.topic = value,
                _ => {}
            }
        }
        Ok(upload)
    }

    pub fn check(self) -> Result<CheckedUpload, &'static str> {
        let (Some(start), Some(end), Some(student), Some(subject)) = (self.start, self.end, self.student, self.subject)
        else {
            return Err("Please provide all of the above information.");
        };
        let extension = self
            .filename
            .as_deref()
            .filter(|_| !self.screenshot.is_empty())
            .and_then(allowed_extension)
            .ok_or("File type not allowed.")?;
        match (parse_clock(&start), parse_clock(&end)) {
            (Some(from), Some(to)) if from < to => {}
            _ => return Err("Please provide a start time before the end time."),
        }
        if !paths::is_valid_key(&student) {
            return Err("Please choose a student from the list.");
        }

        Ok(CheckedUpload {
            start,
            end,
            student,
            subject,
            topic: self.topic.unwrap_or_default(),
            extension,
            screenshot: self.screenshot,
        })
    }
}

/// Writes `bytes` to a staging file unique to this request, runs `upload`
/// on it, and removes the file whatever the outcome.
async fn with_staged_file<F, Fut, T>(dir: &Path, extension: &str, bytes: &[u8], upload: F) -> AppResult<T>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: std::future::Future<Output = AppResult<T>>,
{
    tokio::fs::create_dir_all(dir).await?;
    let staged = dir.join(format!("{}.{extension}", Uuid::new_v4()));
    tokio::fs::write(&staged, bytes).await?;

    let result = upload(staged.clone()).await;
    if let Err(err) = tokio::fs::remove_file(&staged).await {
        tracing::warn!(path = %staged.display(), error = %err, "could not remove staged screenshot");
    }
    result
}

pub async fn store(
    backend: &Backend,
    upload_dir: &Path,
    token: &str,
    tutor: &str,
    upload: CheckedUpload,
    date: &str,
) -> AppResult<SessionRecord> {
    let pair = paths::pair(tutor, &upload.student);
    let object_path = format!("{}/{pair}/{date}", paths::SCREENSHOTS);

    let mime = content_type(&upload.extension);
    let object = object_path.as_str();
    with_staged_file(upload_dir, &upload.extension, &upload.screenshot, |staged| async move {
        let bytes = tokio::fs::read(&staged).await?;
        backend.objects.put(token, object, mime, bytes).await?;
        Ok::<(), AppError>(())
    })
    .await?;

    let record = SessionRecord {
        date: date.to_owned(),
        start_time: upload.start,
        end_time: upload.end,
        student_name: upload.student,
        tutor_name: tutor.to_owned(),
        subject: upload.subject,
        topic: upload.topic,
        screenshot: object_path,
    };
    backend
        .records
        .set(token, &format!("{}/{pair}/{date}", paths::SESSIONS), serde_json::to_value(&record)?)
        .await?;
    Ok(record)
}

#[debug_handler(state = AppState)]
pub(crate) async fn record_session_page(
    State(backend): State<Backend>,
    Extension(Caller { token, profile }): Extension<Caller>,
    session: Session,
) -> AppResult<Response> {
    if profile.role != Role::Tutor {
        return Ok(Redirect::to("/home").into_response());
    }

    let students = child_keys(backend.records.get(&token, paths::STUDENTS).await?.as_ref());
    let flashes = session::take_flashes(&session).await?;
    let body = include_res!(str, "/pages/record-session.html")
        .replace("{students}", &res::options(&students))
        .replace("{accept}", &ALLOWED_EXTENSIONS.map(|e| format!(".{e}")).join(","));
    Ok(res::page("Record a Session", &flashes, &body).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn record_session(
    State(backend): State<Backend>,
    State(config): State<std::sync::Arc<Config>>,
    Extension(Caller { token, profile }): Extension<Caller>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Response> {
    if profile.role != Role::Tutor {
        return Ok(Redirect::to("/home").into_response());
    }

    let upload = match SessionUpload::read(multipart).await?.check() {
        Ok(upload) => upload,
        Err(message) => {
            tracing::warn!(tutor = %profile.name, reason = message, "session upload rejected");
            session::flash(&session, message).await?;
            return Ok(Redirect::to("/record-session").into_response());
        }
    };

    let date = OffsetDateTime::now_utc()
        .date()
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(anyhow::Error::from)?;
    let record = store(&backend, &config.upload_dir, &token, &profile.name, upload, &date).await?;
    tracing::info!(tutor = %record.tutor_name, student = %record.student_name, %date, "session recorded");

    session::flash(&session, "Session recorded.").await?;
    Ok(Redirect::to("/home").into_response())
}
