//! The inbox: one-to-one conversations stored under an order-independent key.

use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::post,
    Extension, Form, Router,
};
use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};
use tower_sessions::Session;

use crate::{
    baas::{paths, BaasError, Backend},
    form::filled,
    gate::Caller,
    include_res, profile, res, session, AppResult, AppState,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender_name: String,
    pub receiver_name: String,
    pub message: String,
    /// Unix milliseconds.
    pub sent_at: i64,
    pub date_sent: String,
    pub time_sent: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/send", post(send_message))
}

/// The same key whichever side is the sender.
pub fn conversation_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{first} - {second}")
}

pub async fn send(
    backend: &Backend,
    token: &str,
    sender: &str,
    receiver: &str,
    body: &str,
) -> Result<Message, BaasError> {
    let now = OffsetDateTime::now_utc();
    let message = Message {
        sender_name: sender.to_owned(),
        receiver_name: receiver.to_owned(),
        message: body.to_owned(),
        sent_at: (now.unix_timestamp_nanos() / 1_000_000) as i64,
        date_sent: now
            .format(format_description!("[month repr:short] [day] [year]"))
            .unwrap_or_default(),
        time_sent: now
            .format(format_description!("[hour repr:12]:[minute] [period]"))
            .unwrap_or_default(),
    };

    let path = format!("{}/{}", paths::MESSAGES, conversation_key(sender, receiver));
    backend
        .records
        .push(token, &path, serde_json::to_value(&message).map_err(|e| BaasError::Malformed(e.to_string()))?)
        .await?;
    Ok(message)
}

/// Every message between `a` and `b`, oldest first.
pub async fn list(backend: &Backend, token: &str, a: &str, b: &str) -> Result<Vec<Message>, BaasError> {
    let path = format!("{}/{}", paths::MESSAGES, conversation_key(a, b));
    let Some(serde_json::Value::Object(group)) = backend.records.get(token, &path).await? else {
        return Ok(Vec::new());
    };

    let mut keyed: Vec<(String, Message)> = group
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<Message>(value) {
            Ok(message) => Some((key, message)),
            Err(err) => {
                tracing::warn!(%key, error = %err, "skipping malformed message");
                None
            }
        })
        .collect();
    keyed.sort_by(|(ka, a), (kb, b)| a.sent_at.cmp(&b.sent_at).then_with(|| ka.cmp(kb)));
    Ok(keyed.into_iter().map(|(_, message)| message).collect())
}

pub fn message_html(viewer: &str, message: &Message) -> String {
    let side = if message.sender_name == viewer { "mine" } else { "theirs" };
    include_res!(str, "/pages/message.html")
        .replace("{side}", side)
        .replace("{sender}", &res::escape(&message.sender_name))
        .replace("{date}", &res::escape(&message.date_sent))
        .replace("{time}", &res::escape(&message.time_sent))
        .replace("{content}", &res::markdown(&message.message))
}

/// The open conversation panel, including the reply form.
pub fn conversation_html(viewer: &str, other: &str, messages: &[Message]) -> String {
    let items: String = if messages.is_empty() {
        "<p class=\"empty\">No messages yet.</p>".to_owned()
    } else {
        messages.iter().map(|m| message_html(viewer, m)).collect()
    };

    include_res!(str, "/pages/conversation.html")
        .replace("{receiver}", &res::escape(other))
        .replace("{messages}", &items)
}

#[derive(Deserialize)]
pub(crate) struct SendForm {
    receiver: Option<String>,
    message: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn send_message(
    State(backend): State<Backend>,
    Extension(Caller { token, profile }): Extension<Caller>,
    session: Session,
    Form(SendForm { receiver, message }): Form<SendForm>,
) -> AppResult<Response> {
    let home = if profile.is_admin { "/admin" } else { "/home" };

    let Some(receiver) = filled(&receiver) else {
        session::flash(&session, "Please provide the receiver of your message.").await?;
        return Ok(Redirect::to(home).into_response());
    };
    let Some(body) = filled(&message) else {
        session::flash(&session, "Please provide the message to send.").await?;
        return Ok(Redirect::to(home).into_response());
    };
    if !paths::is_valid_key(receiver) || profile::find_record(&backend, &token, receiver).await?.is_none() {
        session::flash(&session, "That user could not be found.").await?;
        return Ok(Redirect::to(home).into_response());
    }

    if let Err(err) = send(&backend, &token, &profile.name, receiver, body).await {
        tracing::error!(error = %err, "message send failed");
        session::flash(&session, "Your message could not be sent. Please try again.").await?;
        return Ok(Redirect::to(home).into_response());
    }

    session::mark_sent(&session, receiver).await?;
    Ok(Redirect::to(home).into_response())
}
