mod admin;
mod home;

use axum::{routing::get, Router};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{baas::Backend, include_res, messages, res, session, AppResult, AppState};

pub use home::contacts;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/home", get(home::dashboard).post(home::open_dashboard_chat))
        .route("/admin", get(admin::admin_dashboard).post(admin::open_admin_chat))
}

#[derive(Deserialize)]
pub(crate) struct ChatForm {
    user: Option<String>,
}

/// One button per contact, each posting back to `action` to open that chat.
fn contact_buttons(contacts: &[String], action: &str) -> String {
    if contacts.is_empty() {
        return "<p class=\"empty\">No one to message yet.</p>".to_owned();
    }
    contacts
        .iter()
        .map(|name| {
            include_res!(str, "/pages/contact-button.html")
                .replace("{action}", action)
                .replace("{name}", &res::escape(name))
        })
        .collect()
}

/// The conversation panel for `other`, or an empty string when no chat is
/// open.
async fn conversation_panel(backend: &Backend, token: &str, viewer: &str, other: Option<&str>) -> AppResult<String> {
    let Some(other) = other else {
        return Ok(String::new());
    };
    let history = messages::list(backend, token, viewer, other).await?;
    Ok(messages::conversation_html(viewer, other, &history))
}

/// The chat to reopen after `/send`, consumed so it only happens once.
async fn reopened_chat(session: &Session) -> AppResult<Option<String>> {
    Ok(session::take_sent_receiver(session).await?)
}
