use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use tower_sessions::Session;

use super::{contact_buttons, conversation_panel, reopened_chat, ChatForm};
use crate::{
    baas::{child_keys, paths, BaasError, Backend},
    form::filled,
    gate::Caller,
    include_res, res, session, AppResult, AppState,
};

/// Every tutor and student except `me`, sorted by name.
pub(crate) async fn chat_list(backend: &Backend, token: &str, me: &str) -> Result<Vec<String>, BaasError> {
    let mut users = child_keys(backend.records.get(token, paths::TUTORS).await?.as_ref());
    users.extend(child_keys(backend.records.get(token, paths::STUDENTS).await?.as_ref()));
    users.retain(|u| u != me);
    users.sort();
    users.dedup();
    Ok(users)
}

async fn render(backend: &Backend, caller: &Caller, session: &Session, open: Option<&str>) -> AppResult<Response> {
    let Caller { token, profile } = caller;
    let users = chat_list(backend, token, &profile.name).await?;
    let conversation = conversation_panel(backend, token, &profile.name, open).await?;

    let flashes = session::take_flashes(session).await?;
    let body = include_res!(str, "/pages/admin-dashboard.html")
        .replace("{name}", &res::escape(&profile.name))
        .replace("{contacts}", &contact_buttons(&users, "/admin"))
        .replace("{conversation}", &conversation);
    Ok(res::page("Admin Dashboard", &flashes, &body).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn admin_dashboard(
    State(backend): State<Backend>,
    Extension(caller): Extension<Caller>,
    session: Session,
) -> AppResult<Response> {
    if !caller.profile.is_admin {
        return Ok(Redirect::to("/home").into_response());
    }
    let open = reopened_chat(&session).await?;
    render(&backend, &caller, &session, open.as_deref()).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn open_admin_chat(
    State(backend): State<Backend>,
    Extension(caller): Extension<Caller>,
    session: Session,
    Form(ChatForm { user }): Form<ChatForm>,
) -> AppResult<Response> {
    if !caller.profile.is_admin {
        return Ok(Redirect::to("/home").into_response());
    }
    let Some(user) = filled(&user).filter(|u| paths::is_valid_key(u)) else {
        session::flash(&session, "Please specify which user.").await?;
        return Ok(Redirect::to("/admin").into_response());
    };
    render(&backend, &caller, &session, Some(user)).await
}
