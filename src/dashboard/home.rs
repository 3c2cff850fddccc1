use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde_json::Value;
use tower_sessions::Session;

use super::{contact_buttons, conversation_panel, reopened_chat, ChatForm};
use crate::{
    baas::{paths, BaasError, Backend},
    form::filled,
    gate::Caller,
    include_res,
    profile::{flag, Profile, Role},
    res, session, AppResult, AppState,
};

/// Who a tutor or student may message: their assigned partner first, then
/// every admin tutor.
pub async fn contacts(backend: &Backend, token: &str, profile: &Profile) -> Result<Vec<String>, BaasError> {
    let tutors = backend.records.get(token, paths::TUTORS).await?;

    let mut admins: Vec<String> = tutors
        .as_ref()
        .and_then(Value::as_object)
        .map(|tutors| {
            tutors
                .iter()
                .filter(|(name, record)| flag(record, "admin") && **name != profile.name)
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default();
    admins.sort();

    let mut contacts: Vec<String> = profile.assignment.iter().cloned().collect();
    contacts.extend(admins.into_iter().filter(|a| Some(a) != profile.assignment.as_ref()));
    Ok(contacts)
}

async fn render(
    backend: &Backend,
    caller: &Caller,
    session: &Session,
    open: Option<&str>,
) -> AppResult<Response> {
    let Caller { token, profile } = caller;
    let contacts = contacts(backend, token, profile).await?;
    let conversation = conversation_panel(backend, token, &profile.name, open).await?;
    let assignment = match &profile.assignment {
        Some(partner) => res::escape(partner),
        None => "Not assigned yet".to_owned(),
    };
    let tools = match profile.role {
        Role::Tutor => include_res!(str, "/pages/tutor-tools.html"),
        Role::Student => "",
    };

    let flashes = session::take_flashes(session).await?;
    let body = include_res!(str, "/pages/dashboard.html")
        .replace("{name}", &res::escape(&profile.name))
        .replace("{role}", profile.role.label())
        .replace("{assignment}", &assignment)
        .replace("{tools}", tools)
        .replace("{contacts}", &contact_buttons(&contacts, "/home"))
        .replace("{conversation}", &conversation);
    Ok(res::page("Dashboard", &flashes, &body).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn dashboard(
    State(backend): State<Backend>,
    Extension(caller): Extension<Caller>,
    session: Session,
) -> AppResult<Response> {
    if caller.profile.is_admin {
        return Ok(Redirect::to("/admin").into_response());
    }
    let open = reopened_chat(&session).await?;
    render(&backend, &caller, &session, open.as_deref()).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn open_dashboard_chat(
    State(backend): State<Backend>,
    Extension(caller): Extension<Caller>,
    session: Session,
    Form(ChatForm { user }): Form<ChatForm>,
) -> AppResult<Response> {
    if caller.profile.is_admin {
        return Ok(Redirect::to("/admin").into_response());
    }
    let Some(user) = filled(&user).filter(|u| paths::is_valid_key(u)) else {
        session::flash(&session, "Please specify which user.").await?;
        return Ok(Redirect::to("/home").into_response());
    };
    render(&backend, &caller, &session, Some(user)).await
}
