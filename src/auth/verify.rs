use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use tower_sessions::Session;

use crate::{baas::Backend, gate::Caller, include_res, profile::Role, res, session, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn verification_page(
    Extension(Caller { profile, .. }): Extension<Caller>,
    session: Session,
) -> AppResult<Response> {
    if profile.email_verified {
        let next = match profile.role {
            Role::Student if profile.assignment.is_none() => "/tutor-selection",
            _ => "/home",
        };
        return Ok(Redirect::to(next).into_response());
    }

    let flashes = session::take_flashes(&session).await?;
    let body = include_res!(str, "/pages/verification-page.html").replace("{email}", &res::escape(&profile.email));
    Ok(res::page("Verify Your Email", &flashes, &body).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn resend_verification(
    State(backend): State<Backend>,
    Extension(Caller { token, profile }): Extension<Caller>,
    session: Session,
) -> AppResult<Redirect> {
    match backend.identity.send_email_verification(&token).await {
        Ok(()) => {
            session::flash(&session, format!("A new verification email was sent to {}.", profile.email)).await?;
        }
        Err(err) => {
            tracing::error!(error = %err, "could not resend verification email");
            session::flash(&session, "We could not send the verification email right now. Please try again.").await?;
        }
    }
    Ok(Redirect::to("/email-verification"))
}
