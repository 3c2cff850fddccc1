use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    baas::{BaasError, Backend},
    form::filled,
    include_res, res, session, AppResult, AppState,
};

#[derive(Deserialize)]
pub(crate) struct ResetForm {
    email: Option<String>,
}

#[debug_handler]
pub(crate) async fn reset_page(session: Session) -> AppResult<Response> {
    let flashes = session::take_flashes(&session).await?;
    Ok(res::page("Reset Password", &flashes, include_res!(str, "/pages/reset.html")).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn reset(
    State(backend): State<Backend>,
    session: Session,
    Form(ResetForm { email }): Form<ResetForm>,
) -> AppResult<Response> {
    let Some(email) = filled(&email) else {
        session::flash(&session, "Please provide the email you made your account with.").await?;
        return Ok(Redirect::to("/reset").into_response());
    };

    match backend.identity.send_password_reset(email).await {
        Ok(()) => {
            session::flash(
                &session,
                format!("A link to reset your password was sent to {email}. Make sure to check your spam folder."),
            )
            .await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(BaasError::AccountNotFound) => {
            session::flash(
                &session,
                format!("Account with email {email} not found. Please provide the email you made your account with."),
            )
            .await?;
            Ok(Redirect::to("/reset").into_response())
        }
        Err(err) => {
            tracing::error!(error = %err, "password reset failed");
            session::flash(&session, "We could not send the reset email right now. Please try again.").await?;
            Ok(Redirect::to("/reset").into_response())
        }
    }
}
