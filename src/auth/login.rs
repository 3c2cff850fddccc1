use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    baas::{BaasError, Backend},
    form::filled,
    include_res, res,
    session::{self, ID_TOKEN},
    AppResult, AppState,
};

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    email: Option<String>,
    password: Option<String>,
}

#[debug_handler]
pub(crate) async fn login_page(session: Session) -> AppResult<Response> {
    let flashes = session::take_flashes(&session).await?;
    Ok(res::page("Log In", &flashes, include_res!(str, "/pages/login.html")).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(backend): State<Backend>,
    session: Session,
    Form(LoginForm { email, password }): Form<LoginForm>,
) -> AppResult<Response> {
    let (Some(email), Some(password)) = (filled(&email), password.as_deref().filter(|p| !p.is_empty())) else {
        session::flash(&session, "Please provide an email/password.").await?;
        return Ok(Redirect::to("/login").into_response());
    };

    match backend.identity.sign_in(email, password).await {
        Ok(credentials) => {
            session.cycle_id().await?;
            session.insert(ID_TOKEN, credentials.id_token).await?;
            tracing::info!(local_id = %credentials.local_id, "signed in");
            Ok(Redirect::to("/home").into_response())
        }
        Err(BaasError::InvalidCredentials | BaasError::AccountNotFound) => {
            session::flash(&session, "Incorrect email or password. Please try again.").await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(err) => {
            tracing::error!(error = %err, "sign-in failed");
            session::flash(&session, "We could not reach the sign-in service. Please try again.").await?;
            Ok(Redirect::to("/login").into_response())
        }
    }
}
