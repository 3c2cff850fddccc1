use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::{
    assignments::AssignmentError, baas::BaasError, config::ConfigError, include_res,
    profile::ProfileError, session, MissingField,
};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

/// Marks a response produced from an [`AppError`] so [`recover`] can turn it
/// into a flashed message instead of a bare 500.
#[derive(Clone, Debug)]
pub struct Failure;

pub const GENERIC_FAILURE: &str = "An unexpected error has occurred. Please try again. \
If this issue persists, please contact the team.";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        let mut response = (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(include_res!(str, "/pages/sorry.html")),
        )
            .into_response();
        response.extensions_mut().insert(Failure);
        response
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(anyhow::Error);
apperr_impl!(serde_json::Error);
apperr_impl!(std::io::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::extract::multipart::MultipartError);
apperr_impl!(BaasError);
apperr_impl!(ProfileError);
apperr_impl!(AssignmentError);
apperr_impl!(ConfigError);
apperr_impl!(MissingField);

/// Degrades handler failures to a flashed message plus a redirect to the
/// login page. A failure on the login page itself keeps the error page so
/// the browser never loops.
pub async fn recover(session: Session, request: Request, next: Next) -> Response {
    let on_login = request.uri().path() == "/login";
    let response = next.run(request).await;

    if response.extensions().get::<Failure>().is_none() || on_login {
        return response;
    }

    if let Err(err) = session::flash(&session, GENERIC_FAILURE).await {
        tracing::error!(error = %err, "could not flash failure message");
        return response;
    }
    Redirect::to("/login").into_response()
}
