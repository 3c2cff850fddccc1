use axum::{debug_handler, response::{IntoResponse, Response}, routing::get, Router};
use tower_sessions::Session;

use crate::{include_res, res, session, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/the-team", get(the_team))
        .route("/parent-reviews", get(parent_reviews))
        .route("/resources", get(resources))
        .route("/contact", get(contact))
}

async fn public_page(session: &Session, title: &str, body: &str) -> AppResult<Response> {
    let flashes = session::take_flashes(session).await?;
    Ok(res::page(title, &flashes, body).into_response())
}

#[debug_handler]
async fn home(session: Session) -> AppResult<Response> {
    public_page(&session, "Welcome", include_res!(str, "/pages/public/home.html")).await
}

#[debug_handler]
async fn the_team(session: Session) -> AppResult<Response> {
    public_page(&session, "The Team", include_res!(str, "/pages/public/the-team.html")).await
}

#[debug_handler]
async fn parent_reviews(session: Session) -> AppResult<Response> {
    public_page(&session, "Parent Reviews", include_res!(str, "/pages/public/parent-reviews.html")).await
}

#[debug_handler]
async fn resources(session: Session) -> AppResult<Response> {
    public_page(&session, "Resources", include_res!(str, "/pages/public/resources.html")).await
}

#[debug_handler]
async fn contact(session: Session) -> AppResult<Response> {
    public_page(&session, "Contact", include_res!(str, "/pages/public/contact.html")).await
}
