pub mod appresult;
pub mod assignments;
pub mod auth;
pub mod baas;
pub mod config;
pub mod contract;
pub mod dashboard;
pub mod form;
pub mod gate;
pub mod index;
pub mod logbook;
pub mod messages;
pub mod profile;
pub mod res;
pub mod session;

use std::sync::Arc;

use axum::{extract::FromRef, middleware, Router};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult};
pub use baas::Backend;
pub use config::Config;
use gate::{GateChain, Guard};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub backend: Backend,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(backend: Backend, config: Config) -> Self {
        Self {
            backend,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("expected {field} in {json}")]
pub struct MissingField {
    pub field: String,
    pub json: String,
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> Result<String, MissingField>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> Result<String, MissingField> {
        self.get(field)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| MissingField {
                field: field.to_owned(),
                json: self.to_string(),
            })
    }
}

/// Builds the whole application: public pages, gated page groups, the
/// failure-recovery layer and the cookie session.
pub fn app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            state.config.session_minutes,
        )));

    let members = Router::new()
        .merge(dashboard::router())
        .merge(messages::router())
        .merge(logbook::router(&state.config))
        .merge(assignments::router())
        .route_layer(middleware::from_fn_with_state(
            Guard::new(&state, GateChain::MEMBER),
            gate::guard,
        ));

    let verified = contract::router().route_layer(middleware::from_fn_with_state(
        Guard::new(&state, GateChain::VERIFIED),
        gate::guard,
    ));

    let signed_in = auth::verification_router().route_layer(middleware::from_fn_with_state(
        Guard::new(&state, GateChain::SIGNED_IN),
        gate::guard,
    ));

    Router::new()
        .merge(index::router())
        .merge(auth::router())
        .merge(members)
        .merge(verified)
        .merge(signed_in)
        .layer(middleware::from_fn(appresult::recover))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
