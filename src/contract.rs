use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Form, Router,
};
use serde::Deserialize;
use time::{macros::format_description, OffsetDateTime};
use tower_sessions::Session;

use crate::{
    baas::Backend,
    form::filled,
    gate::Caller,
    include_res,
    profile::{ContractInfo, Role},
    res, session, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/contract", get(contract_page).post(sign_contract))
}

#[derive(Deserialize)]
pub(crate) struct SignatureForm {
    #[serde(rename = "eSig")]
    e_sig: Option<String>,
    #[serde(rename = "pictureUse")]
    picture_use: Option<String>,
    #[serde(rename = "pictureSig")]
    picture_sig: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn contract_page(
    Extension(Caller { profile, .. }): Extension<Caller>,
    session: Session,
) -> AppResult<Response> {
    if profile.contract_signed {
        let next = match profile.role {
            Role::Student if profile.assignment.is_none() => "/tutor-selection",
            _ => "/home",
        };
        return Ok(Redirect::to(next).into_response());
    }

    let flashes = session::take_flashes(&session).await?;
    let body = match profile.role {
        Role::Tutor => include_res!(str, "/pages/tutor-contract.html"),
        Role::Student => include_res!(str, "/pages/student-contract.html"),
    };
    Ok(res::page("Contract", &flashes, body).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn sign_contract(
    State(backend): State<Backend>,
    Extension(Caller { token, profile }): Extension<Caller>,
    session: Session,
    Form(SignatureForm { e_sig, picture_use, picture_sig }): Form<SignatureForm>,
) -> AppResult<Response> {
    let (Some(e_sig), Some(picture_sig)) = (filled(&e_sig), filled(&picture_sig)) else {
        session::flash(&session, "Please fill out all items on the contract.").await?;
        return Ok(Redirect::to("/contract").into_response());
    };

    let info = ContractInfo {
        e_sig: e_sig.to_owned(),
        picture_use: filled(&picture_use) == Some("Yes"),
        picture_sig: picture_sig.to_owned(),
        date: OffsetDateTime::now_utc()
            .date()
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(anyhow::Error::from)?,
    };

    backend
        .records
        .update(
            &token,
            &profile.role.record_path(&profile.name),
            serde_json::json!({ "contractSigned": true, "contractInfo": info }),
        )
        .await?;
    tracing::info!(name = %profile.name, role = profile.role.label(), "contract signed");

    Ok(Redirect::to("/contract").into_response())
}
