//! Tutor-student pairing: the admin reassignment page and student tutor
//! selection both end in [`assign`].

use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Form, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tower_sessions::Session;

use crate::{
    baas::{child_keys, paths, BaasError, Backend},
    form::filled,
    gate::Caller,
    include_res,
    profile::{assignment_of, Role},
    res, session, AppResult, AppState,
};

#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("no tutor named {0:?}")]
    UnknownTutor(String),
    #[error("no student named {0:?}")]
    UnknownStudent(String),
    #[error(transparent)]
    Store(#[from] BaasError),
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/change-assignments", get(change_assignments_page).post(change_assignments))
        .route("/tutor-selection", get(tutor_selection_page).post(select_tutor))
}

/// Pairs `tutor` with `student`. Both sides and any partner left pointing at
/// one of them are written in a single multi-path update.
pub async fn assign(backend: &Backend, token: &str, tutor: &str, student: &str) -> Result<(), AssignmentError> {
    if !paths::is_valid_key(tutor) {
        return Err(AssignmentError::UnknownTutor(tutor.to_owned()));
    }
    if !paths::is_valid_key(student) {
        return Err(AssignmentError::UnknownStudent(student.to_owned()));
    }

    let tutor_record = backend
        .records
        .get(token, &paths::tutor(tutor))
        .await?
        .ok_or_else(|| AssignmentError::UnknownTutor(tutor.to_owned()))?;
    let student_record = backend
        .records
        .get(token, &paths::student(student))
        .await?
        .ok_or_else(|| AssignmentError::UnknownStudent(student.to_owned()))?;

    let mut fields = Map::new();
    if let Some(previous) = assignment_of(&tutor_record, Role::Tutor).filter(|p| p != student) {
        fields.insert(format!("{}/{previous}/assignedTutor", paths::STUDENTS), Value::Null);
    }
    if let Some(previous) = assignment_of(&student_record, Role::Student).filter(|p| p != tutor) {
        fields.insert(format!("{}/{previous}/assignedStudent", paths::TUTORS), Value::Null);
    }
    fields.insert(format!("{}/{tutor}/assignedStudent", paths::TUTORS), Value::from(student));
    fields.insert(format!("{}/{student}/assignedTutor", paths::STUDENTS), Value::from(tutor));

    backend.records.update(token, "", Value::Object(fields)).await?;
    tracing::info!(%tutor, %student, "assignment updated");
    Ok(())
}

#[derive(Deserialize)]
pub(crate) struct AssignmentForm {
    tutor: Option<String>,
    student: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn change_assignments_page(
    State(backend): State<Backend>,
    Extension(Caller { token, profile }): Extension<Caller>,
    session: Session,
) -> AppResult<Response> {
    if !profile.is_admin {
        return Ok(Redirect::to("/home").into_response());
    }

    let tutors = child_keys(backend.records.get(&token, paths::TUTORS).await?.as_ref());
    let students = child_keys(backend.records.get(&token, paths::STUDENTS).await?.as_ref());

    let flashes = session::take_flashes(&session).await?;
    let body = include_res!(str, "/pages/reassignment.html")
        .replace("{tutors}", &res::options(&tutors))
        .replace("{students}", &res::options(&students));
    Ok(res::page("Change Assignments", &flashes, &body).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn change_assignments(
    State(backend): State<Backend>,
    Extension(Caller { token, profile }): Extension<Caller>,
    session: Session,
    Form(AssignmentForm { tutor, student }): Form<AssignmentForm>,
) -> AppResult<Response> {
    if !profile.is_admin {
        return Ok(Redirect::to("/home").into_response());
    }

    let (Some(tutor), Some(student)) = (filled(&tutor), filled(&student)) else {
        session::flash(&session, "Please specify which tutor and student you wish to re-assign.").await?;
        return Ok(Redirect::to("/change-assignments").into_response());
    };

    let message = match assign(&backend, &token, tutor, student).await {
        Ok(()) => format!("Assignments updated. Student {student} has been assigned to tutor {tutor}."),
        Err(err @ (AssignmentError::UnknownTutor(_) | AssignmentError::UnknownStudent(_))) => {
            tracing::warn!(error = %err, "reassignment rejected");
            "That tutor or student could not be found.".to_owned()
        }
        Err(err) => {
            tracing::error!(error = %err, "reassignment failed");
            "The assignment could not be saved. Please try again.".to_owned()
        }
    };
    session::flash(&session, message).await?;
    Ok(Redirect::to("/change-assignments").into_response())
}

/// A tutor offered to students choosing one.
#[derive(Debug, Clone, PartialEq)]
pub struct TutorOption {
    pub name: String,
    pub profile: String,
}

/// Tutors with no student yet, by name.
pub fn available_tutors(tutors: Option<&Value>) -> Vec<TutorOption> {
    let Some(tutors) = tutors.and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut options: Vec<TutorOption> = tutors
        .iter()
        .filter(|(_, record)| assignment_of(record, Role::Tutor).is_none())
        .map(|(name, record)| TutorOption {
            name: name.clone(),
            profile: record.get("profile").and_then(Value::as_str).unwrap_or_default().to_owned(),
        })
        .collect();
    options.sort_by(|a, b| a.name.cmp(&b.name));
    options
}

fn chooses_tutor(caller: &Caller) -> bool {
    caller.profile.role == Role::Student && caller.profile.assignment.is_none()
}

#[debug_handler(state = AppState)]
pub(crate) async fn tutor_selection_page(
    State(backend): State<Backend>,
    Extension(caller): Extension<Caller>,
    session: Session,
) -> AppResult<Response> {
    if !chooses_tutor(&caller) {
        return Ok(Redirect::to("/home").into_response());
    }

    let tutors = backend.records.get(&caller.token, paths::TUTORS).await?;
    let cards: String = available_tutors(tutors.as_ref())
        .iter()
        .map(|t| {
            include_res!(str, "/pages/tutor-card.html")
                .replace("{name}", &res::escape(&t.name))
                .replace("{profile}", &res::escape(&t.profile))
        })
        .collect();
    let cards = if cards.is_empty() {
        "<p class=\"empty\">No tutors are available right now. Please check back soon.</p>".to_owned()
    } else {
        cards
    };

    let flashes = session::take_flashes(&session).await?;
    let body = include_res!(str, "/pages/tutor-selection.html").replace("{tutors}", &cards);
    Ok(res::page("Choose Your Tutor", &flashes, &body).into_response())
}

#[derive(Deserialize)]
pub(crate) struct SelectionForm {
    tutor: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn select_tutor(
    State(backend): State<Backend>,
    Extension(caller): Extension<Caller>,
    session: Session,
    Form(SelectionForm { tutor }): Form<SelectionForm>,
) -> AppResult<Response> {
    if !chooses_tutor(&caller) {
        return Ok(Redirect::to("/home").into_response());
    }
    let Some(tutor) = filled(&tutor) else {
        session::flash(&session, "Please select a tutor.").await?;
        return Ok(Redirect::to("/tutor-selection").into_response());
    };

    let available = backend
        .records
        .get(&caller.token, &paths::tutor(tutor))
        .await?
        .is_some_and(|record| assignment_of(&record, Role::Tutor).is_none());
    if !available {
        session::flash(&session, "That tutor is no longer available. Please select another.").await?;
        return Ok(Redirect::to("/tutor-selection").into_response());
    }

    assign(&backend, &caller.token, tutor, &caller.profile.name).await?;
    Ok(Redirect::to("/home").into_response())
}
