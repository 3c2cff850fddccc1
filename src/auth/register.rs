use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use serde_json::Value;
use tower_sessions::Session;

use crate::{
    baas::{paths, BaasError, Backend, Credentials},
    form::{filled, FormFields},
    include_res,
    profile::{self, Demographics, StudentRecord, TutorRecord},
    res,
    session::{self, ID_TOKEN},
    AppResult, AppState, Config,
};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct TutorForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub chapter: String,
    pub profile: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentForm {
    pub name: String,
    pub parent_name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub zip_code: String,
    pub gender: String,
    pub grade: String,
    pub ethnicity: String,
    pub salary: String,
    pub circumstances: Vec<String>,
    pub password: String,
}

/// US numbers in national format, e.g. `(555) 123-4567`.
pub fn format_us_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.len() {
        11 if digits.starts_with('1') => &digits[1..],
        10 => &digits[..],
        _ => return None,
    };
    Some(format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]))
}

fn check_password(form: &FormFields) -> Result<String, &'static str> {
    let password = form.raw("password").unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 8 characters in length.");
    }
    if Some(password) != form.raw("confirmation") {
        return Err("Password and password confirmation must match.");
    }
    Ok(password.to_owned())
}

fn full_name(first: &str, last: &str) -> Result<String, &'static str> {
    let name = format!("{first} {last}");
    if !paths::is_valid_key(&name) {
        return Err("Names may not contain any of . # $ [ ] /");
    }
    Ok(name)
}

fn phone(form: &FormFields) -> Result<String, &'static str> {
    form.get("phone")
        .and_then(format_us_phone)
        .ok_or("Please provide a valid US phone number.")
}

pub fn validate_tutor(form: &FormFields, chapters: &[String]) -> Result<TutorForm, &'static str> {
    const REQUIRED: [&str; 8] = ["fname", "lname", "email", "phone", "chapter", "profile", "password", "confirmation"];
    if REQUIRED.iter().any(|f| form.get(f).is_none()) {
        return Err("Please provide all required information.");
    }

    let chapter = form.get("chapter").unwrap_or_default();
    if !chapters.iter().any(|c| c == chapter) {
        return Err("Invalid chapter.");
    }
    let password = check_password(form)?;

    Ok(TutorForm {
        name: full_name(form.get("fname").unwrap_or_default(), form.get("lname").unwrap_or_default())?,
        email: form.get("email").unwrap_or_default().to_owned(),
        phone: phone(form)?,
        chapter: chapter.to_owned(),
        profile: form.get("profile").unwrap_or_default().to_owned(),
        password,
    })
}

pub fn validate_student(form: &FormFields) -> Result<StudentForm, &'static str> {
    const REQUIRED: [&str; 14] = [
        "fname", "lname", "pfname", "plname", "email", "phone", "zipcode", "gender", "grade",
        "ethnicity", "subject", "salary", "password", "confirmation",
    ];
    if REQUIRED.iter().any(|f| form.get(f).is_none()) {
        return Err("Please provide all of the above information.");
    }
    let password = check_password(form)?;

    let field = |name: &str| form.get(name).unwrap_or_default().to_owned();
    Ok(StudentForm {
        name: full_name(&field("fname"), &field("lname"))?,
        parent_name: format!("{} {}", field("pfname"), field("plname")),
        email: field("email"),
        phone: phone(form)?,
        subject: field("subject"),
        zip_code: field("zipcode"),
        gender: field("gender"),
        grade: field("grade"),
        ethnicity: field("ethnicity"),
        salary: field("salary"),
        circumstances: form.all("circumstance"),
        password,
    })
}

#[derive(Deserialize)]
pub(crate) struct RegisterChoice {
    #[serde(rename = "registrationType")]
    registration_type: Option<String>,
}

#[debug_handler]
pub(crate) async fn register_page(session: Session) -> AppResult<Response> {
    let flashes = session::take_flashes(&session).await?;
    Ok(res::page("Register", &flashes, include_res!(str, "/pages/register.html")).into_response())
}

#[debug_handler]
pub(crate) async fn register(Form(RegisterChoice { registration_type }): Form<RegisterChoice>) -> Redirect {
    match filled(&registration_type) {
        Some("Register as a Student") => Redirect::to("/register-student"),
        Some("Register as a Tutor") => Redirect::to("/register-tutor"),
        _ => Redirect::to("/register"),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn register_tutor_page(
    State(config): State<std::sync::Arc<Config>>,
    session: Session,
) -> AppResult<Response> {
    let flashes = session::take_flashes(&session).await?;
    let body = include_res!(str, "/pages/register-tutor.html").replace("{chapters}", &res::options(&config.chapters));
    Ok(res::page("Tutor Registration", &flashes, &body).into_response())
}

#[debug_handler]
pub(crate) async fn register_student_page(session: Session) -> AppResult<Response> {
    let flashes = session::take_flashes(&session).await?;
    Ok(res::page("Student Registration", &flashes, include_res!(str, "/pages/register-student.html")).into_response())
}

/// Why opening an account stopped short.
enum Refused {
    Duplicate,
    NameTaken,
    Backend(BaasError),
}

/// Creates the identity account, names it and sends the verification email.
/// Refuses to continue when the display name already has a profile so an
/// existing record is never overwritten. A refusal after sign-up deletes the
/// new account again so the email stays free for a corrected retry.
async fn open_account(backend: &Backend, email: &str, password: &str, name: &str) -> Result<Credentials, Refused> {
    let credentials = backend.identity.sign_up(email, password).await.map_err(|err| match err {
        BaasError::EmailExists => Refused::Duplicate,
        err => Refused::Backend(err),
    })?;

    match claim_name(backend, &credentials, name).await {
        Ok(()) => Ok(credentials),
        Err(refused) => {
            discard_account(backend, &credentials).await;
            Err(refused)
        }
    }
}

async fn claim_name(backend: &Backend, credentials: &Credentials, name: &str) -> Result<(), Refused> {
    if profile::find_record(backend, &credentials.id_token, name)
        .await
        .map_err(Refused::Backend)?
        .is_some()
    {
        tracing::warn!(%name, local_id = %credentials.local_id, "display name already registered");
        return Err(Refused::NameTaken);
    }

    backend
        .identity
        .set_display_name(&credentials.id_token, name)
        .await
        .map_err(Refused::Backend)?;
    backend
        .identity
        .send_email_verification(&credentials.id_token)
        .await
        .map_err(Refused::Backend)
}

async fn discard_account(backend: &Backend, credentials: &Credentials) {
    if let Err(err) = backend.identity.delete_account(&credentials.id_token).await {
        tracing::error!(local_id = %credentials.local_id, error = %err, "could not delete refused account");
    }
}

async fn refuse(session: &Session, form_page: &'static str, refused: Refused) -> AppResult<Response> {
    let message = match refused {
        Refused::Duplicate => "User with that email already exists.",
        Refused::NameTaken => "A user with that name is already registered. Please contact the team.",
        Refused::Backend(err) => {
            tracing::error!(error = %err, "registration failed");
            "We could not create your account right now. Please try again."
        }
    };
    session::flash(session, message).await?;
    Ok(Redirect::to(form_page).into_response())
}

async fn finish(session: &Session, backend: &Backend, credentials: Credentials, path: String, record: Value) -> AppResult<Response> {
    if let Err(err) = backend.records.set(&credentials.id_token, &path, record).await {
        discard_account(backend, &credentials).await;
        return Err(err.into());
    }
    session.cycle_id().await?;
    session.insert(ID_TOKEN, credentials.id_token).await?;
    tracing::info!(%path, local_id = %credentials.local_id, "registered");
    Ok(Redirect::to("/email-verification").into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn register_tutor(
    State(backend): State<Backend>,
    State(config): State<std::sync::Arc<Config>>,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    const PAGE: &str = "/register-tutor";

    let tutor = match validate_tutor(&FormFields::from(pairs), &config.chapters) {
        Ok(tutor) => tutor,
        Err(message) => {
            tracing::warn!(reason = message, "tutor registration rejected");
            session::flash(&session, message).await?;
            return Ok(Redirect::to(PAGE).into_response());
        }
    };

    let credentials = match open_account(&backend, &tutor.email, &tutor.password, &tutor.name).await {
        Ok(credentials) => credentials,
        Err(refused) => return refuse(&session, PAGE, refused).await,
    };

    let record = TutorRecord {
        uuid: credentials.local_id.clone(),
        admin: false,
        email: tutor.email,
        phone_number: tutor.phone,
        account_type: "tutor",
        chapter: tutor.chapter,
        contract_signed: false,
        profile: tutor.profile,
    };
    finish(&session, &backend, credentials, paths::tutor(&tutor.name), serde_json::to_value(record)?).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn register_student(
    State(backend): State<Backend>,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    const PAGE: &str = "/register-student";

    let student = match validate_student(&FormFields::from(pairs)) {
        Ok(student) => student,
        Err(message) => {
            tracing::warn!(reason = message, "student registration rejected");
            session::flash(&session, message).await?;
            return Ok(Redirect::to(PAGE).into_response());
        }
    };

    let credentials = match open_account(&backend, &student.email, &student.password, &student.name).await {
        Ok(credentials) => credentials,
        Err(refused) => return refuse(&session, PAGE, refused).await,
    };

    let record = StudentRecord {
        id: credentials.local_id.clone(),
        email: student.email,
        parent_name: student.parent_name,
        phone_number: student.phone,
        account_type: "student",
        contract_signed: false,
        subject: student.subject,
        demographic_info: Demographics {
            zip_code: student.zip_code,
            gender: student.gender,
            grade: student.grade,
            ethnicity: student.ethnicity,
            salary: student.salary,
            family_circumstance: student.circumstances,
        },
    };
    finish(&session, &backend, credentials, paths::student(&student.name), serde_json::to_value(record)?).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tutor_fields(overrides: &[(&str, &str)]) -> FormFields {
        let mut pairs: Vec<(String, String)> = [
            ("fname", "Jane"),
            ("lname", "Doe"),
            ("email", "jane@example.com"),
            ("phone", "555-123-4567"),
            ("chapter", "Wheeler"),
            ("profile", "Math and physics."),
            ("password", "correct horse"),
            ("confirmation", "correct horse"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (key, value) in overrides {
            if let Some(pair) = pairs.iter_mut().find(|(k, _)| k == key) {
                pair.1 = value.to_string();
            }
        }
        pairs.into()
    }

    fn chapters() -> Vec<String> {
        vec!["Wheeler".to_owned()]
    }

    #[test]
    fn valid_tutor_form() {
        let tutor = validate_tutor(&tutor_fields(&[]), &chapters()).unwrap();
        assert_eq!(tutor.name, "Jane Doe");
        assert_eq!(tutor.phone, "(555) 123-4567");
    }

    #[test]
    fn short_password_rejected() {
        let form = tutor_fields(&[("password", "short"), ("confirmation", "short")]);
        assert_eq!(
            validate_tutor(&form, &chapters()),
            Err("Password must be at least 8 characters in length.")
        );
    }

    #[test]
    fn mismatched_confirmation_rejected() {
        let form = tutor_fields(&[("confirmation", "correct horsE")]);
        assert_eq!(
            validate_tutor(&form, &chapters()),
            Err("Password and password confirmation must match.")
        );
    }

    #[test]
    fn unknown_chapter_rejected() {
        let form = tutor_fields(&[("chapter", "Elsewhere")]);
        assert_eq!(validate_tutor(&form, &chapters()), Err("Invalid chapter."));
    }

    #[test]
    fn missing_field_reported_first() {
        let form = tutor_fields(&[("profile", ""), ("password", "x")]);
        assert_eq!(validate_tutor(&form, &chapters()), Err("Please provide all required information."));
    }

    #[test]
    fn reserved_characters_in_name_rejected() {
        let form = tutor_fields(&[("lname", "Doe.Jr")]);
        assert!(validate_tutor(&form, &chapters()).is_err());
    }

    #[test]
    fn student_circumstances_collected() {
        let pairs: Vec<(String, String)> = [
            ("fname", "Sam"), ("lname", "Roe"), ("pfname", "Pat"), ("plname", "Roe"),
            ("email", "sam@example.com"), ("phone", "+1 (555) 987-6543"), ("zipcode", "60187"),
            ("gender", "Male"), ("grade", "7"), ("ethnicity", "Prefer not to say"),
            ("subject", "Math"), ("salary", "Under $50k"),
            ("circumstance", "Single parent"), ("circumstance", "First generation"),
            ("password", "long enough"), ("confirmation", "long enough"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let student = validate_student(&pairs.into()).unwrap();
        assert_eq!(student.parent_name, "Pat Roe");
        assert_eq!(student.phone, "(555) 987-6543");
        assert_eq!(student.circumstances, vec!["Single parent", "First generation"]);
    }

    #[test]
    fn phone_formats() {
        assert_eq!(format_us_phone("5551234567").as_deref(), Some("(555) 123-4567"));
        assert_eq!(format_us_phone("1-555-123-4567").as_deref(), Some("(555) 123-4567"));
        assert_eq!(format_us_phone("12345"), None);
    }
}
