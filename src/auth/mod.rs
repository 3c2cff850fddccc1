use axum::{routing::get, Router};

use crate::AppState;

mod login;
mod logout;
mod register;
mod reset;
mod verify;

pub use register::{format_us_phone, validate_student, validate_tutor, StudentForm, TutorForm, MIN_PASSWORD_LEN};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page).post(login::login))
        .route("/logout", get(logout::logout))
        .route("/register", get(register::register_page).post(register::register))
        .route(
            "/register-tutor",
            get(register::register_tutor_page).post(register::register_tutor),
        )
        .route(
            "/register-student",
            get(register::register_student_page).post(register::register_student),
        )
        .route("/reset", get(reset::reset_page).post(reset::reset))
}

/// Routes that only need a signed-in session.
pub fn verification_router() -> Router<AppState> {
    Router::new().route(
        "/email-verification",
        get(verify::verification_page).post(verify::resend_verification),
    )
}
