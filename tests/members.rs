#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Messaging, assignments and session logging for signed-in members.

mod common;

use axum::http::StatusCode;
use common::{body_text, location, TestApp};
use serde_json::json;

#[tokio::test]
async fn sent_message_reopens_the_conversation_once() {
    let mut app = TestApp::new();
    app.login_as_tutor("Abe Admin", true).await;
    app.login_as_student("Sam Roe").await;

    let page = body_text(app.get("/home").await).await;
    assert!(page.contains("value=\"Abe Admin\""));

    let response = app.post_form("/send", "receiver=Abe+Admin&message=**help**+with+fractions").await;
    assert_eq!(location(&response), "/home");

    let page = body_text(app.get("/home").await).await;
    assert!(page.contains("<strong>help</strong> with fractions"));
    assert!(page.contains("message mine"));

    let page = body_text(app.get("/home").await).await;
    assert!(!page.contains("with fractions"));

    let stored = app.mem.records.read("messages/Abe Admin - Sam Roe").await.unwrap();
    assert_eq!(stored.as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn both_sides_see_the_same_conversation() {
    let mut app = TestApp::new();
    app.login_as_tutor("Abe Admin", true).await;
    app.login_as_student("Sam Roe").await;
    app.post_form("/send", "receiver=Abe+Admin&message=first").await;

    app.login("abe.admin@example.com").await;
    assert_eq!(location(&app.get("/home").await), "/admin");
    let response = app.post_form("/admin", "user=Sam+Roe").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("first"));
    assert!(page.contains("message theirs"));

    app.post_form("/send", "receiver=Sam+Roe&message=second").await;
    let listed = app.mem.records.read("messages/Abe Admin - Sam Roe").await.unwrap();
    assert_eq!(listed.as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn send_rejects_missing_body_and_unknown_receiver() {
    let mut app = TestApp::new();
    app.login_as_student("Sam Roe").await;

    assert_eq!(location(&app.post_form("/send", "receiver=Nobody+Here&message=hi").await), "/home");
    assert_eq!(location(&app.post_form("/send", "receiver=Sam+Roe&message=+").await), "/home");

    assert!(app.mem.records.read("messages").await.is_none());
    let page = body_text(app.get("/home").await).await;
    assert!(page.contains("That user could not be found."));
    assert!(page.contains("Please provide the message to send."));
}

#[tokio::test]
async fn admin_reassigns_and_clears_the_old_partner() {
    let mut app = TestApp::new();
    app.login_as_tutor("Tia Tu", false).await;
    app.login_as_tutor("Ty Tan", false).await;
    app.login_as_student("Sam Roe").await;
    app.login_as_tutor("Abe Admin", true).await;

    let page = body_text(app.get("/change-assignments").await).await;
    assert!(page.contains("<option value=\"Sam Roe\">Sam Roe</option>"));

    app.post_form("/change-assignments", "tutor=Tia+Tu&student=Sam+Roe").await;
    let response = app.post_form("/change-assignments", "tutor=Ty+Tan&student=Sam+Roe").await;
    assert_eq!(location(&response), "/change-assignments");

    assert_eq!(app.mem.records.read("users/students/Sam Roe/assignedTutor").await, Some(json!("Ty Tan")));
    assert_eq!(app.mem.records.read("users/tutors/Ty Tan/assignedStudent").await, Some(json!("Sam Roe")));
    assert_eq!(app.mem.records.read("users/tutors/Tia Tu/assignedStudent").await, None);

    let page = body_text(app.get("/change-assignments").await).await;
    assert!(page.contains("Student Sam Roe has been assigned to tutor Ty Tan."));
}

#[tokio::test]
async fn non_admins_are_bounced_home() {
    let mut app = TestApp::new();
    app.login_as_student("Sam Roe").await;
    app.login_as_tutor("Tia Tu", false).await;

    assert_eq!(location(&app.get("/admin").await), "/home");
    assert_eq!(location(&app.get("/change-assignments").await), "/home");
    assert_eq!(location(&app.post_form("/change-assignments", "tutor=Tia+Tu&student=Sam+Roe").await), "/home");
    assert_eq!(app.mem.records.read("users/students/Sam Roe/assignedTutor").await, None);
}

#[tokio::test]
async fn student_picks_an_unassigned_tutor() {
    let mut app = TestApp::new();
    app.login_as_tutor("Tia Tu", false).await;
    app.login_as_tutor("Ty Tan", false).await;
    app.mem.records.write("users/tutors/Ty Tan/assignedStudent", json!("Sue Su")).await;
    app.login_as_student("Sam Roe").await;

    let page = body_text(app.get("/tutor-selection").await).await;
    assert!(page.contains("Choose Tia Tu"));
    assert!(!page.contains("Choose Ty Tan"));

    let response = app.post_form("/tutor-selection", "tutor=Ty+Tan").await;
    assert_eq!(location(&response), "/tutor-selection");
    assert_eq!(app.mem.records.read("users/students/Sam Roe/assignedTutor").await, None);

    let response = app.post_form("/tutor-selection", "tutor=Tia+Tu").await;
    assert_eq!(location(&response), "/home");
    assert_eq!(app.mem.records.read("users/tutors/Tia Tu/assignedStudent").await, Some(json!("Sam Roe")));

    assert_eq!(location(&app.get("/tutor-selection").await), "/home");
    assert!(body_text(app.get("/home").await).await.contains("value=\"Tia Tu\""));
}

#[tokio::test]
async fn tutor_records_a_session_with_screenshot() {
    let mut app = TestApp::new();
    app.login_as_student("Sam Roe").await;
    app.login_as_tutor("Tia Tu", false).await;

    let page = body_text(app.get("/record-session").await).await;
    assert!(page.contains("accept=\".png,.jpg,.jpeg,.heic\""));

    let fields = [("start", "15:00"), ("end", "16:00"), ("student", "Sam Roe"), ("subject", "Math"), ("topic", "Fractions")];
    let response = app.post_multipart("/record-session", &fields, ("proof.png", b"png-bytes")).await;
    assert_eq!(location(&response), "/home");

    let sessions = app.mem.records.read("sessions/Tia Tu - Sam Roe").await.unwrap();
    let (date, record) = sessions.as_object().unwrap().iter().next().unwrap();
    assert_eq!(record["subject"], "Math");
    assert_eq!(record["screenshot"], format!("screenshots/Tia Tu - Sam Roe/{date}"));

    let (content_type, bytes) = app.mem.objects.get(&format!("screenshots/Tia Tu - Sam Roe/{date}")).await.unwrap();
    assert_eq!(content_type, "image/png");
    assert_eq!(bytes, b"png-bytes");
    assert_eq!(std::fs::read_dir(&app.upload_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn disallowed_upload_writes_nothing() {
    let mut app = TestApp::new();
    app.login_as_student("Sam Roe").await;
    app.login_as_tutor("Tia Tu", false).await;

    let fields = [("start", "15:00"), ("end", "16:00"), ("student", "Sam Roe"), ("subject", "Math")];
    let response = app.post_multipart("/record-session", &fields, ("photo.exe", b"MZ")).await;
    assert_eq!(location(&response), "/record-session");

    assert!(app.mem.records.read("sessions").await.is_none());
    assert!(app.mem.objects.is_empty().await);
    assert!(body_text(app.get("/record-session").await).await.contains("File type not allowed."));
}

#[tokio::test]
async fn students_cannot_record_sessions() {
    let mut app = TestApp::new();
    app.login_as_student("Sam Roe").await;
    assert_eq!(location(&app.get("/record-session").await), "/home");
}
