mod helpers;

use axum::http::StatusCode;
use db::events::TriggerEvent;
use db::models::notification_log::{self, DeliveryStatus};
use db::models::parent_contact::ContactType;
use db::models::{class_group, class_session, student};
use sea_orm::EntityTrait;
use serde_json::json;
use services::contacts::ContactDirectory;
use services::gateway::GatewayError;

use helpers::app::{make_test_app, response_json, TestApp};

struct Seeded {
    session_id: i64,
    student_id: i64,
}

async fn seed(app: &TestApp) -> Seeded {
    let class = class_group::Model::create(&app.db, "7A", "Grade 7", "Mrs. Dewi")
        .await
        .unwrap();
    let student = student::Model::create(&app.db, class.id, "Budi Santoso")
        .await
        .unwrap();
    ContactDirectory::new(app.db.clone(), "62")
        .add_contact(student.id, ContactType::Mother, "Ibu Sari", "081111111111", None)
        .await
        .unwrap();
    let session = class_session::Model::create(
        &app.db,
        class.id,
        "Mathematics",
        "Mr. Agus",
        chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        15,
        28,
    )
    .await
    .unwrap();
    Seeded {
        session_id: session.id,
        student_id: student.id,
    }
}

#[tokio::test]
async fn failed_send_can_be_resent_through_the_api() {
    let app = make_test_app().await;
    let seeded = seed(&app).await;

    // First attempt fails, leaving a failed row behind.
    app.gateway
        .script(Err(GatewayError::Transport("timeout".into())));
    app.state
        .dispatcher()
        .dispatch(
            seeded.session_id,
            seeded.student_id,
            TriggerEvent::SessionStart,
            &std::collections::HashMap::new(),
        )
        .await
        .unwrap();

    let row = notification_log::Entity::find()
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, DeliveryStatus::Failed);

    let response = app
        .post_json(
            &format!("/api/notifications/logs/{}/resend", row.id),
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "sent");
    assert_eq!(body["data"]["retry_count"], 1);
}

#[tokio::test]
async fn resend_of_missing_log_is_not_found() {
    let app = make_test_app().await;

    let response = app
        .post_json("/api/notifications/logs/4242/resend", json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logs_can_be_filtered_by_session() {
    let app = make_test_app().await;
    let seeded = seed(&app).await;

    app.state
        .dispatcher()
        .dispatch(
            seeded.session_id,
            seeded.student_id,
            TriggerEvent::SessionStart,
            &std::collections::HashMap::new(),
        )
        .await
        .unwrap();

    let body = response_json(
        app.get(&format!(
            "/api/notifications/logs?session_id={}",
            seeded.session_id
        ))
        .await,
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["status"], "sent");

    let empty = response_json(app.get("/api/notifications/logs?session_id=9999").await).await;
    assert_eq!(empty["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn sweep_reports_counts() {
    let app = make_test_app().await;
    let seeded = seed(&app).await;

    app.gateway
        .script(Err(GatewayError::Transport("timeout".into())));
    app.state
        .dispatcher()
        .dispatch(
            seeded.session_id,
            seeded.student_id,
            TriggerEvent::SessionStart,
            &std::collections::HashMap::new(),
        )
        .await
        .unwrap();

    let body = response_json(app.post_json("/api/notifications/sweep", json!({})).await).await;
    assert_eq!(body["data"]["attempted"], 1);
    assert_eq!(body["data"]["recovered"], 1);
}
