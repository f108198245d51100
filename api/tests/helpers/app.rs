use std::sync::Arc;

use api::routes::routes;
use api::state::{AppOptions, AppState};
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use services::test_utils::{MockGateway, StubMailer};
use tower::ServiceExt;

pub const WEBHOOK_TOKEN: &str = "test-webhook-token";

pub struct TestApp {
    pub db: DatabaseConnection,
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    pub router: Router,
}

pub async fn make_test_app() -> TestApp {
    let db = db::test_utils::setup_test_db().await;
    let gateway = Arc::new(MockGateway::new());
    let mailer = Arc::new(StubMailer::new());

    let state = AppState::new(
        db.clone(),
        gateway.clone(),
        mailer,
        AppOptions {
            school_name: "SMP Harapan".into(),
            default_language: "id".into(),
            country_code: "62".into(),
            max_send_retries: 3,
            device_id: "device-1".into(),
            webhook_token: WEBHOOK_TOKEN.into(),
        },
    );

    let router = Router::new()
        .nest("/api", routes(state.clone()))
        .with_state(state.clone());

    TestApp {
        db,
        state,
        gateway,
        router,
    }
}

impl TestApp {
    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
