use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use cycle_together::{
    auth,
    config::AppConfig,
    db::{init_pool, migrate},
    models::trip::{Difficulty, TripDates, TripDraft},
    routes::create_router,
    services::storage::StorageService,
    state::AppState,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    state: AppState,
    _root: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let root = TempDir::new().expect("temp dir");
        let upload_dir = root.path().join("uploads");
        let config = AppConfig {
            database_url: format!("sqlite://{}", root.path().join("http.sqlite").display()),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            upload_dir: upload_dir.clone(),
            cookie_secret: "http-test-cookie-secret".into(),
            admin_email: None,
        };
        let db = init_pool(&config.database_url).await.expect("pool");
        migrate(&db).await.expect("migrations");
        let storage = StorageService::new(upload_dir);
        storage.ensure_structure().await.expect("uploads");
        Self {
            state: AppState::new(config, db, storage),
            _root: root,
        }
    }

    fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    async fn rider(&self, name: &str) -> (i64, String) {
        let email = format!("{}@example.com", name.to_lowercase());
        let user = auth::register_user(&self.state, name, &email, "pedal-power-42", None)
            .await
            .expect("register");
        let session = auth::create_session(&self.state, user.id)
            .await
            .expect("session");
        (user.id, format!("{}={session}", auth::SESSION_COOKIE))
    }

    async fn trip(&self, creator_id: i64) -> i64 {
        let draft = TripDraft {
            title: "Danube Ride".into(),
            description: "Along the river".into(),
            departure_location: "Passau".into(),
            destination: "Vienna".into(),
            route_description: None,
            distance_km: 320.0,
            difficulty: Difficulty::Intermediate,
            dates: TripDates {
                start_date_min: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                start_date_max: NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
                duration_days_min: 4,
                duration_days_max: 6,
            },
            budget_per_person: 300.0,
            max_participants: 3,
            image_url: None,
        };
        self.state
            .trips
            .create_trip(creator_id, draft)
            .await
            .expect("trip")
            .id
    }
}

async fn get(router: Router, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let response = router
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn participants_endpoint_reports_capacity() {
    let app = TestApp::new().await;
    let (alice, cookie) = app.rider("Alice").await;
    let trip_id = app.trip(alice).await;

    let (status, body) = get(
        app.router(),
        &format!("/trips/{trip_id}/participants"),
        Some(&cookie),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"count": 1, "max": 3}));

    let (status, body) = get(app.router(), "/trips/9999/participants", Some(&cookie)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotFound");
}

#[tokio::test]
async fn messages_endpoint_is_for_participants_only() {
    let app = TestApp::new().await;
    let (alice, alice_cookie) = app.rider("Alice").await;
    let (_, bob_cookie) = app.rider("Bob").await;
    let trip_id = app.trip(alice).await;
    app.state
        .trips
        .post_message(trip_id, alice, Some("Ride at dawn"))
        .await
        .unwrap();

    let uri = format!("/trips/{trip_id}/messages");
    let (status, body) = get(app.router(), &uri, Some(&alice_cookie)).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "Ride at dawn");
    assert_eq!(messages[0]["author_name"], "Alice");
    assert_eq!(messages[0]["author_id"], alice);

    let (status, body) = get(app.router(), &uri, Some(&bob_cookie)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NotAParticipant");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn pages_send_visitors_to_login() {
    let app = TestApp::new().await;
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn outsiders_are_bounced_from_trip_details() {
    let app = TestApp::new().await;
    let (alice, _) = app.rider("Alice").await;
    let (_, bob_cookie) = app.rider("Bob").await;
    let trip_id = app.trip(alice).await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri(format!("/trips/{trip_id}"))
                .header(header::COOKIE, bob_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/trips/browse");
    assert!(response.headers().contains_key(header::SET_COOKIE));
}
