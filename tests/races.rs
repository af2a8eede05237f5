use std::net::SocketAddr;

use chrono::{NaiveDate, Utc};
use cycle_together::{
    auth,
    config::AppConfig,
    db::{init_pool, migrate, participations},
    error::AppError,
    models::trip::{Difficulty, TripDates, TripDraft},
    services::storage::StorageService,
    state::AppState,
};
use tempfile::TempDir;

struct TestApp {
    state: AppState,
    _root: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let root = TempDir::new().expect("temp dir");
        let upload_dir = root.path().join("uploads");
        let config = AppConfig {
            database_url: format!("sqlite://{}", root.path().join("races.sqlite").display()),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            upload_dir: upload_dir.clone(),
            cookie_secret: "races-cookie-secret".into(),
            admin_email: None,
        };
        let db = init_pool(&config.database_url).await.expect("pool");
        migrate(&db).await.expect("migrations");
        Self {
            state: AppState::new(config, db, StorageService::new(upload_dir)),
            _root: root,
        }
    }

    async fn rider(&self, name: &str) -> i64 {
        let email = format!("{}@example.com", name.to_lowercase());
        auth::register_user(&self.state, name, &email, "pedal-power-42", None)
            .await
            .expect("register")
            .id
    }

    async fn trip(&self, creator_id: i64, room: i64) -> i64 {
        let draft = TripDraft {
            title: "Moselle".into(),
            description: "Wine and hills".into(),
            departure_location: "Trier".into(),
            destination: "Koblenz".into(),
            route_description: None,
            distance_km: 195.0,
            difficulty: Difficulty::Beginner,
            dates: TripDates {
                start_date_min: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                start_date_max: NaiveDate::from_ymd_opt(2026, 8, 5).unwrap(),
                duration_days_min: 3,
                duration_days_max: 4,
            },
            budget_per_person: 250.0,
            max_participants: room,
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

#[tokio::test]
async fn guarded_insert_refuses_a_full_trip() {
    let app = TestApp::new().await;
    let alice = app.rider("Alice").await;
    let bob = app.rider("Bob").await;
    let trip_id = app.trip(alice, 1).await;

    let mut conn = app.state.db.acquire().await.unwrap();
    let inserted = participations::insert_if_room(&mut conn, trip_id, bob, Utc::now())
        .await
        .unwrap();
    assert!(inserted.is_none());
    assert_eq!(participations::count(&mut conn, trip_id).await.unwrap(), 1);
}

#[tokio::test]
async fn guarded_delete_keeps_the_last_editor() {
    let app = TestApp::new().await;
    let alice = app.rider("Alice").await;
    let trip_id = app.trip(alice, 3).await;

    let mut conn = app.state.db.acquire().await.unwrap();
    let membership = participations::find(&mut conn, trip_id, alice)
        .await
        .unwrap()
        .unwrap();
    let removed = participations::delete_unless_sole_editor(&mut conn, membership.id)
        .await
        .unwrap();
    assert!(!removed);
    assert_eq!(participations::count_editors(&mut conn, trip_id).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_joins_share_the_last_seat() {
    let app = TestApp::new().await;
    let alice = app.rider("Alice").await;
    let bob = app.rider("Bob").await;
    let carol = app.rider("Carol").await;
    let trip_id = app.trip(alice, 2).await;

    let trips = &app.state.trips;
    let (bob_joins, carol_joins) =
        tokio::join!(trips.join(trip_id, bob), trips.join(trip_id, carol));

    let joined = [bob_joins.is_ok(), carol_joins.is_ok()];
    assert_eq!(joined.iter().filter(|ok| **ok).count(), 1, "{bob_joins:?} {carol_joins:?}");
    let capacity = trips.capacity(trip_id).await.unwrap();
    assert_eq!((capacity.count, capacity.max), (2, 2));
    for result in [bob_joins, carol_joins] {
        if let Err(err) = result {
            assert!(
                matches!(err, AppError::Full | AppError::Database(_)),
                "unexpected error {err:?}"
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_editors_cannot_both_walk_away() {
    let app = TestApp::new().await;
    let alice = app.rider("Alice").await;
    let bob = app.rider("Bob").await;
    let trip_id = app.trip(alice, 3).await;
    let trips = &app.state.trips;
    trips.join(trip_id, bob).await.unwrap();
    trips.toggle_permission(trip_id, alice, bob).await.unwrap();

    let (alice_leaves, bob_leaves) =
        tokio::join!(trips.leave(trip_id, alice), trips.leave(trip_id, bob));

    let left = [alice_leaves.is_ok(), bob_leaves.is_ok()];
    assert_eq!(left.iter().filter(|ok| **ok).count(), 1, "{alice_leaves:?} {bob_leaves:?}");
    let mut conn = app.state.db.acquire().await.unwrap();
    assert_eq!(participations::count_editors(&mut conn, trip_id).await.unwrap(), 1);
    for result in [alice_leaves, bob_leaves] {
        if let Err(err) = result {
            assert!(
                matches!(err, AppError::SoleEditor | AppError::Database(_)),
                "unexpected error {err:?}"
            );
        }
    }
}
