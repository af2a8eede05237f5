use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    error::AppError,
    models::trip::{BrowseFilters, Trip, TripDraft, TripStatus},
};

const TRIP_COLUMNS: &str = "id, title, description, image_url, departure_location, destination, \
    route_description, distance_km, difficulty, start_date_min, start_date_max, \
    duration_days_min, duration_days_max, budget_per_person, max_participants, status, \
    departure_final, destination_final, dates_final, route_final, budget_final, \
    created_at, creator_id";

pub async fn insert(
    conn: &mut SqliteConnection,
    creator_id: i64,
    draft: &TripDraft,
    now: DateTime<Utc>,
) -> Result<Trip, AppError> {
    let trip = sqlx::query_as::<_, Trip>(&format!(
        r#"INSERT INTO trips (
               title, description, image_url, departure_location, destination,
               route_description, distance_km, difficulty, start_date_min, start_date_max,
               duration_days_min, duration_days_max, budget_per_person, max_participants,
               status, created_at, creator_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
           RETURNING {TRIP_COLUMNS}"#
    ))
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(&draft.image_url)
    .bind(&draft.departure_location)
    .bind(&draft.destination)
    .bind(&draft.route_description)
    .bind(draft.distance_km)
    .bind(draft.difficulty)
    .bind(draft.dates.start_date_min)
    .bind(draft.dates.start_date_max)
    .bind(draft.dates.duration_days_min)
    .bind(draft.dates.duration_days_max)
    .bind(draft.budget_per_person)
    .bind(draft.max_participants)
    .bind(TripStatus::Open)
    .bind(now)
    .bind(creator_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(trip)
}

pub async fn find(conn: &mut SqliteConnection, id: i64) -> Result<Option<Trip>, AppError> {
    let trip = sqlx::query_as::<_, Trip>(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(trip)
}

/// Writes content fields and lock flags. Flags are OR-ed with the stored
/// value so a stale copy can never unlock a field.
pub async fn update_content(conn: &mut SqliteConnection, trip: &Trip) -> Result<Trip, AppError> {
    let updated = sqlx::query_as::<_, Trip>(&format!(
        r#"UPDATE trips SET
               title = ?1,
               description = ?2,
               departure_location = ?3,
               destination = ?4,
               route_description = ?5,
               distance_km = ?6,
               difficulty = ?7,
               start_date_min = ?8,
               start_date_max = ?9,
               duration_days_min = ?10,
               duration_days_max = ?11,
               budget_per_person = ?12,
               departure_final = (departure_final OR ?13),
               destination_final = (destination_final OR ?14),
               dates_final = (dates_final OR ?15),
               route_final = (route_final OR ?16),
               budget_final = (budget_final OR ?17)
           WHERE id = ?18
           RETURNING {TRIP_COLUMNS}"#
    ))
    .bind(&trip.title)
    .bind(&trip.description)
    .bind(&trip.departure_location)
    .bind(&trip.destination)
    .bind(&trip.route_description)
    .bind(trip.distance_km)
    .bind(trip.difficulty)
    .bind(trip.start_date_min)
    .bind(trip.start_date_max)
    .bind(trip.duration_days_min)
    .bind(trip.duration_days_max)
    .bind(trip.budget_per_person)
    .bind(trip.departure_final)
    .bind(trip.destination_final)
    .bind(trip.dates_final)
    .bind(trip.route_final)
    .bind(trip.budget_final)
    .bind(trip.id)
    .fetch_optional(&mut *conn)
    .await?;
    updated.ok_or(AppError::NotFound)
}

pub async fn set_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: TripStatus,
) -> Result<Trip, AppError> {
    let updated = sqlx::query_as::<_, Trip>(&format!(
        "UPDATE trips SET status = ?1 WHERE id = ?2 RETURNING {TRIP_COLUMNS}"
    ))
    .bind(status)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    updated.ok_or(AppError::NotFound)
}

/// Open trips matching every given filter, newest first.
pub async fn browse(conn: &mut SqliteConnection, filters: &BrowseFilters) -> Result<Vec<Trip>, AppError> {
    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {TRIP_COLUMNS} FROM trips WHERE status = "));
    query.push_bind(TripStatus::Open);

    if let Some(difficulty) = filters.difficulty {
        query.push(" AND difficulty = ").push_bind(difficulty);
    }
    if let Some(max_distance) = filters.max_distance {
        query.push(" AND distance_km <= ").push_bind(max_distance);
    }
    if let Some(min_budget) = filters.min_budget {
        query.push(" AND budget_per_person >= ").push_bind(min_budget);
    }
    if let Some(max_budget) = filters.max_budget {
        query.push(" AND budget_per_person <= ").push_bind(max_budget);
    }
    if let Some(term) = &filters.search {
        // instr() is case-sensitive, unlike LIKE.
        query
            .push(" AND (instr(title, ")
            .push_bind(term.clone())
            .push(") > 0 OR instr(description, ")
            .push_bind(term.clone())
            .push(") > 0 OR instr(destination, ")
            .push_bind(term.clone())
            .push(") > 0)");
    }
    query.push(" ORDER BY created_at DESC, id DESC");

    let trips = query.build_query_as::<Trip>().fetch_all(&mut *conn).await?;
    Ok(trips)
}

/// Trips the user participates in, most recently joined first.
pub async fn for_participant(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<Trip>, AppError> {
    let trips = sqlx::query_as::<_, Trip>(
        r#"SELECT t.*
           FROM trips t
           INNER JOIN participations p ON p.trip_id = t.id
           WHERE p.user_id = ?1
           ORDER BY p.joined_at DESC, p.id DESC"#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(trips)
}

pub async fn count_created_by(conn: &mut SqliteConnection, user_id: i64) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trips WHERE creator_id = ?1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

pub async fn count_all(conn: &mut SqliteConnection) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trips")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Deletes every trip created by `creator_id` together with its meetups,
/// messages and memberships.
pub async fn delete_created_by(conn: &mut SqliteConnection, creator_id: i64) -> Result<u64, AppError> {
    let trip_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM trips WHERE creator_id = ?1")
        .bind(creator_id)
        .fetch_all(&mut *conn)
        .await?;
    for trip_id in &trip_ids {
        super::meetups::delete_for_trip(&mut *conn, *trip_id).await?;
        super::messages::delete_for_trip(&mut *conn, *trip_id).await?;
        super::participations::delete_for_trip(&mut *conn, *trip_id).await?;
    }
    let result = sqlx::query("DELETE FROM trips WHERE creator_id = ?1")
        .bind(creator_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
