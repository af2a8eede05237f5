use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::{
        participation::{Participant, Participation},
        trip::TripStatus,
    },
};

const PARTICIPATION_COLUMNS: &str = "id, user_id, trip_id, can_edit, joined_at";

pub async fn find(
    conn: &mut SqliteConnection,
    trip_id: i64,
    user_id: i64,
) -> Result<Option<Participation>, AppError> {
    let participation = sqlx::query_as::<_, Participation>(&format!(
        "SELECT {PARTICIPATION_COLUMNS} FROM participations WHERE trip_id = ?1 AND user_id = ?2"
    ))
    .bind(trip_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(participation)
}

pub async fn count(conn: &mut SqliteConnection, trip_id: i64) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participations WHERE trip_id = ?1")
        .bind(trip_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

pub async fn count_editors(conn: &mut SqliteConnection, trip_id: i64) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM participations WHERE trip_id = ?1 AND can_edit = 1",
    )
    .bind(trip_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

/// The creator's own membership, written together with the trip.
pub async fn insert_creator(
    conn: &mut SqliteConnection,
    trip_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Participation, AppError> {
    let participation = sqlx::query_as::<_, Participation>(&format!(
        "INSERT INTO participations (user_id, trip_id, can_edit, joined_at) VALUES (?1, ?2, 1, ?3) \
         RETURNING {PARTICIPATION_COLUMNS}"
    ))
    .bind(user_id)
    .bind(trip_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(participation)
}

/// Inserts a non-editor membership only if the trip is open and has room, as
/// one statement. `None` means one of those conditions no longer held, or the
/// user was already a member.
pub async fn insert_if_room(
    conn: &mut SqliteConnection,
    trip_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<Participation>, AppError> {
    let participation = sqlx::query_as::<_, Participation>(&format!(
        r#"INSERT INTO participations (user_id, trip_id, can_edit, joined_at)
           SELECT ?1, t.id, 0, ?3
           FROM trips t
           WHERE t.id = ?2
             AND t.status = ?4
             AND (SELECT COUNT(*) FROM participations p WHERE p.trip_id = t.id) < t.max_participants
           ON CONFLICT (trip_id, user_id) DO NOTHING
           RETURNING {PARTICIPATION_COLUMNS}"#
    ))
    .bind(user_id)
    .bind(trip_id)
    .bind(now)
    .bind(TripStatus::Open)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(participation)
}

/// Deletes a membership unless it belongs to the last editor of an active
/// trip. Returns whether a row was removed.
pub async fn delete_unless_sole_editor(
    conn: &mut SqliteConnection,
    participation_id: i64,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"DELETE FROM participations
           WHERE id = ?1
             AND (
               can_edit = 0
               OR (SELECT status FROM trips WHERE trips.id = participations.trip_id) IN (?2, ?3)
               OR (SELECT COUNT(*) FROM participations other
                   WHERE other.trip_id = participations.trip_id AND other.can_edit = 1) > 1
             )"#,
    )
    .bind(participation_id)
    .bind(TripStatus::Finalized)
    .bind(TripStatus::Cancelled)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Flips `can_edit` in place and returns the updated row.
pub async fn toggle_can_edit(
    conn: &mut SqliteConnection,
    participation_id: i64,
) -> Result<Participation, AppError> {
    let participation = sqlx::query_as::<_, Participation>(&format!(
        "UPDATE participations SET can_edit = NOT can_edit WHERE id = ?1 \
         RETURNING {PARTICIPATION_COLUMNS}"
    ))
    .bind(participation_id)
    .fetch_optional(&mut *conn)
    .await?;
    participation.ok_or(AppError::NotAParticipant)
}

pub async fn list_for_trip(
    conn: &mut SqliteConnection,
    trip_id: i64,
) -> Result<Vec<Participant>, AppError> {
    let participants = sqlx::query_as::<_, Participant>(
        r#"SELECT p.user_id, u.name, p.can_edit, p.joined_at
           FROM participations p
           INNER JOIN users u ON u.id = p.user_id
           WHERE p.trip_id = ?1
           ORDER BY p.joined_at ASC, p.id ASC"#,
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(participants)
}

pub async fn delete_for_trip(conn: &mut SqliteConnection, trip_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM participations WHERE trip_id = ?1")
        .bind(trip_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_for_user(conn: &mut SqliteConnection, user_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM participations WHERE user_id = ?1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
