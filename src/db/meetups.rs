use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::SqliteConnection;

use crate::{error::AppError, models::meetup::Meetup};

const MEETUP_COLUMNS: &str =
    "id, title, location, meetup_datetime, description, created_at, trip_id, creator_id";

pub struct NewMeetup<'a> {
    pub trip_id: i64,
    pub creator_id: i64,
    pub title: &'a str,
    pub location: &'a str,
    pub scheduled_at: NaiveDateTime,
    pub description: Option<&'a str>,
}

pub async fn insert(
    conn: &mut SqliteConnection,
    meetup: NewMeetup<'_>,
    now: DateTime<Utc>,
) -> Result<Meetup, AppError> {
    let created = sqlx::query_as::<_, Meetup>(&format!(
        "INSERT INTO meetups (title, location, meetup_datetime, description, created_at, trip_id, creator_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING {MEETUP_COLUMNS}"
    ))
    .bind(meetup.title)
    .bind(meetup.location)
    .bind(meetup.scheduled_at)
    .bind(meetup.description)
    .bind(now)
    .bind(meetup.trip_id)
    .bind(meetup.creator_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(created)
}

/// Soonest first.
pub async fn list_for_trip(conn: &mut SqliteConnection, trip_id: i64) -> Result<Vec<Meetup>, AppError> {
    let meetups = sqlx::query_as::<_, Meetup>(&format!(
        "SELECT {MEETUP_COLUMNS} FROM meetups WHERE trip_id = ?1 ORDER BY meetup_datetime ASC, id ASC"
    ))
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(meetups)
}

pub async fn delete_for_trip(conn: &mut SqliteConnection, trip_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM meetups WHERE trip_id = ?1")
        .bind(trip_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_by_creator(conn: &mut SqliteConnection, creator_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM meetups WHERE creator_id = ?1")
        .bind(creator_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
