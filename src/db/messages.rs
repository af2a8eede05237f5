use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::message::{ChatMessage, Message},
};

pub async fn insert(
    conn: &mut SqliteConnection,
    trip_id: i64,
    author_id: i64,
    text: &str,
    now: DateTime<Utc>,
) -> Result<Message, AppError> {
    let message = sqlx::query_as::<_, Message>(
        "INSERT INTO messages (text, created_at, author_id, trip_id) VALUES (?1, ?2, ?3, ?4) \
         RETURNING id, text, created_at, author_id, trip_id",
    )
    .bind(text)
    .bind(now)
    .bind(author_id)
    .bind(trip_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(message)
}

/// Newest first.
pub async fn list_for_trip(
    conn: &mut SqliteConnection,
    trip_id: i64,
) -> Result<Vec<ChatMessage>, AppError> {
    let messages = sqlx::query_as::<_, ChatMessage>(
        r#"SELECT m.id, m.text, m.created_at, m.author_id, u.name AS author_name
           FROM messages m
           INNER JOIN users u ON u.id = m.author_id
           WHERE m.trip_id = ?1
           ORDER BY m.created_at DESC, m.id DESC"#,
    )
    .bind(trip_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(messages)
}

pub async fn delete_for_trip(conn: &mut SqliteConnection, trip_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM messages WHERE trip_id = ?1")
        .bind(trip_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_by_author(conn: &mut SqliteConnection, author_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM messages WHERE author_id = ?1")
        .bind(author_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
