use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::user::{User, UserRole},
};

const USER_COLUMNS: &str = "id, email, name, password_hash, bio, role, created_at";

pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a str,
    pub bio: Option<&'a str>,
    pub role: UserRole,
}

pub async fn insert(conn: &mut SqliteConnection, user: NewUser<'_>) -> Result<User, AppError> {
    let created = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, name, password_hash, bio, role, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {USER_COLUMNS}"
    ))
    .bind(user.email)
    .bind(user.name)
    .bind(user.password_hash)
    .bind(user.bio)
    .bind(user.role)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(created)
}

pub async fn find(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

pub async fn find_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, AppError> {
    let user =
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(user)
}

pub async fn update_profile(
    conn: &mut SqliteConnection,
    id: i64,
    name: &str,
    bio: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET name = ?1, bio = ?2 WHERE id = ?3")
        .bind(name)
        .bind(bio)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_role(conn: &mut SqliteConnection, id: i64, role: UserRole) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE users SET role = ?1 WHERE id = ?2")
        .bind(role)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(&mut *conn)
    .await?;
    Ok(users)
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Removes an account and everything hanging off it. The schema has no
/// `ON DELETE CASCADE`; the order below keeps every foreign key satisfied.
/// Run it inside a transaction.
pub async fn delete_account(conn: &mut SqliteConnection, user_id: i64) -> Result<bool, AppError> {
    sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    super::trips::delete_created_by(&mut *conn, user_id).await?;
    super::meetups::delete_by_creator(&mut *conn, user_id).await?;
    super::messages::delete_by_author(&mut *conn, user_id).await?;
    super::participations::delete_for_user(&mut *conn, user_id).await?;
    let result = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}
