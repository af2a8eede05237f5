use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    db::users::{self, NewUser},
    error::AppError,
    models::{
        session::Session,
        user::{User, UserRole},
    },
    state::AppState,
};

pub const SESSION_COOKIE: &str = "cycle_session";
const SESSION_TTL_DAYS: i64 = 14;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Self(Some(user.clone())));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };
        let user = resolve_session(state, cookie.value()).await?;
        if let Some(user) = &user {
            parts.extensions.insert(user.clone());
        }
        Ok(Self(user))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    pub fn require_admin(&self) -> Result<&AuthenticatedUser, AppError> {
        let user = self.require_user()?;
        if user.role == UserRole::Admin {
            Ok(user)
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.0.is_some()
    }
}

pub async fn register_user(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
    bio: Option<&str>,
) -> Result<AuthenticatedUser, AppError> {
    let email = email.trim().to_lowercase();
    let name = name.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::invalid("Please enter a valid email address"));
    }
    if name.is_empty() {
        return Err(AppError::invalid("Please enter a display name"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid(format!(
            "Passwords need at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let mut tx = state.db.begin().await?;
    if users::find_by_email(&mut tx, &email).await?.is_some() {
        return Err(AppError::invalid("Email already registered"));
    }
    let role = if state.config.admin_email.as_deref() == Some(email.as_str()) {
        UserRole::Admin
    } else {
        UserRole::User
    };
    let password_hash = hash_password(password)?;
    let user = users::insert(
        &mut tx,
        NewUser {
            email: &email,
            name,
            password_hash: &password_hash,
            bio: bio.map(str::trim).filter(|text| !text.is_empty()),
            role,
        },
    )
    .await?;
    tx.commit().await?;
    info!(user_id = user.id, role = %user.role, "account registered");
    Ok(user.into())
}

pub async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let email = email.trim().to_lowercase();
    let mut conn = state.db.acquire().await?;
    let Some(user) = users::find_by_email(&mut conn, &email).await? else {
        return Err(AppError::Unauthorized);
    };
    if !verify_password(password, &user.password_hash) {
        debug!(user_id = user.id, "password mismatch");
        return Err(AppError::Unauthorized);
    }
    Ok(user.into())
}

pub async fn create_session(state: &AppState, user_id: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let session_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO sessions (id, user_id, created_at, last_seen_at, expires_at) \
         VALUES (?1, ?2, ?3, ?3, ?4)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(now)
    .bind(now + Duration::days(SESSION_TTL_DAYS))
    .execute(&state.db)
    .await?;
    Ok(session_id)
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

async fn resolve_session(
    state: &AppState,
    session_id: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let now = Utc::now();
    let session = sqlx::query_as::<_, Session>(
        "SELECT id, user_id, created_at, last_seen_at, expires_at FROM sessions WHERE id = ?1",
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await?;
    let Some(session) = session else {
        return Ok(None);
    };
    if session.expires_at.is_some_and(|expires| expires <= now) {
        destroy_session(state, &session.id).await?;
        return Ok(None);
    }

    sqlx::query("UPDATE sessions SET last_seen_at = ?1 WHERE id = ?2")
        .bind(now)
        .bind(&session.id)
        .execute(&state.db)
        .await?;
    let mut conn = state.db.acquire().await?;
    let user = users::find(&mut conn, session.user_id).await?;
    Ok(user.map(AuthenticatedUser::from))
}

pub fn apply_session_cookie(jar: CookieJar, session_id: &str) -> CookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn anonymous_visitors_must_log_in() {
        let current = CurrentUser::default();
        assert!(matches!(current.require_user(), Err(AppError::Unauthorized)));
    }
}
