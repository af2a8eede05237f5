use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    auth::CurrentUser,
    db::{trips, users},
    error::AppError,
    flash,
    models::user::{User, UserRole},
    routes::PageContext,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/users", get(users_list))
        .route("/users/:id", post(update_user_role))
        .route("/users/:id/delete", post(delete_user))
}

#[derive(Clone)]
struct AdminUserRow {
    id: i64,
    name: String,
    email: String,
    role: &'static str,
    is_admin: bool,
    created_at: String,
}

impl From<User> for AdminUserRow {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.role.as_str(),
            is_admin: user.role == UserRole::Admin,
            created_at: format_timestamp(user.created_at),
            name: user.name,
            email: user.email,
        }
    }
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
struct AdminDashboardTemplate {
    page: PageContext,
    user_count: i64,
    trip_count: i64,
    recent_users: Vec<AdminUserRow>,
}

async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    current.require_admin()?;
    let mut conn = state.db.acquire().await?;
    let user_count = users::count(&mut conn).await?;
    let trip_count = trips::count_all(&mut conn).await?;
    let mut recent = users::list(&mut conn).await?;
    recent.truncate(5);

    let (jar, notice) = flash::take(jar);
    let template = AdminDashboardTemplate {
        page: PageContext::new(&current, notice),
        user_count,
        trip_count,
        recent_users: recent.into_iter().map(AdminUserRow::from).collect(),
    };
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

#[derive(Template)]
#[template(path = "admin/users_list.html")]
struct AdminUsersTemplate {
    page: PageContext,
    users: Vec<AdminUserRow>,
    current_user_id: i64,
}

async fn users_list(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let admin = current.require_admin()?;
    let mut conn = state.db.acquire().await?;
    let rows = users::list(&mut conn).await?;
    let (jar, notice) = flash::take(jar);
    let template = AdminUsersTemplate {
        page: PageContext::new(&current, notice),
        users: rows.into_iter().map(AdminUserRow::from).collect(),
        current_user_id: admin.id,
    };
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

#[derive(Deserialize)]
struct RoleForm {
    role: String,
}

async fn update_user_role(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(user_id): Path<i64>,
    Form(form): Form<RoleForm>,
) -> Result<Response, AppError> {
    let admin = current.require_admin()?;
    let role = match form.role.parse::<UserRole>() {
        Ok(role) => role,
        Err(err) => return flash::recover(jar, err, "/admin/users"),
    };
    let mut conn = state.db.acquire().await?;
    if !users::set_role(&mut conn, user_id, role).await? {
        return Err(AppError::NotFound);
    }
    info!(admin_id = admin.id, user_id, role = %role, "role updated");
    Ok(flash::redirect(jar, "Role updated", "/admin/users"))
}

async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    let admin = current.require_admin()?;
    if admin.id == user_id {
        return flash::recover(jar, AppError::CannotSelf, "/admin/users");
    }

    let mut tx = state.db.begin().await?;
    if !users::delete_account(&mut tx, user_id).await? {
        warn!(admin_id = admin.id, user_id, "delete requested for unknown user");
        return Err(AppError::NotFound);
    }
    tx.commit().await?;
    info!(admin_id = admin.id, user_id, "account deleted");
    Ok(flash::redirect(jar, "User deleted", "/admin/users"))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%d.%m.%Y %H:%M")
        .to_string()
}
