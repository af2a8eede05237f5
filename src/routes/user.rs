use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::CurrentUser,
    db::users,
    error::AppError,
    flash,
    models::user::User,
    routes::PageContext,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/profile", get(profile))
        .route("/profile/edit", get(profile_edit_form).post(profile_edit_submit))
        .route("/user/:id", get(view_user))
}

#[derive(Clone)]
struct RecentTrip {
    id: i64,
    title: String,
    destination: String,
    status_label: &'static str,
}

#[derive(Clone)]
struct DifficultyRow {
    difficulty: &'static str,
    count: usize,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    page: PageContext,
    display_name: String,
    total_trips: usize,
    active_trips: usize,
    finalized_trips: usize,
    total_distance: String,
    created_trips: i64,
    difficulty_stats: Vec<DifficultyRow>,
    recent_trips: Vec<RecentTrip>,
}

async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let stats = state.trips.dashboard(user.id).await?;
    let (jar, notice) = flash::take(jar);
    let template = DashboardTemplate {
        page: PageContext::new(&current, notice),
        display_name: user.name.clone(),
        total_trips: stats.total_trips,
        active_trips: stats.active_trips,
        finalized_trips: stats.finalized_trips,
        total_distance: format!("{:.1}", stats.total_distance),
        created_trips: stats.created_trips,
        difficulty_stats: stats
            .difficulty_stats
            .iter()
            .map(|entry| DifficultyRow {
                difficulty: entry.difficulty.as_str(),
                count: entry.count,
            })
            .collect(),
        recent_trips: stats
            .recent_trips
            .iter()
            .map(|trip| RecentTrip {
                id: trip.id,
                title: trip.title.clone(),
                destination: trip.destination.clone(),
                status_label: trip.status.label(),
            })
            .collect(),
    };
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

#[derive(Template)]
#[template(path = "auth/profile.html")]
struct ProfileTemplate {
    page: PageContext,
    name: String,
    email: String,
    bio: String,
    member_since: String,
    is_own: bool,
    editing: bool,
}

impl ProfileTemplate {
    fn new(page: PageContext, user: User, is_own: bool, editing: bool) -> Self {
        Self {
            page,
            member_since: format_date(user.created_at),
            name: user.name,
            // Only the owner sees the email address.
            email: if is_own { user.email } else { String::new() },
            bio: user.bio.unwrap_or_default(),
            is_own,
            editing,
        }
    }
}

fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%B %Y").to_string()
}

async fn load_user(state: &AppState, id: i64) -> Result<User, AppError> {
    let mut conn = state.db.acquire().await?;
    users::find(&mut conn, id).await?.ok_or(AppError::NotFound)
}

async fn profile(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let record = load_user(&state, user.id).await?;
    let (jar, notice) = flash::take(jar);
    let template = ProfileTemplate::new(PageContext::new(&current, notice), record, true, false);
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

async fn profile_edit_form(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let record = load_user(&state, user.id).await?;
    let (jar, notice) = flash::take(jar);
    let template = ProfileTemplate::new(PageContext::new(&current, notice), record, true, true);
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

#[derive(Deserialize)]
struct ProfileForm {
    name: String,
    #[serde(default)]
    bio: String,
}

async fn profile_edit_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let name = form.name.trim();
    if name.is_empty() {
        return flash::recover(
            jar,
            AppError::invalid("Please enter a display name"),
            "/profile/edit",
        );
    }
    let bio = Some(form.bio.trim()).filter(|bio| !bio.is_empty());

    let mut conn = state.db.acquire().await?;
    users::update_profile(&mut conn, user.id, name, bio).await?;
    info!(user_id = user.id, "profile updated");
    Ok(flash::redirect(jar, "Profile updated successfully!", "/profile"))
}

async fn view_user(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    let viewer = current.require_user()?;
    let record = load_user(&state, user_id).await?;
    let is_own = record.id == viewer.id;
    let (jar, notice) = flash::take(jar);
    let template = ProfileTemplate::new(PageContext::new(&current, notice), record, is_own, false);
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}
