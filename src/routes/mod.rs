pub mod admin;
pub mod forms;
pub mod public;
pub mod trips;
pub mod user;

use axum::Router;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{auth::CurrentUser, models::user::UserRole, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .merge(user::router())
        .nest("/trips", trips::router())
        .nest("/admin", admin::router())
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Layout data every page template carries.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub logged_in: bool,
    pub is_admin: bool,
    pub notice: String,
}

impl PageContext {
    pub fn new(current: &CurrentUser, notice: String) -> Self {
        Self {
            logged_in: current.is_logged_in(),
            is_admin: current
                .0
                .as_ref()
                .is_some_and(|user| user.role == UserRole::Admin),
            notice,
        }
    }

    pub fn has_notice(&self) -> bool {
        !self.notice.is_empty()
    }
}
