use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("please log in first")]
    Unauthorized,
    #[error("you don't have permission to do that")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("you are not a participant of this trip")]
    NotAParticipant,
    #[error("you are already a participant")]
    AlreadyJoined,
    #[error("this trip is not accepting new participants")]
    NotOpen,
    #[error("trip is full")]
    Full,
    #[error("you cannot leave - you are the only editor")]
    SoleEditor,
    #[error("cannot change your own permissions")]
    CannotSelf,
    #[error("{0}")]
    InvalidInput(String),
    #[error("this trip is finalized or cancelled")]
    Closed,
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    /// Stable name of the variant, used in JSON bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Other(_) => "Internal",
            AppError::Unauthorized => "Unauthenticated",
            AppError::Forbidden => "Forbidden",
            AppError::NotFound => "NotFound",
            AppError::NotAParticipant => "NotAParticipant",
            AppError::AlreadyJoined => "AlreadyJoined",
            AppError::NotOpen => "NotOpen",
            AppError::Full => "Full",
            AppError::SoleEditor => "SoleEditor",
            AppError::CannotSelf => "CannotSelf",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Closed => "Closed",
        }
    }

    /// Errors a form handler reports as a flash notice followed by a redirect.
    pub fn is_notice(&self) -> bool {
        matches!(
            self,
            AppError::Forbidden
                | AppError::NotAParticipant
                | AppError::AlreadyJoined
                | AppError::NotOpen
                | AppError::Full
                | AppError::SoleEditor
                | AppError::CannotSelf
                | AppError::InvalidInput(_)
                | AppError::Closed
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::NotAParticipant => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::AlreadyJoined
            | AppError::NotOpen
            | AppError::Full
            | AppError::SoleEditor
            | AppError::CannotSelf
            | AppError::Closed => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn public_message(&self) -> String {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = ?self, "request failed");
            "internal server error".into()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Unauthorized) {
            return Redirect::to("/login").into_response();
        }
        let status = self.status();
        (status, self.public_message()).into_response()
    }
}

/// Error wrapper for the JSON endpoints: `{"error": ..., "code": ...}`.
#[derive(Debug)]
pub struct JsonError(pub AppError);

impl From<AppError> for JsonError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let body = json!({
            "error": self.0.public_message(),
            "code": self.0.code(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_become_notices() {
        assert!(AppError::Full.is_notice());
        assert!(AppError::invalid("bad date").is_notice());
        assert!(!AppError::NotFound.is_notice());
        assert!(!AppError::Unauthorized.is_notice());
        assert!(!AppError::Config("x".into()).is_notice());
    }

    #[test]
    fn unauthenticated_requests_are_sent_to_login() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/login");
    }

    #[test]
    fn json_errors_keep_the_status() {
        let response = JsonError(AppError::NotAParticipant).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
