use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meetup {
    pub id: i64,
    pub title: String,
    pub location: String,
    pub meetup_datetime: NaiveDateTime,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub trip_id: i64,
    pub creator_id: i64,
}

/// Raw meetup form values; date and time are only combined and checked by
/// [`MeetupInput::scheduled_at`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetupInput {
    pub title: String,
    pub location: String,
    pub meetup_date: String,
    pub meetup_time: String,
    pub description: Option<String>,
}

impl MeetupInput {
    pub fn scheduled_at(&self) -> Result<NaiveDateTime, AppError> {
        let combined = format!("{} {}", self.meetup_date.trim(), self.meetup_time.trim());
        NaiveDateTime::parse_from_str(&combined, "%Y-%m-%d %H:%M")
            .map_err(|err| AppError::invalid(format!("invalid meetup date or time: {err}")))
    }
}
