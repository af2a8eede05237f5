use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

use crate::error::AppError;

/// Lifecycle of a trip proposal. `Finalized` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TripStatus {
    Open,
    ClosedToNew,
    Finalized,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Open => "open",
            TripStatus::ClosedToNew => "closed_to_new",
            TripStatus::Finalized => "finalized",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TripStatus::Open => "Open",
            TripStatus::ClosedToNew => "Closed to new participants",
            TripStatus::Finalized => "Finalized",
            TripStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Finalized | TripStatus::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Validates a move to `target`. Closing an already closed trip is a no-op
    /// move; nothing ever leaves a terminal state or goes back to `Open`.
    pub fn transition(self, target: TripStatus) -> Result<TripStatus, AppError> {
        if self.is_terminal() {
            return Err(AppError::Closed);
        }
        match target {
            TripStatus::ClosedToNew | TripStatus::Finalized | TripStatus::Cancelled => Ok(target),
            TripStatus::Open => Err(AppError::invalid("a trip cannot be reopened")),
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
        Difficulty::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|level| level.as_str() == raw)
            .ok_or_else(|| AppError::invalid(format!("unknown difficulty '{raw}'")))
    }
}

/// The trip attributes that editors can mark as final, one flag each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockableField {
    Departure,
    Destination,
    Dates,
    Route,
    Budget,
}

impl LockableField {
    pub const ALL: [LockableField; 5] = [
        LockableField::Departure,
        LockableField::Destination,
        LockableField::Dates,
        LockableField::Route,
        LockableField::Budget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LockableField::Departure => "departure",
            LockableField::Destination => "destination",
            LockableField::Dates => "dates",
            LockableField::Route => "route",
            LockableField::Budget => "budget",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LockableField::Departure => "Departure",
            LockableField::Destination => "Destination",
            LockableField::Dates => "Dates",
            LockableField::Route => "Route",
            LockableField::Budget => "Budget",
        }
    }

    pub fn is_locked(self, trip: &Trip) -> bool {
        match self {
            LockableField::Departure => trip.departure_final,
            LockableField::Destination => trip.destination_final,
            LockableField::Dates => trip.dates_final,
            LockableField::Route => trip.route_final,
            LockableField::Budget => trip.budget_final,
        }
    }

    fn flag_mut(self, trip: &mut Trip) -> &mut bool {
        match self {
            LockableField::Departure => &mut trip.departure_final,
            LockableField::Destination => &mut trip.destination_final,
            LockableField::Dates => &mut trip.dates_final,
            LockableField::Route => &mut trip.route_final,
            LockableField::Budget => &mut trip.budget_final,
        }
    }
}

impl fmt::Display for LockableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockableField {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        LockableField::ALL
            .into_iter()
            .find(|field| field.as_str() == raw)
            .ok_or_else(|| AppError::invalid(format!("'{raw}' is not a lockable field")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub departure_location: String,
    pub destination: String,
    pub route_description: Option<String>,
    pub distance_km: f64,
    pub difficulty: Difficulty,
    pub start_date_min: NaiveDate,
    pub start_date_max: NaiveDate,
    pub duration_days_min: i64,
    pub duration_days_max: i64,
    pub budget_per_person: f64,
    pub max_participants: i64,
    pub status: TripStatus,
    pub departure_final: bool,
    pub destination_final: bool,
    pub dates_final: bool,
    pub route_final: bool,
    pub budget_final: bool,
    pub created_at: DateTime<Utc>,
    pub creator_id: i64,
}

impl Trip {
    pub fn is_locked(&self, field: LockableField) -> bool {
        field.is_locked(self)
    }

    /// Marks `field` as final. There is no way to clear a flag again.
    pub fn lock(&mut self, field: LockableField) {
        *field.flag_mut(self) = true;
    }

    pub fn dates(&self) -> TripDates {
        TripDates {
            start_date_min: self.start_date_min,
            start_date_max: self.start_date_max,
            duration_days_min: self.duration_days_min,
            duration_days_max: self.duration_days_max,
        }
    }

    /// Applies an edit. Locked fields keep their value without raising an
    /// error; title, description, distance and difficulty are never locked.
    pub fn apply_edit(&mut self, edit: TripEdit) {
        if let Some(title) = edit.title {
            self.title = title;
        }
        if let Some(description) = edit.description {
            self.description = description;
        }
        if let Some(distance_km) = edit.distance_km {
            self.distance_km = distance_km;
        }
        if let Some(difficulty) = edit.difficulty {
            self.difficulty = difficulty;
        }

        if let Some(departure) = edit.departure_location {
            if !self.departure_final {
                self.departure_location = departure;
            }
        }
        if let Some(destination) = edit.destination {
            if !self.destination_final {
                self.destination = destination;
            }
        }
        if let Some(route) = edit.route_description {
            if !self.route_final {
                self.route_description = Some(route).filter(|text| !text.trim().is_empty());
            }
        }
        if let Some(dates) = edit.dates {
            if !self.dates_final {
                self.start_date_min = dates.start_date_min;
                self.start_date_max = dates.start_date_max;
                self.duration_days_min = dates.duration_days_min;
                self.duration_days_max = dates.duration_days_max;
            }
        }
        if let Some(budget) = edit.budget_per_person {
            if !self.budget_final {
                self.budget_per_person = budget;
            }
        }
    }
}

/// Start-date window and duration window; locked together as "dates".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripDates {
    pub start_date_min: NaiveDate,
    pub start_date_max: NaiveDate,
    pub duration_days_min: i64,
    pub duration_days_max: i64,
}

impl TripDates {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.start_date_min > self.start_date_max {
            return Err(AppError::invalid(
                "the earliest start date must not be after the latest start date",
            ));
        }
        if self.duration_days_min < 1 || self.duration_days_min > self.duration_days_max {
            return Err(AppError::invalid(
                "durations must be at least one day and min must not exceed max",
            ));
        }
        Ok(())
    }
}

/// A new trip proposal as submitted by its creator.
#[derive(Debug, Clone)]
pub struct TripDraft {
    pub title: String,
    pub description: String,
    pub departure_location: String,
    pub destination: String,
    pub route_description: Option<String>,
    pub distance_km: f64,
    pub difficulty: Difficulty,
    pub dates: TripDates,
    pub budget_per_person: f64,
    pub max_participants: i64,
    pub image_url: Option<String>,
}

impl TripDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::invalid("a trip needs a title"));
        }
        if self.max_participants < 1 {
            return Err(AppError::invalid("a trip needs room for at least one rider"));
        }
        if !self.distance_km.is_finite() || self.distance_km < 0.0 {
            return Err(AppError::invalid("distance must be a positive number"));
        }
        if !self.budget_per_person.is_finite() || self.budget_per_person < 0.0 {
            return Err(AppError::invalid("budget must be a positive number"));
        }
        self.dates.validate()
    }
}

/// Changes requested by an editor. `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct TripEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub distance_km: Option<f64>,
    pub difficulty: Option<Difficulty>,
    pub departure_location: Option<String>,
    pub destination: Option<String>,
    pub route_description: Option<String>,
    pub dates: Option<TripDates>,
    pub budget_per_person: Option<f64>,
}

impl TripEdit {
    /// Drops every requested change to a field that `trip` has marked final.
    pub fn skip_locked(mut self, trip: &Trip) -> Self {
        for field in LockableField::ALL.into_iter().filter(|f| trip.is_locked(*f)) {
            match field {
                LockableField::Departure => self.departure_location = None,
                LockableField::Destination => self.destination = None,
                LockableField::Dates => self.dates = None,
                LockableField::Route => self.route_description = None,
                LockableField::Budget => self.budget_per_person = None,
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(AppError::invalid("a trip needs a title"));
            }
        }
        if let Some(distance) = self.distance_km {
            if !distance.is_finite() || distance < 0.0 {
                return Err(AppError::invalid("distance must be a positive number"));
            }
        }
        if let Some(budget) = self.budget_per_person {
            if !budget.is_finite() || budget < 0.0 {
                return Err(AppError::invalid("budget must be a positive number"));
            }
        }
        match &self.dates {
            Some(dates) => dates.validate(),
            None => Ok(()),
        }
    }
}

/// Optional filters for the public trip listing; all combine with AND.
#[derive(Debug, Clone, Default)]
pub struct BrowseFilters {
    pub difficulty: Option<Difficulty>,
    pub max_distance: Option<f64>,
    pub min_budget: Option<f64>,
    pub max_budget: Option<f64>,
    /// Case-sensitive substring of title, description or destination.
    pub search: Option<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_trip() -> Trip {
        Trip {
            id: 1,
            title: "Danube Ride".into(),
            description: "Along the river".into(),
            image_url: None,
            departure_location: "Passau".into(),
            destination: "Vienna".into(),
            route_description: Some("EuroVelo 6".into()),
            distance_km: 320.0,
            difficulty: Difficulty::Intermediate,
            start_date_min: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            start_date_max: NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
            duration_days_min: 4,
            duration_days_max: 6,
            budget_per_person: 300.0,
            max_participants: 2,
            status: TripStatus::Open,
            departure_final: false,
            destination_final: false,
            dates_final: false,
            route_final: false,
            budget_final: false,
            created_at: Utc::now(),
            creator_id: 7,
        }
    }

    #[test]
    fn nothing_leaves_a_terminal_state() {
        for terminal in [TripStatus::Finalized, TripStatus::Cancelled] {
            for target in [
                TripStatus::ClosedToNew,
                TripStatus::Finalized,
                TripStatus::Cancelled,
            ] {
                assert!(matches!(terminal.transition(target), Err(AppError::Closed)));
            }
        }
    }

    #[test]
    fn closing_is_idempotent() {
        let closed = TripStatus::Open.transition(TripStatus::ClosedToNew).unwrap();
        assert_eq!(
            closed.transition(TripStatus::ClosedToNew).unwrap(),
            TripStatus::ClosedToNew
        );
        assert_eq!(
            closed.transition(TripStatus::Finalized).unwrap(),
            TripStatus::Finalized
        );
        assert!(TripStatus::ClosedToNew.transition(TripStatus::Open).is_err());
    }

    #[test]
    fn locked_fields_survive_edits() {
        for field in LockableField::ALL {
            let mut trip = sample_trip();
            let original = trip.clone();
            trip.lock(field);
            trip.apply_edit(TripEdit {
                title: Some("Renamed".into()),
                departure_location: Some("Ulm".into()),
                destination: Some("Budapest".into()),
                route_description: Some("Back roads".into()),
                dates: Some(TripDates {
                    start_date_min: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
                    start_date_max: NaiveDate::from_ymd_opt(2026, 7, 2).unwrap(),
                    duration_days_min: 1,
                    duration_days_max: 2,
                }),
                budget_per_person: Some(500.0),
                ..TripEdit::default()
            });

            assert_eq!(trip.title, "Renamed");
            assert!(trip.is_locked(field));
            let unchanged = match field {
                LockableField::Departure => {
                    trip.departure_location == original.departure_location
                }
                LockableField::Destination => trip.destination == original.destination,
                LockableField::Route => trip.route_description == original.route_description,
                LockableField::Dates => trip.dates() == original.dates(),
                LockableField::Budget => trip.budget_per_person == original.budget_per_person,
            };
            assert!(unchanged, "{field} changed while locked");
            let unlocked_changed = LockableField::ALL
                .into_iter()
                .filter(|other| *other != field)
                .all(|other| match other {
                    LockableField::Departure => trip.departure_location == "Ulm",
                    LockableField::Destination => trip.destination == "Budapest",
                    LockableField::Route => trip.route_description.as_deref() == Some("Back roads"),
                    LockableField::Dates => trip.duration_days_max == 2,
                    LockableField::Budget => trip.budget_per_person == 500.0,
                });
            assert!(unlocked_changed, "unlocked fields must update when {field} is locked");
        }
    }

    #[test]
    fn locked_fields_are_dropped_before_validation() {
        let mut trip = sample_trip();
        trip.lock(LockableField::Budget);
        trip.lock(LockableField::Dates);
        let edit = TripEdit {
            title: Some("X".into()),
            budget_per_person: Some(-5.0),
            dates: Some(TripDates {
                start_date_min: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                start_date_max: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                duration_days_min: 2,
                duration_days_max: 3,
            }),
            destination: Some("Budapest".into()),
            ..TripEdit::default()
        };
        assert!(edit.validate().is_err());

        let edit = edit.skip_locked(&trip);
        assert!(edit.budget_per_person.is_none());
        assert!(edit.dates.is_none());
        assert_eq!(edit.destination.as_deref(), Some("Budapest"));
        assert!(edit.validate().is_ok());
    }

    #[test]
    fn lockable_field_names_parse() {
        assert_eq!("budget".parse::<LockableField>().unwrap(), LockableField::Budget);
        assert!(matches!(
            "title".parse::<LockableField>(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn draft_validation_rejects_inverted_windows() {
        let trip = sample_trip();
        let mut dates = trip.dates();
        dates.start_date_min = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        assert!(dates.validate().is_err());

        let mut dates = trip.dates();
        dates.duration_days_min = 9;
        assert!(dates.validate().is_err());
        assert!(trip.dates().validate().is_ok());
    }
}
