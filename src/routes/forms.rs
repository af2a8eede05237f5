//! Parsing of submitted trip forms into typed domain input. Every malformed
//! value surfaces as `AppError::InvalidInput` before anything is written.

use std::{collections::HashMap, str::FromStr};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_with::{serde_as, NoneAsEmptyString};

use crate::{
    error::AppError,
    models::trip::{BrowseFilters, Difficulty, LockableField, Trip, TripDates, TripDraft, TripEdit},
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_FIELDS: [&str; 4] = [
    "start_date_min",
    "start_date_max",
    "duration_days_min",
    "duration_days_max",
];

/// Raw name/value pairs of a trip form.
#[derive(Debug, Default, Clone)]
pub struct TripFields(HashMap<String, String>);

impl TripFields {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self(values)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// The trimmed value, or `None` when the field is absent or blank.
    fn value(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|raw| raw.trim())
            .filter(|value| !value.is_empty())
    }

    fn text(&self, name: &str) -> Option<String> {
        self.0.get(name).map(|raw| raw.trim().to_string())
    }

    fn required(&self, name: &str) -> Result<&str, AppError> {
        self.value(name)
            .ok_or_else(|| AppError::invalid(format!("{} is required", label(name))))
    }

    fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        self.value(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|_| AppError::invalid(format!("{} is not a valid value", label(name))))
            })
            .transpose()
    }

    fn parse_required<T: FromStr>(&self, name: &str) -> Result<T, AppError> {
        self.parse(name)?
            .ok_or_else(|| AppError::invalid(format!("{} is required", label(name))))
    }

    fn date(&self, name: &str) -> Result<Option<NaiveDate>, AppError> {
        self.value(name)
            .map(|raw| {
                NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
                    AppError::invalid(format!("{} must be a date like 2026-06-01", label(name)))
                })
            })
            .transpose()
    }

    fn difficulty(&self) -> Result<Option<Difficulty>, AppError> {
        self.value("difficulty").map(Difficulty::from_str).transpose()
    }

    /// All four date fields or none of them.
    fn dates(&self) -> Result<Option<TripDates>, AppError> {
        let present = DATE_FIELDS
            .iter()
            .filter(|name| self.value(name).is_some())
            .count();
        if present == 0 {
            return Ok(None);
        }
        if present < DATE_FIELDS.len() {
            return Err(AppError::invalid(
                "start dates and durations have to be given together",
            ));
        }
        Ok(Some(TripDates {
            start_date_min: self.date("start_date_min")?.unwrap_or_default(),
            start_date_max: self.date("start_date_max")?.unwrap_or_default(),
            duration_days_min: self.parse_required("duration_days_min")?,
            duration_days_max: self.parse_required("duration_days_max")?,
        }))
    }

    pub fn into_draft(self, image_url: Option<String>) -> Result<TripDraft, AppError> {
        let dates = self
            .dates()?
            .ok_or_else(|| AppError::invalid("start dates and durations are required"))?;
        Ok(TripDraft {
            title: self.required("title")?.to_string(),
            description: self.text("description").unwrap_or_default(),
            departure_location: self.required("departure_location")?.to_string(),
            destination: self.required("destination")?.to_string(),
            route_description: self.value("route_description").map(str::to_string),
            distance_km: self.parse_required("distance_km")?,
            difficulty: self
                .difficulty()?
                .ok_or_else(|| AppError::invalid("difficulty is required"))?,
            dates,
            budget_per_person: self.parse_required("budget_per_person")?,
            max_participants: self.parse_required("max_participants")?,
            image_url,
        })
    }

    /// Absent fields stay unchanged. Inputs for fields that `trip` has marked
    /// final are ignored without being parsed.
    pub fn into_edit(mut self, trip: &Trip) -> Result<TripEdit, AppError> {
        for field in LockableField::ALL.into_iter().filter(|f| trip.is_locked(*f)) {
            for name in input_names(field) {
                self.0.remove(*name);
            }
        }
        Ok(TripEdit {
            title: self.value("title").map(str::to_string),
            description: self.text("description"),
            distance_km: self.parse("distance_km")?,
            difficulty: self.difficulty()?,
            departure_location: self.value("departure_location").map(str::to_string),
            destination: self.value("destination").map(str::to_string),
            route_description: self.text("route_description"),
            dates: self.dates()?,
            budget_per_person: self.parse("budget_per_person")?,
        })
    }
}

fn input_names(field: LockableField) -> &'static [&'static str] {
    match field {
        LockableField::Departure => &["departure_location"],
        LockableField::Destination => &["destination"],
        LockableField::Dates => &DATE_FIELDS,
        LockableField::Route => &["route_description"],
        LockableField::Budget => &["budget_per_person"],
    }
}

fn label(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}

/// Query string of the browse page; empty inputs mean "no filter".
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub max_distance: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub min_budget: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub max_budget: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub search: Option<String>,
}

impl BrowseQuery {
    pub fn is_empty(&self) -> bool {
        self.difficulty.is_none()
            && self.max_distance.is_none()
            && self.min_budget.is_none()
            && self.max_budget.is_none()
            && self.search.is_none()
    }

    pub fn filters(&self) -> Result<BrowseFilters, AppError> {
        Ok(BrowseFilters {
            difficulty: self
                .difficulty
                .as_deref()
                .map(Difficulty::from_str)
                .transpose()?,
            max_distance: parse_number(self.max_distance.as_deref(), "maximum distance")?,
            min_budget: parse_number(self.min_budget.as_deref(), "minimum budget")?,
            max_budget: parse_number(self.max_budget.as_deref(), "maximum budget")?,
            search: self.search.clone(),
        })
    }
}

fn parse_number(raw: Option<&str>, what: &str) -> Result<Option<f64>, AppError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .ok_or_else(|| AppError::invalid(format!("the {what} must be a number")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::tests::sample_trip;

    fn full_form() -> TripFields {
        let mut fields = TripFields::default();
        for (name, value) in [
            ("title", "Coast to Coast"),
            ("description", "Two seas in a week"),
            ("departure_location", "Whitehaven"),
            ("destination", "Sunderland"),
            ("route_description", ""),
            ("distance_km", "225.5"),
            ("difficulty", "advanced"),
            ("start_date_min", "2026-06-01"),
            ("start_date_max", "2026-06-10"),
            ("duration_days_min", "3"),
            ("duration_days_max", "5"),
            ("budget_per_person", "420"),
            ("max_participants", "6"),
        ] {
            fields.insert(name, value);
        }
        fields
    }

    #[test]
    fn complete_form_becomes_a_draft() {
        let draft = full_form().into_draft(None).unwrap();
        assert_eq!(draft.title, "Coast to Coast");
        assert_eq!(draft.difficulty, Difficulty::Advanced);
        assert_eq!(draft.route_description, None);
        assert_eq!(draft.dates.duration_days_max, 5);
        assert_eq!(draft.max_participants, 6);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn malformed_values_are_invalid_input() {
        for (name, value) in [
            ("distance_km", "far"),
            ("difficulty", "legendary"),
            ("start_date_min", "01.06.2026"),
            ("max_participants", "six"),
        ] {
            let mut fields = full_form();
            fields.insert(name, value);
            assert!(
                matches!(fields.into_draft(None), Err(AppError::InvalidInput(_))),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn partial_edit_only_touches_given_fields() {
        let mut fields = TripFields::default();
        fields.insert("title", "X");
        fields.insert("budget_per_person", "500");
        let edit = fields.into_edit(&sample_trip()).unwrap();
        assert_eq!(edit.title.as_deref(), Some("X"));
        assert_eq!(edit.budget_per_person, Some(500.0));
        assert!(edit.destination.is_none());
        assert!(edit.dates.is_none());
    }

    #[test]
    fn date_fields_come_as_a_set() {
        let mut fields = TripFields::default();
        fields.insert("start_date_min", "2026-06-01");
        assert!(fields.into_edit(&sample_trip()).is_err());
    }

    #[test]
    fn locked_inputs_are_not_parsed() {
        let mut trip = sample_trip();
        trip.lock(LockableField::Budget);
        trip.lock(LockableField::Dates);

        let mut fields = TripFields::default();
        fields.insert("title", "X");
        fields.insert("budget_per_person", "n/a");
        fields.insert("start_date_min", "someday");
        fields.insert("destination", "Budapest");
        assert!(fields.clone().into_edit(&sample_trip()).is_err());

        let edit = fields.into_edit(&trip).unwrap();
        assert_eq!(edit.title.as_deref(), Some("X"));
        assert_eq!(edit.destination.as_deref(), Some("Budapest"));
        assert!(edit.budget_per_person.is_none());
        assert!(edit.dates.is_none());
    }

    #[test]
    fn browse_query_parses_filters() {
        let query = BrowseQuery {
            difficulty: Some("advanced".into()),
            max_distance: Some("100".into()),
            ..BrowseQuery::default()
        };
        let filters = query.filters().unwrap();
        assert_eq!(filters.difficulty, Some(Difficulty::Advanced));
        assert_eq!(filters.max_distance, Some(100.0));
        assert!(filters.min_budget.is_none());

        let bad = BrowseQuery {
            min_budget: Some("cheap".into()),
            ..BrowseQuery::default()
        };
        assert!(matches!(bad.filters(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn labels_are_readable() {
        assert_eq!(label("budget_per_person"), "Budget per person");
    }
}
