use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    error::AppError,
    models::trip::{Trip, TripStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participation {
    pub id: i64,
    pub user_id: i64,
    pub trip_id: i64,
    pub can_edit: bool,
    pub joined_at: DateTime<Utc>,
}

/// A participation joined with the rider's display name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Participant {
    pub user_id: i64,
    pub name: String,
    pub can_edit: bool,
    pub joined_at: DateTime<Utc>,
}

/// Current head count against capacity, as served by the participants endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capacity {
    pub count: i64,
    pub max: i64,
}

/// Decides whether a user may join `trip` given their existing participation
/// and the current head count.
pub fn check_join(
    trip: &Trip,
    existing: Option<&Participation>,
    count: i64,
) -> Result<(), AppError> {
    if existing.is_some() {
        return Err(AppError::AlreadyJoined);
    }
    if trip.status != TripStatus::Open {
        return Err(AppError::NotOpen);
    }
    if count >= trip.max_participants {
        return Err(AppError::Full);
    }
    Ok(())
}

/// An editor of an active trip may only leave while another editor remains.
/// `editor_count` includes the departing participation.
pub fn check_leave(
    trip: &Trip,
    departing: &Participation,
    editor_count: i64,
) -> Result<(), AppError> {
    if departing.can_edit && trip.status.is_active() && editor_count == 1 {
        return Err(AppError::SoleEditor);
    }
    Ok(())
}

/// Only the creator manages edit rights, and never their own.
pub fn check_toggle(
    trip: &Trip,
    acting_user_id: i64,
    target: Option<&Participation>,
    target_user_id: i64,
) -> Result<(), AppError> {
    if trip.creator_id != acting_user_id {
        return Err(AppError::Forbidden);
    }
    if target.is_none() {
        return Err(AppError::NotAParticipant);
    }
    if target_user_id == trip.creator_id {
        return Err(AppError::CannotSelf);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::tests::sample_trip;

    fn participation(user_id: i64, can_edit: bool) -> Participation {
        Participation {
            id: user_id * 10,
            user_id,
            trip_id: 1,
            can_edit,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn join_requires_open_trip_with_room_and_no_membership() {
        let mut trip = sample_trip();
        assert!(check_join(&trip, None, 1).is_ok());
        assert!(matches!(check_join(&trip, None, 2), Err(AppError::Full)));

        let member = participation(3, false);
        assert!(matches!(
            check_join(&trip, Some(&member), 1),
            Err(AppError::AlreadyJoined)
        ));

        for status in [
            TripStatus::ClosedToNew,
            TripStatus::Finalized,
            TripStatus::Cancelled,
        ] {
            trip.status = status;
            assert!(matches!(check_join(&trip, None, 0), Err(AppError::NotOpen)));
        }
    }

    #[test]
    fn sole_editor_cannot_leave_an_active_trip() {
        let mut trip = sample_trip();
        let editor = participation(7, true);
        assert!(matches!(
            check_leave(&trip, &editor, 1),
            Err(AppError::SoleEditor)
        ));
        assert!(check_leave(&trip, &editor, 2).is_ok());
        assert!(check_leave(&trip, &participation(8, false), 1).is_ok());

        trip.status = TripStatus::ClosedToNew;
        assert!(check_leave(&trip, &editor, 1).is_err());
        trip.status = TripStatus::Finalized;
        assert!(check_leave(&trip, &editor, 1).is_ok());
        trip.status = TripStatus::Cancelled;
        assert!(check_leave(&trip, &editor, 1).is_ok());
    }

    #[test]
    fn only_the_creator_toggles_and_never_themselves() {
        let trip = sample_trip();
        let creator = participation(7, true);
        let rider = participation(8, false);

        assert!(check_toggle(&trip, 7, Some(&rider), 8).is_ok());
        assert!(matches!(
            check_toggle(&trip, 8, Some(&rider), 8),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            check_toggle(&trip, 7, None, 9),
            Err(AppError::NotAParticipant)
        ));
        assert!(matches!(
            check_toggle(&trip, 7, Some(&creator), 7),
            Err(AppError::CannotSelf)
        ));
    }
}
