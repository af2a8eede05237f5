use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::{
    db::{meetups, messages, participations, trips, DbPool},
    error::AppError,
    models::{
        meetup::{Meetup, MeetupInput},
        message::{ChatMessage, Message, MessageJson, MessageList},
        participation::{self, Capacity, Participant, Participation},
        trip::{BrowseFilters, Difficulty, LockableField, Trip, TripDraft, TripEdit, TripStatus},
    },
};

/// Trip lifecycle, membership, locking, chat and meetups. Every operation
/// takes the acting user's id and runs in its own transaction.
#[derive(Clone)]
pub struct TripService {
    db: DbPool,
}

/// Everything the detail page shows to a participant.
#[derive(Debug, Clone)]
pub struct TripDetail {
    pub trip: Trip,
    pub viewer: Participation,
    pub participants: Vec<Participant>,
    pub messages: Vec<ChatMessage>,
    pub meetups: Vec<Meetup>,
}

impl TripService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create_trip(&self, creator_id: i64, draft: TripDraft) -> Result<Trip, AppError> {
        draft.validate()?;
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let trip = trips::insert(&mut *tx, creator_id, &draft, now).await?;
        participations::insert_creator(&mut *tx, trip.id, creator_id, now).await?;
        tx.commit().await?;
        info!(trip_id = trip.id, creator_id, "trip proposed");
        Ok(trip)
    }

    pub async fn trip(&self, trip_id: i64) -> Result<Trip, AppError> {
        let mut conn = self.db.acquire().await?;
        load_trip(&mut conn, trip_id).await
    }

    pub async fn participation(
        &self,
        trip_id: i64,
        user_id: i64,
    ) -> Result<Option<Participation>, AppError> {
        let mut conn = self.db.acquire().await?;
        participations::find(&mut conn, trip_id, user_id).await
    }

    pub async fn can_edit(&self, trip_id: i64, user_id: i64) -> Result<bool, AppError> {
        Ok(self
            .participation(trip_id, user_id)
            .await?
            .is_some_and(|membership| membership.can_edit))
    }

    pub async fn join(&self, trip_id: i64, user_id: i64) -> Result<Participation, AppError> {
        let mut tx = self.db.begin().await?;
        let trip = load_trip(&mut tx, trip_id).await?;
        let existing = participations::find(&mut tx, trip_id, user_id).await?;
        let count = participations::count(&mut tx, trip_id).await?;
        participation::check_join(&trip, existing.as_ref(), count)?;

        let Some(joined) =
            participations::insert_if_room(&mut tx, trip_id, user_id, Utc::now()).await?
        else {
            // Someone else took the last seat or changed the status meanwhile.
            warn!(trip_id, user_id, "join lost a race for the trip");
            return Err(AppError::Full);
        };
        tx.commit().await?;
        info!(trip_id, user_id, "rider joined trip");
        Ok(joined)
    }

    pub async fn leave(&self, trip_id: i64, user_id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;
        let trip = load_trip(&mut tx, trip_id).await?;
        let departing = participations::find(&mut tx, trip_id, user_id)
            .await?
            .ok_or(AppError::NotAParticipant)?;
        let editors = participations::count_editors(&mut tx, trip_id).await?;
        participation::check_leave(&trip, &departing, editors)?;

        if !participations::delete_unless_sole_editor(&mut tx, departing.id).await? {
            return Err(AppError::SoleEditor);
        }
        tx.commit().await?;
        info!(trip_id, user_id, "rider left trip");
        Ok(())
    }

    pub async fn toggle_permission(
        &self,
        trip_id: i64,
        acting_user_id: i64,
        target_user_id: i64,
    ) -> Result<Participation, AppError> {
        let mut tx = self.db.begin().await?;
        let trip = load_trip(&mut tx, trip_id).await?;
        let target = participations::find(&mut tx, trip_id, target_user_id).await?;
        participation::check_toggle(&trip, acting_user_id, target.as_ref(), target_user_id)?;
        let Some(target) = target else {
            return Err(AppError::NotAParticipant);
        };

        let updated = participations::toggle_can_edit(&mut tx, target.id).await?;
        tx.commit().await?;
        info!(
            trip_id,
            target_user_id,
            can_edit = updated.can_edit,
            "edit permission toggled"
        );
        Ok(updated)
    }

    pub async fn lock_field(
        &self,
        trip_id: i64,
        user_id: i64,
        field: LockableField,
    ) -> Result<Trip, AppError> {
        let mut tx = self.db.begin().await?;
        let mut trip = load_editable(&mut tx, trip_id, user_id).await?;
        trip.lock(field);
        let trip = trips::update_content(&mut tx, &trip).await?;
        tx.commit().await?;
        info!(trip_id, user_id, field = field.as_str(), "field marked final");
        Ok(trip)
    }

    pub async fn edit_trip(
        &self,
        trip_id: i64,
        user_id: i64,
        edit: TripEdit,
    ) -> Result<Trip, AppError> {
        let mut tx = self.db.begin().await?;
        let mut trip = load_editable(&mut tx, trip_id, user_id).await?;
        let edit = edit.skip_locked(&trip);
        edit.validate()?;
        let skipped = LockableField::ALL
            .into_iter()
            .filter(|field| trip.is_locked(*field))
            .map(|field| field.as_str())
            .collect::<Vec<_>>();
        trip.apply_edit(edit);
        let trip = trips::update_content(&mut tx, &trip).await?;
        tx.commit().await?;
        debug!(trip_id, user_id, locked = ?skipped, "trip edited");
        Ok(trip)
    }

    pub async fn close(&self, trip_id: i64, user_id: i64) -> Result<Trip, AppError> {
        self.transition(trip_id, user_id, TripStatus::ClosedToNew).await
    }

    pub async fn finalize(&self, trip_id: i64, user_id: i64) -> Result<Trip, AppError> {
        self.transition(trip_id, user_id, TripStatus::Finalized).await
    }

    pub async fn cancel(&self, trip_id: i64, user_id: i64) -> Result<Trip, AppError> {
        self.transition(trip_id, user_id, TripStatus::Cancelled).await
    }

    async fn transition(
        &self,
        trip_id: i64,
        user_id: i64,
        target: TripStatus,
    ) -> Result<Trip, AppError> {
        let mut tx = self.db.begin().await?;
        let trip = load_editable(&mut tx, trip_id, user_id).await?;
        let next = trip.status.transition(target)?;
        let trip = trips::set_status(&mut tx, trip_id, next).await?;
        tx.commit().await?;
        info!(trip_id, user_id, status = next.as_str(), "trip status changed");
        Ok(trip)
    }

    /// Posts to the trip chat. Text is stored as written; blank text is
    /// ignored and yields `None`.
    pub async fn post_message(
        &self,
        trip_id: i64,
        user_id: i64,
        text: Option<&str>,
    ) -> Result<Option<Message>, AppError> {
        let mut tx = self.db.begin().await?;
        let trip = load_trip(&mut tx, trip_id).await?;
        if participations::find(&mut tx, trip_id, user_id).await?.is_none() {
            return Err(AppError::Forbidden);
        }
        if trip.status.is_terminal() {
            return Err(AppError::Closed);
        }
        let Some(text) = text.filter(|text| !text.trim().is_empty()) else {
            return Ok(None);
        };

        let message = messages::insert(&mut tx, trip_id, user_id, text, Utc::now()).await?;
        tx.commit().await?;
        debug!(trip_id, user_id, message_id = message.id, "message posted");
        Ok(Some(message))
    }

    pub async fn create_meetup(
        &self,
        trip_id: i64,
        user_id: i64,
        input: MeetupInput,
    ) -> Result<Meetup, AppError> {
        let mut tx = self.db.begin().await?;
        load_editable(&mut tx, trip_id, user_id).await?;
        let scheduled_at = input.scheduled_at()?;
        let title = input.title.trim();
        let location = input.location.trim();
        if title.is_empty() || location.is_empty() {
            return Err(AppError::invalid("a meetup needs a title and a location"));
        }
        let description = input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());

        let meetup = meetups::insert(
            &mut tx,
            meetups::NewMeetup {
                trip_id,
                creator_id: user_id,
                title,
                location,
                scheduled_at,
                description,
            },
            Utc::now(),
        )
        .await?;
        tx.commit().await?;
        info!(trip_id, user_id, meetup_id = meetup.id, "meetup scheduled");
        Ok(meetup)
    }

    pub async fn browse(&self, filters: &BrowseFilters) -> Result<Vec<Trip>, AppError> {
        let mut conn = self.db.acquire().await?;
        trips::browse(&mut conn, filters).await
    }

    pub async fn capacity(&self, trip_id: i64) -> Result<Capacity, AppError> {
        let mut conn = self.db.acquire().await?;
        let trip = load_trip(&mut conn, trip_id).await?;
        let count = participations::count(&mut conn, trip_id).await?;
        Ok(Capacity {
            count,
            max: trip.max_participants,
        })
    }

    /// Chat history for participants, newest first.
    pub async fn messages(&self, trip_id: i64, user_id: i64) -> Result<MessageList, AppError> {
        let mut conn = self.db.acquire().await?;
        load_trip(&mut conn, trip_id).await?;
        if participations::find(&mut conn, trip_id, user_id).await?.is_none() {
            return Err(AppError::NotAParticipant);
        }
        let messages = messages::list_for_trip(&mut conn, trip_id)
            .await?
            .into_iter()
            .map(MessageJson::from)
            .collect();
        Ok(MessageList { messages })
    }

    pub async fn detail(&self, trip_id: i64, user_id: i64) -> Result<TripDetail, AppError> {
        let mut conn = self.db.acquire().await?;
        let trip = load_trip(&mut conn, trip_id).await?;
        let viewer = participations::find(&mut conn, trip_id, user_id)
            .await?
            .ok_or(AppError::NotAParticipant)?;
        let participants = participations::list_for_trip(&mut conn, trip_id).await?;
        let messages = messages::list_for_trip(&mut conn, trip_id).await?;
        let meetups = meetups::list_for_trip(&mut conn, trip_id).await?;
        Ok(TripDetail {
            trip,
            viewer,
            participants,
            messages,
            meetups,
        })
    }

    pub async fn my_trips(&self, user_id: i64) -> Result<Vec<Trip>, AppError> {
        let mut conn = self.db.acquire().await?;
        trips::for_participant(&mut conn, user_id).await
    }

    pub async fn dashboard(&self, user_id: i64) -> Result<DashboardStats, AppError> {
        let mut conn = self.db.acquire().await?;
        let joined = trips::for_participant(&mut conn, user_id).await?;
        let created = trips::count_created_by(&mut conn, user_id).await?;
        Ok(DashboardStats::from_trips(&joined, created))
    }
}

async fn load_trip(conn: &mut SqliteConnection, trip_id: i64) -> Result<Trip, AppError> {
    trips::find(conn, trip_id).await?.ok_or(AppError::NotFound)
}

/// Loads the trip after checking that `user_id` holds edit rights on it.
async fn load_editable(
    conn: &mut SqliteConnection,
    trip_id: i64,
    user_id: i64,
) -> Result<Trip, AppError> {
    let trip = load_trip(&mut *conn, trip_id).await?;
    match participations::find(&mut *conn, trip_id, user_id).await? {
        Some(membership) if membership.can_edit => Ok(trip),
        _ => Err(AppError::Forbidden),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DifficultyCount {
    pub difficulty: Difficulty,
    pub count: usize,
}

/// Totals over the trips a user takes part in.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_trips: usize,
    pub active_trips: usize,
    pub finalized_trips: usize,
    pub total_distance: f64,
    pub created_trips: i64,
    pub difficulty_stats: Vec<DifficultyCount>,
    pub recent_trips: Vec<Trip>,
}

impl DashboardStats {
    const RECENT_LIMIT: usize = 5;

    pub fn from_trips(trips: &[Trip], created_trips: i64) -> Self {
        let difficulty_stats = Difficulty::ALL
            .into_iter()
            .map(|difficulty| DifficultyCount {
                difficulty,
                count: trips
                    .iter()
                    .filter(|trip| trip.difficulty == difficulty)
                    .count(),
            })
            .filter(|entry| entry.count > 0)
            .collect();

        Self {
            total_trips: trips.len(),
            active_trips: trips.iter().filter(|trip| trip.status.is_active()).count(),
            finalized_trips: trips
                .iter()
                .filter(|trip| trip.status == TripStatus::Finalized)
                .count(),
            total_distance: trips.iter().map(|trip| trip.distance_km).sum(),
            created_trips,
            difficulty_stats,
            recent_trips: trips.iter().take(Self::RECENT_LIMIT).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::tests::sample_trip;

    #[test]
    fn dashboard_counts_statuses_and_difficulties() {
        let mut trips = Vec::new();
        for (index, (status, difficulty)) in [
            (TripStatus::Open, Difficulty::Beginner),
            (TripStatus::ClosedToNew, Difficulty::Beginner),
            (TripStatus::Finalized, Difficulty::Expert),
            (TripStatus::Cancelled, Difficulty::Beginner),
            (TripStatus::Open, Difficulty::Expert),
            (TripStatus::Open, Difficulty::Beginner),
        ]
        .into_iter()
        .enumerate()
        {
            let mut trip = sample_trip();
            trip.id = index as i64 + 1;
            trip.status = status;
            trip.difficulty = difficulty;
            trip.distance_km = 10.0;
            trips.push(trip);
        }

        let stats = DashboardStats::from_trips(&trips, 2);
        assert_eq!(stats.total_trips, 6);
        assert_eq!(stats.active_trips, 4);
        assert_eq!(stats.finalized_trips, 1);
        assert_eq!(stats.total_distance, 60.0);
        assert_eq!(stats.created_trips, 2);
        assert_eq!(
            stats.difficulty_stats,
            vec![
                DifficultyCount {
                    difficulty: Difficulty::Beginner,
                    count: 4
                },
                DifficultyCount {
                    difficulty: Difficulty::Expert,
                    count: 2
                },
            ]
        );
        assert_eq!(stats.recent_trips.len(), 5);
    }

    #[test]
    fn empty_dashboard_is_all_zero() {
        let stats = DashboardStats::from_trips(&[], 0);
        assert_eq!(stats.total_trips, 0);
        assert_eq!(stats.total_distance, 0.0);
        assert!(stats.difficulty_stats.is_empty());
    }
}
