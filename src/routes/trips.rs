use std::collections::HashMap;

use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    response::{Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    auth::CurrentUser,
    error::{AppError, JsonError},
    flash,
    models::{
        meetup::{Meetup, MeetupInput},
        message::{ChatMessage, MessageList},
        participation::{Capacity, Participant},
        trip::{Difficulty, LockableField, Trip, TripStatus},
    },
    routes::{
        forms::{BrowseQuery, TripFields},
        PageContext,
    },
    state::AppState,
};

const UPLOAD_LIMIT_BYTES: usize = 8 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/browse", get(browse))
        .route("/my-trips", get(my_trips))
        .route(
            "/create",
            get(create_form)
                .post(create_submit)
                .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/:id", get(detail))
        .route("/:id/join", post(join))
        .route("/:id/leave", post(leave))
        .route("/:id/edit", get(edit_form).post(edit_submit))
        .route("/:id/lock-field", post(lock_field))
        .route("/:id/close", post(close))
        .route("/:id/finalize", post(finalize))
        .route("/:id/cancel", post(cancel))
        .route("/:id/message", post(post_message))
        .route("/:id/meetup", post(create_meetup))
        .route("/:id/permissions/:user_id", post(toggle_permission))
        .route("/:id/participants", get(participants))
        .route("/:id/messages", get(messages))
}

fn detail_url(trip_id: i64) -> String {
    format!("/trips/{trip_id}")
}

/// Display strings for one trip, shared by the listing and detail pages.
#[derive(Clone)]
struct TripView {
    id: i64,
    title: String,
    description: String,
    image_url: String,
    departure_location: String,
    destination: String,
    route_description: String,
    distance_km: String,
    difficulty: &'static str,
    start_date_min: String,
    start_date_max: String,
    duration_days_min: i64,
    duration_days_max: i64,
    budget_per_person: String,
    max_participants: i64,
    status: &'static str,
    status_label: &'static str,
    departure_final: bool,
    destination_final: bool,
    dates_final: bool,
    route_final: bool,
    budget_final: bool,
}

impl From<&Trip> for TripView {
    fn from(trip: &Trip) -> Self {
        Self {
            id: trip.id,
            title: trip.title.clone(),
            description: trip.description.clone(),
            image_url: trip.image_url.clone().unwrap_or_default(),
            departure_location: trip.departure_location.clone(),
            destination: trip.destination.clone(),
            route_description: trip.route_description.clone().unwrap_or_default(),
            distance_km: format!("{:.1}", trip.distance_km),
            difficulty: trip.difficulty.as_str(),
            start_date_min: trip.start_date_min.to_string(),
            start_date_max: trip.start_date_max.to_string(),
            duration_days_min: trip.duration_days_min,
            duration_days_max: trip.duration_days_max,
            budget_per_person: format!("{:.2}", trip.budget_per_person),
            max_participants: trip.max_participants,
            status: trip.status.as_str(),
            status_label: trip.status.label(),
            departure_final: trip.departure_final,
            destination_final: trip.destination_final,
            dates_final: trip.dates_final,
            route_final: trip.route_final,
            budget_final: trip.budget_final,
        }
    }
}

#[derive(Clone)]
struct SelectOption {
    value: &'static str,
    selected: bool,
}

fn difficulty_options(selected: Option<&str>) -> Vec<SelectOption> {
    Difficulty::ALL
        .into_iter()
        .map(|difficulty| SelectOption {
            value: difficulty.as_str(),
            selected: selected == Some(difficulty.as_str()),
        })
        .collect()
}

#[derive(Template)]
#[template(path = "trips/browse.html")]
struct BrowseTemplate {
    page: PageContext,
    trips: Vec<TripView>,
    difficulties: Vec<SelectOption>,
    max_distance: String,
    min_budget: String,
    max_budget: String,
    search: String,
    filtered: bool,
}

async fn browse(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Query(query): Query<BrowseQuery>,
) -> Result<Response, AppError> {
    current.require_user()?;
    let filters = match query.filters() {
        Ok(filters) => filters,
        Err(err) => return flash::recover(jar, err, "/trips/browse"),
    };
    let trips = state.trips.browse(&filters).await?;
    debug!(results = trips.len(), "browse");

    let (jar, notice) = flash::take(jar);
    let template = BrowseTemplate {
        page: PageContext::new(&current, notice),
        trips: trips.iter().map(TripView::from).collect(),
        difficulties: difficulty_options(query.difficulty.as_deref()),
        filtered: !query.is_empty(),
        max_distance: query.max_distance.unwrap_or_default(),
        min_budget: query.min_budget.unwrap_or_default(),
        max_budget: query.max_budget.unwrap_or_default(),
        search: query.search.unwrap_or_default(),
    };
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

#[derive(Template)]
#[template(path = "trips/my_trips.html")]
struct MyTripsTemplate {
    page: PageContext,
    trips: Vec<TripView>,
}

async fn my_trips(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trips = state.trips.my_trips(user.id).await?;
    let (jar, notice) = flash::take(jar);
    let template = MyTripsTemplate {
        page: PageContext::new(&current, notice),
        trips: trips.iter().map(TripView::from).collect(),
    };
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

#[derive(Template)]
#[template(path = "trips/create.html")]
struct CreateTemplate {
    page: PageContext,
    difficulties: Vec<SelectOption>,
}

async fn create_form(current: CurrentUser, jar: PrivateCookieJar) -> Result<Response, AppError> {
    current.require_user()?;
    let (jar, notice) = flash::take(jar);
    let template = CreateTemplate {
        page: PageContext::new(&current, notice),
        difficulties: difficulty_options(None),
    };
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

fn unreadable_upload(err: MultipartError) -> AppError {
    AppError::invalid(format!("could not read the submitted form: {err}"))
}

async fn create_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let user = current.require_user()?;

    let mut fields = TripFields::default();
    let mut image = None;
    while let Some(field) = multipart.next_field().await.map_err(unreadable_upload)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let data = field.bytes().await.map_err(unreadable_upload)?;
            if !file_name.is_empty() && !data.is_empty() {
                image = Some((file_name, data));
            }
        } else {
            let value = field.text().await.map_err(unreadable_upload)?;
            fields.insert(name, value);
        }
    }

    let mut draft = match fields.into_draft(None).and_then(|draft| {
        draft.validate()?;
        Ok(draft)
    }) {
        Ok(draft) => draft,
        Err(err) => return flash::recover(jar, err, "/trips/create"),
    };
    if let Some((file_name, data)) = image {
        draft.image_url = state
            .storage
            .save_trip_image(user.id, &file_name, &data)
            .await?;
    }

    let image_url = draft.image_url.clone();
    match state.trips.create_trip(user.id, draft).await {
        Ok(trip) => Ok(flash::redirect(
            jar,
            "Trip created successfully!",
            &detail_url(trip.id),
        )),
        Err(err) => {
            if let Some(url) = image_url {
                if let Err(cleanup) = state.storage.discard(&url).await {
                    warn!(%url, error = %cleanup, "orphaned trip image left on disk");
                }
            }
            flash::recover(jar, err, "/trips/create")
        }
    }
}

#[derive(Clone)]
struct LockView {
    field: &'static str,
    label: &'static str,
    locked: bool,
}

#[derive(Clone)]
struct ParticipantView {
    user_id: i64,
    name: String,
    can_edit: bool,
    is_creator: bool,
}

impl ParticipantView {
    fn new(participant: &Participant, creator_id: i64) -> Self {
        Self {
            user_id: participant.user_id,
            name: participant.name.clone(),
            can_edit: participant.can_edit,
            is_creator: participant.user_id == creator_id,
        }
    }
}

#[derive(Clone)]
struct MessageView {
    author_name: String,
    text: String,
    timestamp: String,
}

impl From<&ChatMessage> for MessageView {
    fn from(message: &ChatMessage) -> Self {
        Self {
            author_name: message.author_name.clone(),
            text: message.text.clone(),
            timestamp: message.timestamp(),
        }
    }
}

#[derive(Clone)]
struct MeetupView {
    title: String,
    location: String,
    when: String,
    description: String,
}

impl From<&Meetup> for MeetupView {
    fn from(meetup: &Meetup) -> Self {
        Self {
            title: meetup.title.clone(),
            location: meetup.location.clone(),
            when: meetup
                .meetup_datetime
                .format("%b %d, %Y at %H:%M")
                .to_string(),
            description: meetup.description.clone().unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "trips/detail.html")]
struct DetailTemplate {
    page: PageContext,
    trip: TripView,
    locks: Vec<LockView>,
    participants: Vec<ParticipantView>,
    messages: Vec<MessageView>,
    meetups: Vec<MeetupView>,
    participant_count: usize,
    can_edit: bool,
    is_creator: bool,
    is_open: bool,
    is_active: bool,
}

async fn detail(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let detail = match state.trips.detail(trip_id, user.id).await {
        Ok(detail) => detail,
        Err(AppError::NotAParticipant) => {
            return Ok(flash::redirect(
                jar,
                "You must be a participant to view trip details",
                "/trips/browse",
            ))
        }
        Err(err) => return Err(err),
    };

    let trip = &detail.trip;
    let (jar, notice) = flash::take(jar);
    let template = DetailTemplate {
        page: PageContext::new(&current, notice),
        trip: TripView::from(trip),
        locks: LockableField::ALL
            .into_iter()
            .map(|field| LockView {
                field: field.as_str(),
                label: field.label(),
                locked: trip.is_locked(field),
            })
            .collect(),
        participant_count: detail.participants.len(),
        participants: detail
            .participants
            .iter()
            .map(|participant| ParticipantView::new(participant, trip.creator_id))
            .collect(),
        messages: detail.messages.iter().map(MessageView::from).collect(),
        meetups: detail.meetups.iter().map(MeetupView::from).collect(),
        can_edit: detail.viewer.can_edit,
        is_creator: trip.creator_id == user.id,
        is_open: trip.status == TripStatus::Open,
        is_active: trip.status.is_active(),
    };
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

async fn join(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    match state.trips.join(trip_id, user.id).await {
        Ok(_) => Ok(flash::redirect(
            jar,
            "You have joined the trip!",
            &detail_url(trip_id),
        )),
        Err(err) => flash::recover(jar, err, "/trips/browse"),
    }
}

async fn leave(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    match state.trips.leave(trip_id, user.id).await {
        Ok(()) => Ok(flash::redirect(
            jar,
            "You have left the trip",
            "/trips/my-trips",
        )),
        Err(err) => flash::recover(jar, err, &detail_url(trip_id)),
    }
}

#[derive(Template)]
#[template(path = "trips/edit.html")]
struct EditTemplate {
    page: PageContext,
    trip: TripView,
    difficulties: Vec<SelectOption>,
}

async fn edit_form(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trip = state.trips.trip(trip_id).await?;
    if !state.trips.can_edit(trip_id, user.id).await? {
        return Ok(flash::redirect(
            jar,
            "You do not have permission to edit this trip",
            &detail_url(trip_id),
        ));
    }
    let (jar, notice) = flash::take(jar);
    let template = EditTemplate {
        page: PageContext::new(&current, notice),
        difficulties: difficulty_options(Some(trip.difficulty.as_str())),
        trip: TripView::from(&trip),
    };
    Ok((jar, AskamaTemplateResponse::into_response(template)).into_response())
}

async fn edit_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
    Form(values): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let edit_url = format!("/trips/{trip_id}/edit");
    let trip = state.trips.trip(trip_id).await?;
    let edit = match TripFields::new(values).into_edit(&trip) {
        Ok(edit) => edit,
        Err(err) => return flash::recover(jar, err, &edit_url),
    };
    match state.trips.edit_trip(trip_id, user.id, edit).await {
        Ok(_) => Ok(flash::redirect(
            jar,
            "Trip updated successfully!",
            &detail_url(trip_id),
        )),
        Err(err) => flash::recover(jar, err, &edit_url),
    }
}

#[derive(Deserialize)]
struct LockForm {
    field: String,
}

async fn lock_field(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
    Form(form): Form<LockForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let back = detail_url(trip_id);
    let field = match form.field.parse::<LockableField>() {
        Ok(field) => field,
        Err(err) => return flash::recover(jar, err, &back),
    };
    match state.trips.lock_field(trip_id, user.id, field).await {
        Ok(_) => Ok(flash::redirect(
            jar,
            format!("{} has been finalized", field.label()),
            &back,
        )),
        Err(err) => flash::recover(jar, err, &back),
    }
}

async fn close(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let result = state.trips.close(trip_id, user.id).await;
    status_changed(jar, trip_id, result, "Trip closed to new participants")
}

async fn finalize(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let result = state.trips.finalize(trip_id, user.id).await;
    status_changed(jar, trip_id, result, "Trip finalized!")
}

async fn cancel(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let result = state.trips.cancel(trip_id, user.id).await;
    status_changed(jar, trip_id, result, "Trip cancelled")
}

fn status_changed(
    jar: PrivateCookieJar,
    trip_id: i64,
    result: Result<Trip, AppError>,
    notice: &str,
) -> Result<Response, AppError> {
    let back = detail_url(trip_id);
    match result {
        Ok(_) => Ok(flash::redirect(jar, notice, &back)),
        Err(err) => flash::recover(jar, err, &back),
    }
}

#[derive(Deserialize)]
struct MessageForm {
    message: Option<String>,
}

async fn post_message(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
    Form(form): Form<MessageForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let back = detail_url(trip_id);
    match state
        .trips
        .post_message(trip_id, user.id, form.message.as_deref())
        .await
    {
        Ok(_) => Ok((jar, Redirect::to(&back)).into_response()),
        Err(err) => flash::recover(jar, err, &back),
    }
}

async fn create_meetup(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path(trip_id): Path<i64>,
    Form(input): Form<MeetupInput>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let back = detail_url(trip_id);
    match state.trips.create_meetup(trip_id, user.id, input).await {
        Ok(_) => Ok(flash::redirect(jar, "Meetup created!", &back)),
        Err(err) => flash::recover(jar, err, &back),
    }
}

async fn toggle_permission(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Path((trip_id, target_user_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let back = detail_url(trip_id);
    match state
        .trips
        .toggle_permission(trip_id, user.id, target_user_id)
        .await
    {
        Ok(updated) => {
            let notice = if updated.can_edit {
                "Edit permission granted"
            } else {
                "Edit permission revoked"
            };
            Ok(flash::redirect(jar, notice, &back))
        }
        Err(err) => flash::recover(jar, err, &back),
    }
}

async fn participants(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Json<Capacity>, JsonError> {
    current.require_user()?;
    Ok(Json(state.trips.capacity(trip_id).await?))
}

async fn messages(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Json<MessageList>, JsonError> {
    let user = current.require_user()?;
    Ok(Json(state.trips.messages(trip_id, user.id).await?))
}
