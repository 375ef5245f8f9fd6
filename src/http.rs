use crate::backend::{ReservationStore, StoreError};
use crate::configuration::Configuration;
use crate::coordinator::{attempt_reservation, BookingError};
use crate::notifier::Notifications;
use crate::slots::{compute_slots, format_booking_date, is_blackout, parse_booking_date, SLOT_TIMES};
use crate::types::{Enquiry, EnquiryForm, Reservation, ReservationCandidate, Slot, Table};
use axum::extract::{Query, Request};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, Response};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use validator::{Validate, ValidationErrors};

pub struct AppState<S: ReservationStore, C: Configuration> {
    pub store: Arc<S>,
    pub configuration: C,
    pub notifications: Notifications,
}

impl<S: ReservationStore, C: Configuration> Clone for AppState<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            configuration: self.configuration.clone(),
            notifications: self.notifications.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("Invalid enquiry: {0}")]
    InvalidEnquiry(ValidationErrors),

    #[error("Enquiry could not be submitted, please try again")]
    EnquiryFailed(#[source] StoreError),

    #[error("Failed to list {table}")]
    ListFailed {
        table: Table,
        #[source]
        source: StoreError,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Booking(BookingError::Validation(_))
            | ApiError::Booking(BookingError::NoSlotSelected)
            | ApiError::Booking(BookingError::SlotUnavailable)
            | ApiError::InvalidEnquiry(_) => StatusCode::BAD_REQUEST,
            ApiError::Booking(BookingError::SlotTaken) => StatusCode::CONFLICT,
            ApiError::Booking(BookingError::LoadFailed(_)) | ApiError::ListFailed { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Booking(BookingError::SubmitFailed(_)) | ApiError::EnquiryFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SlotsQuery {
    date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotsResponse {
    pub date: String,
    pub blackout: bool,
    pub slots: Vec<Slot>,
}

/// What `/events` reveals about a new booking. Contact details stay private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedSlot {
    pub date: String,
    pub time: String,
}

impl From<&Reservation> for BookedSlot {
    fn from(reservation: &Reservation) -> Self {
        Self {
            date: reservation.date.clone(),
            time: reservation.time.clone(),
        }
    }
}

pub fn create_app<S: ReservationStore, C: Configuration>(
    store: Arc<S>,
    configuration: C,
    notifications: Notifications,
) -> Router {
    let state = AppState {
        store,
        configuration,
        notifications,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/frontend", get(get_frontend::<S, C>))
        .route("/slots", get(get_slots::<S, C>))
        .route("/book", post(book_slot::<S, C>))
        .route("/enquiries", post(submit_enquiry::<S, C>))
        .route("/events", get(reservation_events::<S, C>));

    let admin = Router::new()
        .route("/admin/bookings", get(get_bookings::<S, C>))
        .route("/admin/enquiries", get(get_enquiries::<S, C>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth::<S, C>,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .with_state(state)
        .layer(cors)
}

async fn admin_auth<S: ReservationStore, C: Configuration>(
    State(state): State<AppState<S, C>>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    match request.headers().get("x-admin-password") {
        Some(password) => {
            if password.to_str().unwrap_or("") != state.configuration.password() {
                return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
            }
        }
        None => return Err((StatusCode::UNAUTHORIZED, "Missing credentials".to_string())),
    }
    Ok(next.run(request).await)
}

async fn get_slots<S: ReservationStore, C: Configuration>(
    State(state): State<AppState<S, C>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, ApiError> {
    let reservations = state.store.reservations().await.map_err(|err| {
        error!(?err, "Failed to load reservations");
        BookingError::LoadFailed(err)
    })?;

    Ok(Json(SlotsResponse {
        date: format_booking_date(query.date),
        blackout: is_blackout(query.date),
        slots: compute_slots(query.date, &reservations),
    }))
}

/// Rejects candidates for slots that are never offered and rewrites the date
/// in store form, so `04/10/2025` and `4/10/2025` occupy the same slot.
fn normalize_offered(
    mut candidate: ReservationCandidate,
) -> Result<ReservationCandidate, BookingError> {
    let date = parse_booking_date(&candidate.date)
        .filter(|date| !is_blackout(*date))
        .ok_or(BookingError::SlotUnavailable)?;
    if !SLOT_TIMES.contains(&candidate.time.as_str()) {
        return Err(BookingError::SlotUnavailable);
    }
    candidate.date = format_booking_date(date);
    Ok(candidate)
}

async fn book_slot<S: ReservationStore, C: Configuration>(
    State(state): State<AppState<S, C>>,
    Json(candidate): Json<ReservationCandidate>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    candidate.validate().map_err(BookingError::from)?;
    let candidate = normalize_offered(candidate)?;

    let reservation =
        attempt_reservation(state.store.as_ref(), &state.notifications, candidate).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

async fn submit_enquiry<S: ReservationStore, C: Configuration>(
    State(state): State<AppState<S, C>>,
    Json(form): Json<EnquiryForm>,
) -> Result<StatusCode, ApiError> {
    form.validate().map_err(ApiError::InvalidEnquiry)?;

    let enquiry = state.store.insert_enquiry(form).await.map_err(|err| {
        error!(?err, "Failed to store enquiry");
        ApiError::EnquiryFailed(err)
    })?;

    info!(id = %enquiry.id, "Enquiry received");
    state.notifications.dispatch(Table::Enquiries, &enquiry);
    Ok(StatusCode::CREATED)
}

async fn reservation_events<S: ReservationStore, C: Configuration>(
    State(state): State<AppState<S, C>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = state.store.subscribe().map(|event| {
        Event::default()
            .event("booking")
            .json_data(BookedSlot::from(&event.record))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn get_bookings<S: ReservationStore, C: Configuration>(
    State(state): State<AppState<S, C>>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let reservations = state.store.reservations().await.map_err(|err| {
        error!(?err, "Failed to load bookings");
        ApiError::ListFailed {
            table: Table::Bookings,
            source: err,
        }
    })?;
    Ok(Json(reservations))
}

async fn get_enquiries<S: ReservationStore, C: Configuration>(
    State(state): State<AppState<S, C>>,
) -> Result<Json<Vec<Enquiry>>, ApiError> {
    let enquiries = state.store.enquiries().await.map_err(|err| {
        error!(?err, "Failed to load enquiries");
        ApiError::ListFailed {
            table: Table::Enquiries,
            source: err,
        }
    })?;
    Ok(Json(enquiries))
}

async fn get_frontend<S: ReservationStore, C: Configuration>(
    State(state): State<AppState<S, C>>,
) -> Result<Html<String>, (StatusCode, String)> {
    let path = state.configuration.frontend_path();

    match fs::read_to_string(&path).await {
        Ok(contents) => Ok(Html(contents.replace(
            "{{website_title}}",
            &state.configuration.website_title(),
        ))),
        Err(e) => {
            let error_message = format!("Failed to read frontend file: {}", e);
            error!(path = %path.display(), "{error_message}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, error_message))
        }
    }
}
