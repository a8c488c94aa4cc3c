//! Booking HTTP handlers
//!
//! Lifecycle endpoints. Mutations accept an optional `If-Match: <version>`
//! header; a stale version answers 409.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::{Extension, Json};

use crate::application::{BookingService, CreateBooking, SetAmount, SettlementService};
use crate::domain::Actor;
use crate::interfaces::http::common::{ok, ApiError, ApiResponse, ApiResult, ValidatedJson};

use super::dto::*;

/// Application state for booking handlers.
#[derive(Clone)]
pub struct BookingAppState {
    pub bookings: Arc<BookingService>,
    pub settlement: Arc<SettlementService>,
}

/// Version expected by the caller, from `If-Match`.
pub fn expected_version(headers: &HeaderMap) -> Result<Option<i32>, ApiError> {
    let Some(raw) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };
    let value = raw
        .to_str()
        .map_err(|_| ApiError::bad_request("If-Match must be a version number"))?;
    let trimmed = value.trim().trim_start_matches("W/").trim_matches('"');
    trimmed
        .parse::<i32>()
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("Invalid If-Match version '{}'", value)))
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "Bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = ApiResponse<BookingDto>),
        (status = 400, description = "Invalid slot or outside the booking window"),
        (status = 409, description = "Slot unavailable")
    )
)]
pub async fn create_booking(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    ValidatedJson(request): ValidatedJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BookingDto>>), ApiError> {
    let time = request
        .time
        .as_deref()
        .map(|raw| {
            parse_time(raw).ok_or_else(|| ApiError::bad_request(format!("Invalid time '{}'", raw)))
        })
        .transpose()?;

    let booking = state
        .bookings
        .create_booking(CreateBooking {
            user_id: actor.user_id,
            station_id: request.station_id,
            charger_type: request.charger_type,
            date: request.date,
            time,
            urgency: request.urgency,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(BookingDto::from(booking))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    tag = "Bookings",
    params(UserQuery),
    responses(
        (status = 200, description = "Bookings of the user, newest first", body = ApiResponse<Vec<BookingDto>>),
        (status = 403, description = "Another user's bookings")
    )
)]
pub async fn list_bookings(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Vec<BookingDto>> {
    let user_id = query.user_id.unwrap_or_else(|| actor.user_id.clone());
    let bookings = state.bookings.list_for_user(&user_id, &actor).await?;
    ok(bookings.into_iter().map(BookingDto::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/active",
    tag = "Bookings",
    params(UserQuery),
    responses(
        (status = 200, description = "Confirmed and in-progress bookings", body = ApiResponse<Vec<BookingDto>>)
    )
)]
pub async fn list_active_bookings(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Vec<BookingDto>> {
    let user_id = query.user_id.unwrap_or_else(|| actor.user_id.clone());
    let bookings = state.bookings.list_active(&user_id, &actor).await?;
    ok(bookings.into_iter().map(BookingDto::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/{booking_id}",
    tag = "Bookings",
    params(("booking_id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking details", body = ApiResponse<BookingDto>),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn get_booking(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<String>,
) -> ApiResult<BookingDto> {
    let booking = state.bookings.get(&booking_id, &actor).await?;
    ok(booking.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/{booking_id}/cancel",
    tag = "Bookings",
    params(("booking_id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking cancelled, slot released", body = ApiResponse<BookingDto>),
        (status = 409, description = "Booking cannot be cancelled or was modified concurrently")
    )
)]
pub async fn cancel_booking(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<BookingDto> {
    let version = expected_version(&headers)?;
    let booking = state.bookings.cancel(&booking_id, &actor, version).await?;
    ok(booking.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/{booking_id}/start",
    tag = "Bookings",
    params(("booking_id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Charging session started", body = ApiResponse<BookingDto>),
        (status = 403, description = "Operator role required")
    )
)]
pub async fn start_session(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<BookingDto> {
    let version = expected_version(&headers)?;
    let booking = state
        .bookings
        .start_session(&booking_id, &actor, version)
        .await?;
    ok(booking.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/{booking_id}/mark-completed",
    tag = "Bookings",
    params(("booking_id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Charging marked completed, slot released", body = ApiResponse<BookingDto>),
        (status = 403, description = "Operator role required")
    )
)]
pub async fn mark_completed(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<BookingDto> {
    let version = expected_version(&headers)?;
    let booking = state
        .bookings
        .mark_charging_completed(&booking_id, &actor, version)
        .await?;
    ok(booking.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/bookings/{booking_id}/set-amount",
    tag = "Settlement",
    params(("booking_id" = String, Path, description = "Booking ID")),
    request_body = SetAmountRequest,
    responses(
        (status = 200, description = "Amount set, payment opened", body = ApiResponse<BookingDto>),
        (status = 403, description = "Operator role required"),
        (status = 409, description = "Already priced or charging not completed")
    )
)]
pub async fn set_amount(
    State(state): State<BookingAppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<String>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<SetAmountRequest>,
) -> ApiResult<BookingDto> {
    let version = expected_version(&headers)?;
    let booking = state
        .settlement
        .set_amount(
            &booking_id,
            &actor,
            SetAmount {
                amount_npr: request.amount_npr,
                actual_duration_minutes: request.duration_minutes,
                notes: request.notes,
            },
            version,
        )
        .await?;
    ok(booking.into())
}
