//! Payment HTTP handlers
//!
//! `webhook` and `callback` are called by the gateway (or the browser it
//! redirects) and carry no caller identity; everything else runs behind
//! the identity middleware.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Extension;
use chrono::Duration;

use crate::application::{NotificationFeed, PaymentReconciler};
use crate::domain::Actor;
use crate::interfaces::http::modules::bookings::{BookingDto, UserQuery};
use crate::interfaces::http::common::{ok, ApiError, ApiResponse, ApiResult, ValidatedJson};

use super::dto::*;

/// Application state for payment handlers.
#[derive(Clone)]
pub struct PaymentAppState {
    pub payments: Arc<PaymentReconciler>,
    pub feed: Arc<NotificationFeed>,
    /// Default window of `GET /payments/recent`
    pub recent_window: Duration,
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/initiate",
    tag = "Payments",
    request_body = BookingRefRequest,
    responses(
        (status = 200, description = "Gateway session opened", body = ApiResponse<PaymentInitiationDto>),
        (status = 409, description = "Booking is not payable"),
        (status = 504, description = "Gateway timed out; retry")
    )
)]
pub async fn initiate_payment(
    State(state): State<PaymentAppState>,
    Extension(actor): Extension<Actor>,
    ValidatedJson(request): ValidatedJson<BookingRefRequest>,
) -> ApiResult<PaymentInitiationDto> {
    let initiation = state.payments.initiate(&request.booking_id, &actor).await?;
    ok(initiation.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    tag = "Payments",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Verification outcome", body = ApiResponse<VerificationDto>),
        (status = 404, description = "No booking matches the identifier"),
        (status = 422, description = "Claimed amount differs from the booking amount")
    )
)]
pub async fn verify_payment(
    State(state): State<PaymentAppState>,
    Extension(_actor): Extension<Actor>,
    ValidatedJson(request): ValidatedJson<VerifyPaymentRequest>,
) -> ApiResult<VerificationDto> {
    let outcome = state
        .payments
        .verify_identifier(&request.identifier, request.amount_paisa)
        .await?;
    ok(outcome.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/pay-later",
    tag = "Payments",
    request_body = BookingRefRequest,
    responses(
        (status = 200, description = "Booking confirmed, payment due at the station", body = ApiResponse<BookingDto>),
        (status = 409, description = "Booking is not awaiting payment")
    )
)]
pub async fn pay_later(
    State(state): State<PaymentAppState>,
    Extension(actor): Extension<Actor>,
    ValidatedJson(request): ValidatedJson<BookingRefRequest>,
) -> ApiResult<BookingDto> {
    let booking = state.payments.pay_later(&request.booking_id, &actor).await?;
    ok(booking.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/payments/status/{booking_id}",
    tag = "Payments",
    params(("booking_id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Payment state of the booking", body = ApiResponse<PaymentStatusDto>),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn payment_status(
    State(state): State<PaymentAppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<String>,
) -> ApiResult<PaymentStatusDto> {
    let booking = state.payments.payment_status(&booking_id, &actor).await?;
    ok(booking.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/payments/pending",
    tag = "Payments",
    params(UserQuery),
    responses(
        (status = 200, description = "Bookings with a payment due", body = ApiResponse<Vec<BookingDto>>)
    )
)]
pub async fn pending_payments(
    State(state): State<PaymentAppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Vec<BookingDto>> {
    let user_id = query.user_id.unwrap_or_else(|| actor.user_id.clone());
    actor.ensure_is_self_or_operator(&user_id)?;
    let pending = state.feed.list_pending_payments(&user_id).await?;
    ok(pending.into_iter().map(BookingDto::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/payments/recent",
    tag = "Payments",
    params(RecentQuery),
    responses(
        (status = 200, description = "Payments verified within the window, newest first", body = ApiResponse<Vec<BookingDto>>)
    )
)]
pub async fn recent_confirmations(
    State(state): State<PaymentAppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Vec<BookingDto>> {
    let window = match query.minutes {
        None => state.recent_window,
        Some(m) if (1..=24 * 60).contains(&m) => Duration::minutes(m),
        Some(m) => return Err(ApiError::bad_request(format!("minutes must be 1..=1440, got {}", m))),
    };

    let user_id = match (query.user_id, actor.is_operator()) {
        (Some(user_id), _) => {
            actor.ensure_is_self_or_operator(&user_id)?;
            Some(user_id)
        }
        (None, true) => None,
        (None, false) => Some(actor.user_id.clone()),
    };

    let recent = state
        .feed
        .list_recent_payment_confirmations(window, user_id.as_deref())
        .await?;
    ok(recent.into_iter().map(BookingDto::from).collect())
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    tag = "Payments",
    request_body = WebhookRequest,
    responses(
        (status = 200, description = "Notification applied", body = ApiResponse<VerificationDto>),
        (status = 404, description = "No booking matches the notification")
    )
)]
pub async fn payment_webhook(
    State(state): State<PaymentAppState>,
    ValidatedJson(request): ValidatedJson<WebhookRequest>,
) -> ApiResult<VerificationDto> {
    tracing::info!(
        pidx = ?request.pidx,
        purchase_order_id = ?request.purchase_order_id,
        status = %request.status,
        "Payment webhook received"
    );
    let outcome = state
        .payments
        .webhook(&request.params(), request.amount, &request.status)
        .await?;
    ok(outcome.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/payments/callback",
    tag = "Payments",
    params(CallbackQuery),
    responses(
        (status = 200, description = "Redirect reconciled", body = ApiResponse<VerificationDto>),
        (status = 404, description = "No booking matches the redirect")
    )
)]
pub async fn payment_callback(
    State(state): State<PaymentAppState>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<VerificationDto> {
    let params = query.params();
    let outcome = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(status) => state.payments.webhook(&params, query.amount, status).await?,
        None => {
            state
                .payments
                .verify(&params.candidates(), query.amount)
                .await?
        }
    };
    ok(outcome.into())
}
