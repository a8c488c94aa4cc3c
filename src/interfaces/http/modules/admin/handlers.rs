//! Operator queues: sessions awaiting settlement and bookings flagged for
//! manual review.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Extension;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::application::SettlementService;
use crate::domain::Actor;
use crate::interfaces::http::common::{ok, ApiResponse, ApiResult};
use crate::interfaces::http::modules::bookings::BookingDto;

#[derive(Clone)]
pub struct AdminAppState {
    pub settlement: Arc<SettlementService>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SettlementQuery {
    pub station_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/settlements",
    tag = "Settlement",
    params(SettlementQuery),
    responses(
        (status = 200, description = "Completed sessions without a price, oldest first", body = ApiResponse<Vec<BookingDto>>),
        (status = 403, description = "Operator role required")
    )
)]
pub async fn list_awaiting_settlement(
    State(state): State<AdminAppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<SettlementQuery>,
) -> ApiResult<Vec<BookingDto>> {
    let queue = state
        .settlement
        .list_awaiting_settlement(&actor, query.station_id.as_deref())
        .await?;
    ok(queue.into_iter().map(BookingDto::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/reviews",
    tag = "Settlement",
    responses(
        (status = 200, description = "Bookings flagged for manual review", body = ApiResponse<Vec<BookingDto>>),
        (status = 403, description = "Operator role required")
    )
)]
pub async fn list_flagged(
    State(state): State<AdminAppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Vec<BookingDto>> {
    let flagged = state.settlement.list_flagged(&actor).await?;
    ok(flagged.into_iter().map(BookingDto::from).collect())
}
