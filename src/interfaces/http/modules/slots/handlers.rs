//! Slot availability handler

use std::sync::Arc;

use axum::extract::State;

use crate::application::SlotGrid;
use crate::interfaces::http::common::{ok, ApiResponse, ApiResult, ValidatedJson};

use super::dto::*;

#[derive(Clone)]
pub struct SlotAppState {
    pub grid: Arc<SlotGrid>,
}

#[utoipa::path(
    post,
    path = "/api/v1/slots/query",
    tag = "Slots",
    request_body = SlotQueryRequest,
    responses(
        (status = 200, description = "Buckets of the day in time order", body = ApiResponse<Vec<SlotDto>>),
        (status = 400, description = "Past date or outside the booking window"),
        (status = 404, description = "Unknown station or charger type")
    )
)]
pub async fn query_slots(
    State(state): State<SlotAppState>,
    ValidatedJson(request): ValidatedJson<SlotQueryRequest>,
) -> ApiResult<Vec<SlotDto>> {
    let slots = state
        .grid
        .list_slots(&request.station_id, &request.charger_type, request.date)
        .await?;
    ok(slots.into_iter().map(SlotDto::from).collect())
}
