//! Slot availability DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::SlotAvailability;

use super::super::bookings::format_time;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SlotQueryRequest {
    #[validate(length(min = 1, max = 64))]
    pub station_id: String,
    #[validate(length(min = 1, max = 32))]
    pub charger_type: String,
    /// Local date (YYYY-MM-DD)
    pub date: NaiveDate,
}

/// Availability of one bucket
#[derive(Debug, Serialize, ToSchema)]
pub struct SlotDto {
    #[schema(example = "10:00")]
    pub time: String,
    pub available: u32,
    pub total: u32,
}

impl From<SlotAvailability> for SlotDto {
    fn from(s: SlotAvailability) -> Self {
        Self {
            time: format_time(s.time),
            available: s.available_count,
            total: s.total_count,
        }
    }
}
