//! Booking DTOs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::{Booking, PaymentData, Urgency};

/// Request to book a charger.
///
/// Omitting `date` and `time` requests auto-booking of the soonest free
/// slot, which needs urgency `high` or `critical`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, max = 64))]
    pub station_id: String,
    #[validate(length(min = 1, max = 32))]
    pub charger_type: String,
    /// Local date (YYYY-MM-DD)
    pub date: Option<NaiveDate>,
    /// Bucket start (HH:MM)
    #[schema(example = "10:00")]
    pub time: Option<String>,
    /// low | medium | high | critical
    #[serde(default)]
    #[schema(value_type = String, example = "medium")]
    pub urgency: Urgency,
}

/// Operator settlement of a completed session
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetAmountRequest {
    /// Final price in NPR, at most two decimal places
    #[schema(value_type = String, example = "250.00")]
    pub amount_npr: Decimal,
    #[serde(alias = "actual_duration_minutes")]
    #[validate(range(max = 1440))]
    pub duration_minutes: Option<u32>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserQuery {
    /// Defaults to the caller
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentDataDto {
    pub gateway_txn_id: String,
    pub verified_at: DateTime<Utc>,
}

impl From<PaymentData> for PaymentDataDto {
    fn from(p: PaymentData) -> Self {
        Self {
            gateway_txn_id: p.gateway_txn_id,
            verified_at: p.verified_at,
        }
    }
}

/// Booking API representation
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingDto {
    pub booking_id: String,
    pub user_id: String,
    pub station_id: String,
    pub charger_type: String,
    pub booking_date: NaiveDate,
    #[schema(value_type = Option<String>, example = "10:00")]
    pub booking_time: Option<String>,
    pub status: String,
    pub payment_status: String,
    #[schema(value_type = Option<String>)]
    pub amount_npr: Option<Decimal>,
    pub amount_paisa: Option<i64>,
    pub charging_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charging_completed_at: Option<DateTime<Utc>>,
    pub admin_amount_set: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_set_amount_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_notes: Option<String>,
    pub payment_data: Option<PaymentDataDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_flag: Option<String>,
    pub auto_booked: bool,
    pub urgency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Send back in `If-Match` to guard updates
    pub version: i32,
}

impl From<Booking> for BookingDto {
    fn from(b: Booking) -> Self {
        let amount_paisa = b.amount_paisa();
        Self {
            booking_id: b.booking_id,
            user_id: b.user_id,
            station_id: b.station_id,
            charger_type: b.charger_type,
            booking_date: b.booking_date,
            booking_time: b.booking_time.map(format_time),
            status: b.status.to_string(),
            payment_status: b.payment_status.to_string(),
            amount_npr: b.amount_npr,
            amount_paisa,
            charging_completed: b.charging_completed,
            charging_completed_at: b.charging_completed_at,
            admin_amount_set: b.admin_amount_set,
            admin_set_amount_at: b.admin_set_amount_at,
            actual_duration_minutes: b.actual_duration_minutes,
            settlement_notes: b.settlement_notes,
            payment_data: b.payment_data.map(PaymentDataDto::from),
            review_flag: b.review_flag,
            auto_booked: b.auto_booked,
            urgency: b.urgency.as_str().to_string(),
            created_at: b.created_at,
            updated_at: b.updated_at,
            version: b.version,
        }
    }
}

pub fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_time_formats() {
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert_eq!(parse_time("10:00"), Some(ten));
        assert_eq!(parse_time(" 10:00:00 "), Some(ten));
        assert_eq!(parse_time("25:00"), None);
        assert_eq!(format_time(ten), "10:00");
    }
}
