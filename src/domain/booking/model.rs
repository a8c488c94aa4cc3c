//! Booking domain entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::errors::DomainError;

/// Lifecycle status of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Statuses during which the booking holds its slot reservation
    pub fn holds_slot(&self) -> bool {
        matches!(
            self,
            Self::PendingPayment | Self::Confirmed | Self::InProgress
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "confirmed" => Ok(Self::Confirmed),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::Validation(format!(
                "unknown booking status '{}'",
                other
            ))),
        }
    }
}

/// Payment status of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    None,
    Pending,
    Paid,
    Deferred,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Deferred => "deferred",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "deferred" => Ok(Self::Deferred),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::Validation(format!(
                "unknown payment status '{}'",
                other
            ))),
        }
    }
}

/// How urgently the driver needs a charger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Only high-urgency requests may skip date/time selection
    pub fn allows_auto_booking(&self) -> bool {
        *self >= Self::High
    }
}

impl FromStr for Urgency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(DomainError::Validation(format!(
                "unknown urgency '{}'",
                other
            ))),
        }
    }
}

/// Verified gateway payment recorded on a booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentData {
    pub gateway_txn_id: String,
    pub verified_at: DateTime<Utc>,
}

/// Convert a rupee amount to integer paisa.
pub fn npr_to_paisa(amount_npr: Decimal) -> i64 {
    (amount_npr * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Charger booking
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    /// Immutable, globally unique (`BK-YYYYMMDD-XXXXXXXX`)
    pub booking_id: String,
    pub user_id: String,
    pub station_id: String,
    pub charger_type: String,
    pub booking_date: NaiveDate,
    pub booking_time: Option<NaiveTime>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Price in rupees; `None` until priced
    pub amount_npr: Option<Decimal>,
    pub charging_completed: bool,
    pub charging_completed_at: Option<DateTime<Utc>>,
    pub admin_amount_set: bool,
    pub admin_set_amount_at: Option<DateTime<Utc>>,
    pub actual_duration_minutes: Option<u32>,
    pub settlement_notes: Option<String>,
    pub payment_data: Option<PaymentData>,
    /// Gateway-issued reference registered at payment initiation
    pub gateway_reference: Option<String>,
    /// Slot reservation held by this booking
    pub reservation_token: Option<Uuid>,
    /// Reason the booking needs manual operator review
    pub review_flag: Option<String>,
    pub auto_booked: bool,
    pub urgency: Urgency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped on every persisted update
    pub version: i32,
}

impl Booking {
    /// Generate a new booking id for a booking created at `now`.
    pub fn generate_id(now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        format!("BK-{}-{}", now.format("%Y%m%d"), suffix)
    }

    /// Always derived from `amount_npr`.
    pub fn amount_paisa(&self) -> Option<i64> {
        self.amount_npr.map(npr_to_paisa)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn gateway_txn_id(&self) -> Option<&str> {
        self.payment_data.as_ref().map(|p| p.gateway_txn_id.as_str())
    }

    /// Cheap invariant check used by repositories and tests.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        if self.payment_status == PaymentStatus::Paid && self.payment_data.is_none() {
            return Err(DomainError::InvalidState(format!(
                "booking {} is paid without a gateway transaction",
                self.booking_id
            )));
        }
        if self.admin_amount_set && !self.charging_completed {
            return Err(DomainError::InvalidState(format!(
                "booking {} priced before charging completed",
                self.booking_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn paisa_is_derived_from_rupees() {
        assert_eq!(npr_to_paisa(Decimal::from(250)), 25000);
        assert_eq!(npr_to_paisa(Decimal::from_str("5.00").unwrap()), 500);
        assert_eq!(npr_to_paisa(Decimal::from_str("12.345").unwrap()), 1234);
    }

    #[test]
    fn status_strings_are_closed() {
        assert_eq!(
            BookingStatus::from_str("pending_payment").unwrap(),
            BookingStatus::PendingPayment
        );
        assert!(BookingStatus::from_str("Confirmed").is_err());
        assert!(PaymentStatus::from_str("refunded").is_err());
        for status in [
            PaymentStatus::None,
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Deferred,
            PaymentStatus::Failed,
        ] {
            assert_eq!(PaymentStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn only_high_urgency_auto_books() {
        assert!(!Urgency::Low.allows_auto_booking());
        assert!(!Urgency::Medium.allows_auto_booking());
        assert!(Urgency::High.allows_auto_booking());
        assert!(Urgency::Critical.allows_auto_booking());
    }

    #[test]
    fn generated_ids_follow_format() {
        let now = DateTime::parse_from_rfc3339("2024-06-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = Booking::generate_id(now);
        assert!(id.starts_with("BK-20240601-"));
        assert_eq!(id.len(), "BK-20240601-".len() + 8);
        assert_ne!(id, Booking::generate_id(now));
    }
}
