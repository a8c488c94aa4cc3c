//! Booking repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Booking, PaymentStatus};
use crate::shared::errors::DomainResult;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Save a new booking
    async fn insert(&self, booking: &Booking) -> DomainResult<()>;

    /// Persist `booking` if the stored row still has `booking.version`.
    ///
    /// Returns the stored booking with its version bumped. A version
    /// mismatch, or a `gateway_txn_id` already recorded on another booking,
    /// yields `DomainError::Conflict`.
    async fn update(&self, booking: &Booking) -> DomainResult<Booking>;

    async fn find_by_id(&self, booking_id: &str) -> DomainResult<Option<Booking>>;

    async fn find_by_gateway_reference(&self, reference: &str) -> DomainResult<Option<Booking>>;

    async fn find_by_gateway_txn_id(&self, txn_id: &str) -> DomainResult<Option<Booking>>;

    /// All bookings of a user, newest first
    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<Booking>>;

    /// Bookings with the given payment status, optionally for one user, newest first
    async fn find_by_payment_status(
        &self,
        user_id: Option<&str>,
        status: PaymentStatus,
    ) -> DomainResult<Vec<Booking>>;

    /// `charging_completed = true` and `admin_amount_set = false`, oldest completion first
    async fn find_awaiting_settlement(&self, station_id: Option<&str>) -> DomainResult<Vec<Booking>>;

    /// Paid bookings whose payment was verified within `[from, to]`, newest first
    async fn find_paid_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>>;

    /// `pending_payment` bookings created before `cutoff`
    async fn find_pending_payment_before(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<Booking>>;

    /// Bookings carrying a manual review flag
    async fn find_flagged(&self) -> DomainResult<Vec<Booking>>;
}
