//! Booking lifecycle service
//!
//! The only place that creates bookings and moves them between lifecycle
//! states. Every mutation is checked against the transition table and
//! persisted under the booking's version.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{info, warn};

use crate::domain::booking::{
    transition, Booking, BookingEvent, BookingStatus, PaymentStatus, Urgency,
};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::station::StationCatalog;
use crate::domain::{Actor, DomainError, DomainResult};
use crate::shared::time::SharedClock;

use super::SlotGrid;

/// Input of [`BookingService::create_booking`]
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub user_id: String,
    pub station_id: String,
    pub charger_type: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub urgency: Urgency,
}

/// Move `booking` along `event`, stamping `updated_at`.
pub(crate) fn apply_event(
    booking: &mut Booking,
    event: BookingEvent,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    let (status, payment_status) = transition(booking.status, booking.payment_status, event)?;
    booking.status = status;
    booking.payment_status = payment_status;
    booking.updated_at = now;
    Ok(())
}

pub(crate) fn check_version(booking: &Booking, expected: Option<i32>) -> DomainResult<()> {
    match expected {
        Some(v) if v != booking.version => Err(DomainError::Conflict(format!(
            "booking {} is at version {}, not {}",
            booking.booking_id, booking.version, v
        ))),
        _ => Ok(()),
    }
}

pub struct BookingService {
    repos: Arc<dyn RepositoryProvider>,
    grid: Arc<SlotGrid>,
    catalog: Arc<dyn StationCatalog>,
    clock: SharedClock,
}

impl BookingService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        grid: Arc<SlotGrid>,
        catalog: Arc<dyn StationCatalog>,
        clock: SharedClock,
    ) -> Self {
        Self {
            repos,
            grid,
            catalog,
            clock,
        }
    }

    async fn load(&self, booking_id: &str) -> DomainResult<Booking> {
        self.repos
            .bookings()
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| DomainError::booking_not_found(booking_id))
    }

    /// Reserve a slot and create the booking holding it.
    ///
    /// Without date and time the soonest free bucket is reserved, which is
    /// only allowed for high-urgency requests. If the booking cannot be
    /// stored the reservation is given back.
    pub async fn create_booking(&self, req: CreateBooking) -> DomainResult<Booking> {
        let auto_booked = match (req.date, req.time) {
            (Some(_), Some(_)) => false,
            (None, None) if req.urgency.allows_auto_booking() => true,
            (None, None) => {
                return Err(DomainError::Validation(
                    "date and time are required unless urgency is high or critical".into(),
                ))
            }
            _ => {
                return Err(DomainError::Validation(
                    "date and time must be given together".into(),
                ))
            }
        };

        let station = self
            .catalog
            .find_station(&req.station_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Station",
                field: "id",
                value: req.station_id.clone(),
            })?;

        let token = match (req.date, req.time) {
            (Some(date), Some(time)) => {
                self.grid
                    .reserve(&req.station_id, &req.charger_type, date, time)
                    .await?
            }
            _ => {
                self.grid
                    .reserve_soonest(&req.station_id, &req.charger_type)
                    .await?
            }
        };

        let now = self.clock.now();
        let status = if station.price_per_slot_npr.is_some() {
            BookingStatus::PendingPayment
        } else {
            BookingStatus::Confirmed
        };

        let booking = Booking {
            booking_id: Booking::generate_id(now),
            user_id: req.user_id,
            station_id: station.id.clone(),
            charger_type: token.slot.charger_type.clone(),
            booking_date: token.slot.date,
            booking_time: Some(token.slot.time),
            status,
            payment_status: PaymentStatus::None,
            amount_npr: station.price_per_slot_npr,
            charging_completed: false,
            charging_completed_at: None,
            admin_amount_set: false,
            admin_set_amount_at: None,
            actual_duration_minutes: None,
            settlement_notes: None,
            payment_data: None,
            gateway_reference: None,
            reservation_token: Some(token.id),
            review_flag: None,
            auto_booked,
            urgency: req.urgency,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        if let Err(e) = self.repos.bookings().insert(&booking).await {
            warn!(booking_id = %booking.booking_id, error = %e, "Booking insert failed, releasing slot");
            self.grid.release_quietly(token.id, &booking.booking_id).await;
            return Err(e);
        }

        metrics::counter!("bookings_created_total", "auto" => auto_booked.to_string()).increment(1);
        info!(
            booking_id = %booking.booking_id,
            user_id = %booking.user_id,
            station_id = %booking.station_id,
            slot = %token.slot,
            status = %booking.status,
            auto_booked,
            "Booking created"
        );
        Ok(booking)
    }

    /// Persist a transition and give back the slot once the booking no
    /// longer holds it.
    async fn commit(&self, booking: Booking) -> DomainResult<Booking> {
        let stored = self.repos.bookings().update(&booking).await?;
        if !stored.status.holds_slot() {
            if let Some(token) = stored.reservation_token {
                self.grid.release_quietly(token, &stored.booking_id).await;
            }
        }
        Ok(stored)
    }

    pub async fn get(&self, booking_id: &str, actor: &Actor) -> DomainResult<Booking> {
        let booking = self.load(booking_id).await?;
        actor.ensure_can_access(&booking)?;
        Ok(booking)
    }

    pub async fn list_for_user(&self, user_id: &str, actor: &Actor) -> DomainResult<Vec<Booking>> {
        actor.ensure_is_self_or_operator(user_id)?;
        self.repos.bookings().find_by_user(user_id).await
    }

    /// `confirmed` and `in_progress` bookings of a user
    pub async fn list_active(&self, user_id: &str, actor: &Actor) -> DomainResult<Vec<Booking>> {
        Ok(self
            .list_for_user(user_id, actor)
            .await?
            .into_iter()
            .filter(|b| matches!(b.status, BookingStatus::Confirmed | BookingStatus::InProgress))
            .collect())
    }

    /// Cancel a booking and release its slot.
    ///
    /// `expected_version`, when given, must match the stored version.
    pub async fn cancel(
        &self,
        booking_id: &str,
        actor: &Actor,
        expected_version: Option<i32>,
    ) -> DomainResult<Booking> {
        let mut booking = self.load(booking_id).await?;
        actor.ensure_can_access(&booking)?;
        check_version(&booking, expected_version)?;

        apply_event(&mut booking, BookingEvent::Cancel, self.clock.now())?;
        let stored = self.commit(booking).await?;

        info!(booking_id, actor = %actor.user_id, "Booking cancelled");
        Ok(stored)
    }

    /// Operator starts the physical charging session.
    pub async fn start_session(
        &self,
        booking_id: &str,
        actor: &Actor,
        expected_version: Option<i32>,
    ) -> DomainResult<Booking> {
        actor.require_operator()?;
        let mut booking = self.load(booking_id).await?;
        check_version(&booking, expected_version)?;

        apply_event(&mut booking, BookingEvent::StartSession, self.clock.now())?;
        let stored = self.commit(booking).await?;

        info!(booking_id, "Charging session started");
        Ok(stored)
    }

    /// Operator marks the physical session over; the slot is released and
    /// the booking is kept for settlement.
    pub async fn mark_charging_completed(
        &self,
        booking_id: &str,
        actor: &Actor,
        expected_version: Option<i32>,
    ) -> DomainResult<Booking> {
        actor.require_operator()?;
        let mut booking = self.load(booking_id).await?;
        check_version(&booking, expected_version)?;

        let now = self.clock.now();
        apply_event(&mut booking, BookingEvent::MarkCompleted, now)?;
        booking.charging_completed = true;
        booking.charging_completed_at = Some(now);
        let stored = self.commit(booking).await?;

        info!(booking_id, payment_status = %stored.payment_status, "Charging marked completed");
        Ok(stored)
    }

    /// Cancel a `pending_payment` booking whose payment window elapsed.
    pub async fn expire(&self, mut booking: Booking) -> DomainResult<Booking> {
        apply_event(&mut booking, BookingEvent::Expire, self.clock.now())?;
        let stored = self.commit(booking).await?;

        metrics::counter!("bookings_expired_total").increment(1);
        info!(booking_id = %stored.booking_id, "Pending payment booking expired");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{date, fixture, time};
    use super::*;
    use crate::shared::time::Clock;

    fn auto(user: &str, station: &str, urgency: Urgency) -> CreateBooking {
        CreateBooking {
            user_id: user.into(),
            station_id: station.into(),
            charger_type: "Type2".into(),
            date: None,
            time: None,
            urgency,
        }
    }

    #[tokio::test]
    async fn priced_station_starts_pending_payment() {
        let f = fixture();
        let b = f.book("alice", "S1", date(2024, 6, 1), time(10, 0)).await;
        assert_eq!(b.status, BookingStatus::PendingPayment);
        assert_eq!(b.payment_status, PaymentStatus::None);
        assert_eq!(b.amount_paisa(), Some(500));
        assert!(b.booking_id.starts_with("BK-20240601-"));
        assert!(!b.auto_booked);
    }

    #[tokio::test]
    async fn unpriced_station_starts_confirmed() {
        let f = fixture();
        let b = f.book("alice", "S2", date(2024, 6, 1), time(10, 0)).await;
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.amount_npr, None);
    }

    #[tokio::test]
    async fn second_booking_of_full_bucket_fails() {
        let f = fixture();
        f.book("alice", "S1", date(2024, 6, 1), time(10, 0)).await;
        let err = f
            .bookings
            .create_booking(CreateBooking {
                user_id: "bob".into(),
                station_id: "S1".into(),
                charger_type: "Type2".into(),
                date: Some(date(2024, 6, 1)),
                time: Some(time(10, 0)),
                urgency: Urgency::Medium,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SlotUnavailable(_)));
        assert!(f.repos.bookings().find_by_user("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn auto_booking_needs_high_urgency() {
        let f = fixture();
        assert!(matches!(
            f.bookings.create_booking(auto("alice", "S1", Urgency::Medium)).await,
            Err(DomainError::Validation(_))
        ));

        let b = f.bookings.create_booking(auto("alice", "S1", Urgency::Critical)).await.unwrap();
        assert!(b.auto_booked);
        assert_eq!(b.booking_date, date(2024, 6, 1));
        assert_eq!(b.booking_time, Some(time(8, 0)));
    }

    #[tokio::test]
    async fn half_specified_slot_is_rejected() {
        let f = fixture();
        let mut req = auto("alice", "S1", Urgency::High);
        req.date = Some(date(2024, 6, 1));
        assert!(matches!(
            f.bookings.create_booking(req).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn cancel_releases_the_slot() {
        let f = fixture();
        let b = f.book("alice", "S1", date(2024, 6, 1), time(10, 0)).await;
        let cancelled = f
            .bookings
            .cancel(&b.booking_id, &Actor::user("alice"), None)
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(!f.repos.slots().is_held(b.reservation_token.unwrap()).await.unwrap());

        // The bucket is free again
        f.book("bob", "S1", date(2024, 6, 1), time(10, 0)).await;
    }

    #[tokio::test]
    async fn cancel_of_paid_booking_is_invalid() {
        let f = fixture();
        let b = f.book("alice", "S1", date(2024, 6, 1), time(10, 0)).await;
        let mut paid = b.clone();
        paid.status = BookingStatus::Confirmed;
        paid.payment_status = PaymentStatus::Paid;
        paid.payment_data = Some(crate::domain::PaymentData {
            gateway_txn_id: "T1".into(),
            verified_at: f.clock.now(),
        });
        f.repos.bookings().update(&paid).await.unwrap();

        assert!(matches!(
            f.bookings.cancel(&b.booking_id, &Actor::user("alice"), None).await,
            Err(DomainError::InvalidState(_))
        ));
        assert!(f.repos.slots().is_held(b.reservation_token.unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn only_owner_or_operator_cancels() {
        let f = fixture();
        let b = f.book("alice", "S2", date(2024, 6, 1), time(10, 0)).await;
        assert!(matches!(
            f.bookings.cancel(&b.booking_id, &Actor::user("mallory"), None).await,
            Err(DomainError::Forbidden(_))
        ));
        f.bookings
            .cancel(&b.booking_id, &Actor::operator("op"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let f = fixture();
        let b = f.book("alice", "S2", date(2024, 6, 1), time(10, 0)).await;
        f.bookings
            .start_session(&b.booking_id, &Actor::operator("op"), Some(0))
            .await
            .unwrap();

        let err = f
            .bookings
            .cancel(&b.booking_id, &Actor::user("alice"), Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(f.reload(&b.booking_id).await.status, BookingStatus::InProgress);
    }

    #[tokio::test]
    async fn mark_completed_releases_slot_and_keeps_booking() {
        let f = fixture();
        let b = f.book("alice", "S2", date(2024, 6, 1), time(10, 0)).await;
        let token = b.reservation_token.unwrap();

        let done = f
            .bookings
            .mark_charging_completed(&b.booking_id, &Actor::operator("op"), None)
            .await
            .unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
        assert!(done.charging_completed);
        assert!(done.charging_completed_at.is_some());
        assert!(!f.repos.slots().is_held(token).await.unwrap());

        let slots = f.grid.list_slots("S2", "Type2", date(2024, 6, 1)).await.unwrap();
        let ten = slots.iter().find(|s| s.time == time(10, 0)).unwrap();
        assert_eq!(ten.available_count, 2);

        assert!(matches!(
            f.bookings
                .mark_charging_completed(&b.booking_id, &Actor::operator("op"), None)
                .await,
            Err(DomainError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn users_cannot_complete_sessions() {
        let f = fixture();
        let b = f.book("alice", "S2", date(2024, 6, 1), time(10, 0)).await;
        assert!(matches!(
            f.bookings
                .mark_charging_completed(&b.booking_id, &Actor::user("alice"), None)
                .await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn active_lists_confirmed_and_in_progress() {
        let f = fixture();
        let a = f.book("alice", "S2", date(2024, 6, 1), time(10, 0)).await;
        let b = f.book("alice", "S2", date(2024, 6, 1), time(11, 0)).await;
        f.book("alice", "S1", date(2024, 6, 1), time(12, 0)).await;
        f.bookings
            .cancel(&b.booking_id, &Actor::user("alice"), None)
            .await
            .unwrap();

        let active = f.bookings.list_active("alice", &Actor::user("alice")).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].booking_id, a.booking_id);

        assert!(matches!(
            f.bookings.list_for_user("alice", &Actor::user("bob")).await,
            Err(DomainError::Forbidden(_))
        ));
    }
}
