//! Admin settlement
//!
//! Operators price completed sessions at stations without an up-front
//! price. Settlement happens once per booking.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::booking::{Booking, BookingEvent, PaymentStatus};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::{Actor, DomainError, DomainResult};
use crate::shared::time::SharedClock;

use super::booking::{apply_event, check_version};

/// Input of [`SettlementService::set_amount`]
#[derive(Debug, Clone)]
pub struct SetAmount {
    pub amount_npr: Decimal,
    pub actual_duration_minutes: Option<u32>,
    pub notes: Option<String>,
}

pub struct SettlementService {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
}

impl SettlementService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, clock: SharedClock) -> Self {
        Self { repos, clock }
    }

    async fn load(&self, booking_id: &str) -> DomainResult<Booking> {
        self.repos
            .bookings()
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| DomainError::booking_not_found(booking_id))
    }

    /// Assign the final amount of a completed session and open its payment.
    pub async fn set_amount(
        &self,
        booking_id: &str,
        actor: &Actor,
        input: SetAmount,
        expected_version: Option<i32>,
    ) -> DomainResult<Booking> {
        actor.require_operator()?;
        validate_amount(input.amount_npr)?;

        let mut booking = self.load(booking_id).await?;
        check_version(&booking, expected_version)?;

        if booking.admin_amount_set || booking.payment_status == PaymentStatus::Paid {
            return Err(DomainError::AlreadyPriced(booking.booking_id));
        }
        if !booking.charging_completed {
            return Err(DomainError::InvalidState(format!(
                "booking {} has not been marked charging-complete",
                booking.booking_id
            )));
        }

        let now = self.clock.now();
        apply_event(&mut booking, BookingEvent::Settle, now)?;
        booking.amount_npr = Some(input.amount_npr);
        booking.admin_amount_set = true;
        booking.admin_set_amount_at = Some(now);
        booking.actual_duration_minutes = input.actual_duration_minutes;
        booking.settlement_notes = input.notes.filter(|n| !n.trim().is_empty());

        let stored = match self.repos.bookings().update(&booking).await {
            Ok(stored) => stored,
            Err(DomainError::Conflict(msg)) => {
                // Another operator may have won the race
                let current = self.load(booking_id).await?;
                if current.admin_amount_set {
                    return Err(DomainError::AlreadyPriced(current.booking_id));
                }
                return Err(DomainError::Conflict(msg));
            }
            Err(e) => return Err(e),
        };

        info!(
            booking_id,
            amount_npr = %input.amount_npr,
            operator = %actor.user_id,
            "Settlement amount set"
        );
        Ok(stored)
    }

    /// Completed sessions still waiting for a price, oldest first
    pub async fn list_awaiting_settlement(
        &self,
        actor: &Actor,
        station_id: Option<&str>,
    ) -> DomainResult<Vec<Booking>> {
        actor.require_operator()?;
        self.repos.bookings().find_awaiting_settlement(station_id).await
    }

    /// Bookings flagged for manual review
    pub async fn list_flagged(&self, actor: &Actor) -> DomainResult<Vec<Booking>> {
        actor.require_operator()?;
        self.repos.bookings().find_flagged().await
    }
}

fn validate_amount(amount: Decimal) -> DomainResult<()> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::Validation("amount_npr must be positive".into()));
    }
    if amount.normalize().scale() > 2 {
        return Err(DomainError::Validation(
            "amount_npr must have at most two decimal places".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{date, fixture, time};
    use super::*;
    use crate::domain::booking::BookingStatus;
    use crate::shared::time::Clock;

    fn npr(v: i64) -> SetAmount {
        SetAmount {
            amount_npr: Decimal::from(v),
            actual_duration_minutes: Some(45),
            notes: Some("overstayed".into()),
        }
    }

    #[tokio::test]
    async fn settlement_opens_payment() {
        let f = fixture();
        let b = f.completed_booking("alice").await;
        let op = Actor::operator("op");

        let priced = f.settlement.set_amount(&b.booking_id, &op, npr(250), None).await.unwrap();
        assert_eq!(priced.status, BookingStatus::Completed);
        assert_eq!(priced.payment_status, PaymentStatus::Pending);
        assert_eq!(priced.amount_paisa(), Some(25000));
        assert!(priced.admin_amount_set);
        assert_eq!(priced.admin_set_amount_at, Some(f.clock.now()));
        assert_eq!(priced.actual_duration_minutes, Some(45));
        assert_eq!(priced.settlement_notes.as_deref(), Some("overstayed"));
    }

    #[tokio::test]
    async fn settlement_is_single_shot() {
        let f = fixture();
        let b = f.completed_booking("alice").await;
        let op = Actor::operator("op");

        f.settlement.set_amount(&b.booking_id, &op, npr(250), None).await.unwrap();
        let err = f
            .settlement
            .set_amount(&b.booking_id, &op, npr(900), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyPriced(_)));
        assert_eq!(f.reload(&b.booking_id).await.amount_npr, Some(Decimal::from(250)));
    }

    #[tokio::test]
    async fn settlement_requires_completed_charging() {
        let f = fixture();
        let b = f.book("alice", "S2", date(2024, 6, 1), time(10, 0)).await;
        assert!(matches!(
            f.settlement
                .set_amount(&b.booking_id, &Actor::operator("op"), npr(250), None)
                .await,
            Err(DomainError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn rejects_bad_amounts_and_users() {
        let f = fixture();
        let b = f.completed_booking("alice").await;
        let op = Actor::operator("op");

        assert!(matches!(
            f.settlement.set_amount(&b.booking_id, &op, npr(0), None).await,
            Err(DomainError::Validation(_))
        ));
        let fractional = SetAmount {
            amount_npr: Decimal::new(12345, 3),
            actual_duration_minutes: None,
            notes: None,
        };
        assert!(matches!(
            f.settlement.set_amount(&b.booking_id, &op, fractional, None).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            f.settlement
                .set_amount(&b.booking_id, &Actor::user("alice"), npr(250), None)
                .await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn deferred_booking_can_be_settled() {
        let f = fixture();
        let b = f.book("alice", "S1", date(2024, 6, 1), time(10, 0)).await;
        let alice = Actor::user("alice");
        let op = Actor::operator("op");

        f.payments.pay_later(&b.booking_id, &alice).await.unwrap();
        f.bookings.mark_charging_completed(&b.booking_id, &op, None).await.unwrap();

        let priced = f.settlement.set_amount(&b.booking_id, &op, npr(300), None).await.unwrap();
        assert_eq!(priced.payment_status, PaymentStatus::Pending);
        assert_eq!(priced.amount_paisa(), Some(30000));
    }

    #[tokio::test]
    async fn awaiting_settlement_queue() {
        let f = fixture();
        let op = Actor::operator("op");
        let done = f.completed_booking("alice").await;
        f.book("bob", "S2", date(2024, 6, 1), time(11, 0)).await;

        let queue = f.settlement.list_awaiting_settlement(&op, None).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].booking_id, done.booking_id);
        assert!(f
            .settlement
            .list_awaiting_settlement(&op, Some("S1"))
            .await
            .unwrap()
            .is_empty());

        f.settlement.set_amount(&done.booking_id, &op, npr(100), None).await.unwrap();
        assert!(f.settlement.list_awaiting_settlement(&op, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prepaid_completion_skips_the_queue() {
        let f = fixture();
        let op = Actor::operator("op");
        let b = f.book("alice", "S1", date(2024, 6, 1), time(10, 0)).await;
        let init = f.payments.initiate(&b.booking_id, &Actor::user("alice")).await.unwrap();
        f.gateway.complete(&init.gateway_reference, "T1");
        f.payments.verify_identifier("T1", 500).await.unwrap();

        let done = f.bookings.mark_charging_completed(&b.booking_id, &op, None).await.unwrap();
        assert_eq!(done.payment_status, PaymentStatus::Paid);
        assert!(f.settlement.list_awaiting_settlement(&op, None).await.unwrap().is_empty());
    }
}
