//! Booking transition table
//!
//! Every change of `status` / `payment_status` goes through [`transition`].
//! Anything not listed here is rejected with `InvalidState`.

use std::fmt;

use super::model::{BookingStatus, PaymentStatus};
use crate::shared::errors::{DomainError, DomainResult};

use BookingStatus as S;
use PaymentStatus as P;

/// Something that happened to a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    /// A gateway session was opened for the booking
    PaymentInitiated,
    /// The gateway confirmed the payment
    PaymentSucceeded,
    /// The gateway reported a failed, expired or abandoned payment
    PaymentFailed,
    /// Driver chose to pay at the station
    PayLater,
    /// `pending_payment` booking timed out
    Expire,
    /// Driver or operator cancelled
    Cancel,
    /// Operator started the charging session
    StartSession,
    /// Operator marked the physical session complete
    MarkCompleted,
    /// Operator assigned the final amount
    Settle,
}

impl BookingEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentInitiated => "payment_initiated",
            Self::PaymentSucceeded => "payment_succeeded",
            Self::PaymentFailed => "payment_failed",
            Self::PayLater => "pay_later",
            Self::Expire => "expire",
            Self::Cancel => "cancel",
            Self::StartSession => "start_session",
            Self::MarkCompleted => "mark_completed",
            Self::Settle => "settle",
        }
    }
}

impl fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up the next (status, payment_status) pair.
pub fn transition(
    status: BookingStatus,
    payment: PaymentStatus,
    event: BookingEvent,
) -> DomainResult<(BookingStatus, PaymentStatus)> {
    use BookingEvent as E;

    let unpaid = matches!(payment, P::None | P::Pending | P::Failed);

    let next = match (status, payment, event) {
        (S::PendingPayment, _, E::PaymentInitiated) if unpaid => Some((S::PendingPayment, P::Pending)),
        (S::Completed, _, E::PaymentInitiated) if unpaid => Some((S::Completed, P::Pending)),

        (S::PendingPayment, _, E::PaymentSucceeded) if unpaid => Some((S::Confirmed, P::Paid)),
        (S::Completed, P::Pending | P::Failed, E::PaymentSucceeded) => Some((S::Completed, P::Paid)),

        (S::PendingPayment, _, E::PaymentFailed) if unpaid => Some((S::PendingPayment, P::Failed)),
        (S::Completed, P::Pending | P::Failed, E::PaymentFailed) => Some((S::Completed, P::Failed)),

        (S::PendingPayment, _, E::PayLater) if unpaid => Some((S::Confirmed, P::Deferred)),

        // An abandoned gateway session is no longer payable
        (S::PendingPayment, P::Pending, E::Expire | E::Cancel) => Some((S::Cancelled, P::None)),
        (S::PendingPayment, p, E::Expire | E::Cancel) if p != P::Paid => Some((S::Cancelled, p)),
        (S::Confirmed, p @ (P::None | P::Deferred), E::Cancel) => Some((S::Cancelled, p)),

        (S::Confirmed, p, E::StartSession) => Some((S::InProgress, p)),

        (S::Confirmed | S::InProgress, p, E::MarkCompleted) => Some((S::Completed, p)),

        (S::Completed, P::None | P::Deferred | P::Failed | P::Pending, E::Settle) => {
            Some((S::Completed, P::Pending))
        }

        _ => None,
    };

    next.ok_or_else(|| {
        DomainError::InvalidState(format!(
            "cannot {} a booking that is {} with payment {}",
            event, status, payment
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingEvent as E;

    fn ok(s: S, p: P, e: E) -> (S, P) {
        transition(s, p, e).unwrap()
    }

    fn rejected(s: S, p: P, e: E) -> bool {
        matches!(transition(s, p, e), Err(DomainError::InvalidState(_)))
    }

    #[test]
    fn pay_success_confirms_pending_payment() {
        assert_eq!(ok(S::PendingPayment, P::Pending, E::PaymentSucceeded), (S::Confirmed, P::Paid));
        assert_eq!(ok(S::PendingPayment, P::None, E::PaymentSucceeded), (S::Confirmed, P::Paid));
    }

    #[test]
    fn pay_later_defers() {
        assert_eq!(ok(S::PendingPayment, P::None, E::PayLater), (S::Confirmed, P::Deferred));
        assert!(rejected(S::Confirmed, P::Deferred, E::PayLater));
    }

    #[test]
    fn user_cancel_only_while_unpaid_or_deferred() {
        assert_eq!(ok(S::Confirmed, P::None, E::Cancel), (S::Cancelled, P::None));
        assert_eq!(ok(S::Confirmed, P::Deferred, E::Cancel), (S::Cancelled, P::Deferred));
        assert!(rejected(S::Confirmed, P::Paid, E::Cancel));
        assert!(rejected(S::InProgress, P::None, E::Cancel));
        assert!(rejected(S::Completed, P::Deferred, E::Cancel));
        assert!(rejected(S::Cancelled, P::None, E::Cancel));
    }

    #[test]
    fn pending_payment_can_expire_or_cancel() {
        assert_eq!(ok(S::PendingPayment, P::None, E::Cancel), (S::Cancelled, P::None));
        assert_eq!(ok(S::PendingPayment, P::Failed, E::Expire), (S::Cancelled, P::Failed));
        assert!(rejected(S::PendingPayment, P::Paid, E::Cancel));
        assert!(rejected(S::Confirmed, P::None, E::Expire));
    }

    #[test]
    fn cancelling_an_open_payment_closes_it() {
        assert_eq!(ok(S::PendingPayment, P::Pending, E::Expire), (S::Cancelled, P::None));
        assert_eq!(ok(S::PendingPayment, P::Pending, E::Cancel), (S::Cancelled, P::None));
    }

    #[test]
    fn completion_from_confirmed_or_in_progress() {
        assert_eq!(ok(S::Confirmed, P::Paid, E::StartSession), (S::InProgress, P::Paid));
        assert_eq!(ok(S::Confirmed, P::Deferred, E::MarkCompleted), (S::Completed, P::Deferred));
        assert_eq!(ok(S::InProgress, P::Paid, E::MarkCompleted), (S::Completed, P::Paid));
        assert!(rejected(S::PendingPayment, P::None, E::MarkCompleted));
        assert!(rejected(S::Completed, P::None, E::MarkCompleted));
    }

    #[test]
    fn settlement_reopens_payment() {
        assert_eq!(ok(S::Completed, P::Deferred, E::Settle), (S::Completed, P::Pending));
        assert_eq!(ok(S::Completed, P::None, E::Settle), (S::Completed, P::Pending));
        assert!(rejected(S::Completed, P::Paid, E::Settle));
        assert!(rejected(S::Confirmed, P::None, E::Settle));
    }

    #[test]
    fn settled_booking_can_be_paid() {
        assert_eq!(ok(S::Completed, P::Pending, E::PaymentInitiated), (S::Completed, P::Pending));
        assert_eq!(ok(S::Completed, P::Pending, E::PaymentSucceeded), (S::Completed, P::Paid));
        assert!(rejected(S::Completed, P::Paid, E::PaymentSucceeded));
        assert!(rejected(S::Completed, P::Deferred, E::PaymentSucceeded));
    }

    #[test]
    fn failed_payment_can_be_retried() {
        assert_eq!(ok(S::PendingPayment, P::Pending, E::PaymentFailed), (S::PendingPayment, P::Failed));
        assert_eq!(ok(S::PendingPayment, P::Failed, E::PaymentInitiated), (S::PendingPayment, P::Pending));
    }

    #[test]
    fn terminal_states_reject_everything() {
        for e in [
            E::PaymentInitiated,
            E::PaymentSucceeded,
            E::PayLater,
            E::Expire,
            E::Cancel,
            E::StartSession,
            E::MarkCompleted,
            E::Settle,
        ] {
            assert!(rejected(S::Cancelled, P::None, e), "{} accepted on cancelled", e);
        }
    }
}
