//! Payment reconciliation
//!
//! Opens gateway sessions and matches gateway results back to bookings.
//! Verification is safe to repeat: a booking already paid answers
//! `AlreadyVerified`, and a transaction id can be recorded on one booking
//! only.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::booking::{transition, Booking, BookingEvent, PaymentData, PaymentStatus};
use crate::domain::payment::{
    CallbackParams, GatewayError, GatewayLookup, GatewayPaymentState, PaymentGateway,
    PaymentIdentifier, PaymentInitiation, PaymentSessionRequest, VerificationOutcome,
    VerificationStatus,
};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::{Actor, DomainError, DomainResult};
use crate::shared::time::SharedClock;

use super::booking::apply_event;

fn outcome(booking: &Booking, status: VerificationStatus) -> VerificationOutcome {
    VerificationOutcome {
        booking_id: booking.booking_id.clone(),
        gateway_txn_id: booking.gateway_txn_id().map(String::from),
        status,
        payment_status: booking.payment_status,
        verified_at: booking.payment_data.as_ref().map(|p| p.verified_at),
    }
}

fn mismatch_error(booking: &Booking, expected: i64, claimed: i64) -> DomainError {
    DomainError::AmountMismatch {
        booking_id: booking.booking_id.clone(),
        expected_paisa: expected,
        claimed_paisa: claimed,
    }
}

fn record_outcome(outcome: &'static str) {
    metrics::counter!("payments_verified_total", "outcome" => outcome).increment(1);
}

pub struct PaymentReconciler {
    repos: Arc<dyn RepositoryProvider>,
    gateway: Arc<dyn PaymentGateway>,
    clock: SharedClock,
    timeout: Duration,
}

impl PaymentReconciler {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        gateway: Arc<dyn PaymentGateway>,
        clock: SharedClock,
        timeout: Duration,
    ) -> Self {
        Self {
            repos,
            gateway,
            clock,
            timeout,
        }
    }

    async fn load(&self, booking_id: &str) -> DomainResult<Booking> {
        self.repos
            .bookings()
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| DomainError::booking_not_found(booking_id))
    }

    /// Run a gateway call under the configured timeout.
    async fn bounded<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        }
    }

    /// Open a gateway session for the booking's current amount.
    ///
    /// The gateway reference is stored on the booking before the payment URL
    /// is handed out. On timeout the booking is left untouched.
    pub async fn initiate(&self, booking_id: &str, actor: &Actor) -> DomainResult<PaymentInitiation> {
        let mut booking = self.load(booking_id).await?;
        actor.ensure_can_access(&booking)?;

        let (status, payment_status) = transition(
            booking.status,
            booking.payment_status,
            BookingEvent::PaymentInitiated,
        )?;
        let amount_paisa = booking
            .amount_paisa()
            .filter(|a| *a > 0)
            .ok_or_else(|| {
                DomainError::InvalidState(format!("booking {} has no amount to pay", booking_id))
            })?;

        let request = PaymentSessionRequest {
            booking_id: booking.booking_id.clone(),
            amount_paisa,
            product_name: format!(
                "EV charging {} {} {}",
                booking.station_id, booking.charger_type, booking.booking_date
            ),
            customer_id: booking.user_id.clone(),
        };

        let session = self
            .bounded(self.gateway.create_payment_session(request))
            .await
            .map_err(|e| {
                warn!(booking_id, gateway = self.gateway.name(), error = %e, "Payment initiation failed");
                DomainError::from(e)
            })?;

        booking.status = status;
        booking.payment_status = payment_status;
        booking.gateway_reference = Some(session.gateway_reference.clone());
        booking.updated_at = self.clock.now();
        self.repos.bookings().update(&booking).await?;

        info!(
            booking_id,
            gateway_reference = %session.gateway_reference,
            amount_paisa,
            "Payment initiated"
        );

        Ok(PaymentInitiation {
            booking_id: booking.booking_id,
            payment_url: session.payment_url,
            gateway_reference: session.gateway_reference,
            amount_paisa,
        })
    }

    /// Confirm the booking now and pay at the station.
    pub async fn pay_later(&self, booking_id: &str, actor: &Actor) -> DomainResult<Booking> {
        let mut booking = self.load(booking_id).await?;
        actor.ensure_can_access(&booking)?;

        apply_event(&mut booking, BookingEvent::PayLater, self.clock.now())?;
        let stored = self.repos.bookings().update(&booking).await?;

        info!(booking_id, "Payment deferred to station");
        Ok(stored)
    }

    pub async fn payment_status(&self, booking_id: &str, actor: &Actor) -> DomainResult<Booking> {
        let booking = self.load(booking_id).await?;
        actor.ensure_can_access(&booking)?;
        Ok(booking)
    }

    /// Verify a payment given one raw identifier of unknown kind.
    pub async fn verify_identifier(
        &self,
        identifier: &str,
        claimed_amount_paisa: i64,
    ) -> DomainResult<VerificationOutcome> {
        self.verify(&PaymentIdentifier::candidates_for(identifier), claimed_amount_paisa)
            .await
    }

    /// Reconcile a payment callback with its booking.
    pub async fn verify(
        &self,
        candidates: &[PaymentIdentifier],
        claimed_amount_paisa: i64,
    ) -> DomainResult<VerificationOutcome> {
        let (booking, lookup) = self.resolve(candidates).await?;
        let expected = self.expected_amount(&booking)?;

        if booking.payment_status == PaymentStatus::Paid {
            if claimed_amount_paisa != expected {
                // Settled already; reject the claim without touching the booking
                record_outcome("amount_mismatch");
                return Err(mismatch_error(&booking, expected, claimed_amount_paisa));
            }
            debug!(booking_id = %booking.booking_id, "Payment already verified");
            record_outcome(VerificationStatus::AlreadyVerified.as_str());
            return Ok(outcome(&booking, VerificationStatus::AlreadyVerified));
        }

        if claimed_amount_paisa != expected {
            return Err(self
                .amount_mismatch(&booking, expected, claimed_amount_paisa)
                .await);
        }

        let lookup = match lookup {
            Some(lookup) => lookup,
            None => {
                let reference = booking.gateway_reference.clone().ok_or_else(|| {
                    DomainError::UnknownPayment(format!(
                        "no payment was initiated for booking {}",
                        booking.booking_id
                    ))
                })?;
                self.bounded(self.gateway.lookup(&reference)).await?
            }
        };

        self.settle_with_lookup(booking, lookup).await
    }

    /// Apply a gateway webhook.
    ///
    /// The reported status is never trusted on its own. A `Completed`
    /// notification goes through [`Self::verify`]; a failure notice is
    /// checked against the gateway's view of the registered session, and
    /// only a failure the gateway confirms is recorded.
    pub async fn webhook(
        &self,
        params: &CallbackParams,
        amount_paisa: i64,
        status: &str,
    ) -> DomainResult<VerificationOutcome> {
        let state: GatewayPaymentState = status
            .parse()
            .map_err(|e: GatewayError| DomainError::Validation(e.to_string()))?;
        let candidates = params.candidates();

        if state == GatewayPaymentState::Completed {
            return self.verify(&candidates, amount_paisa).await;
        }

        let (booking, _) = self.resolve(&candidates).await?;
        if booking.payment_status == PaymentStatus::Paid {
            record_outcome(VerificationStatus::AlreadyVerified.as_str());
            return Ok(outcome(&booking, VerificationStatus::AlreadyVerified));
        }

        if !state.is_final_failure() || booking.gateway_reference.is_none() {
            record_outcome(VerificationStatus::Pending.as_str());
            return Ok(outcome(&booking, VerificationStatus::Pending));
        }

        let booking_id = booking.booking_id.clone();
        let (result, gateway_state) = self.sync_with_gateway(booking).await?;
        if gateway_state != state {
            warn!(
                booking_id = %booking_id,
                reported = %state,
                gateway = %gateway_state,
                "Webhook status disagrees with gateway"
            );
        }
        Ok(result)
    }

    /// Ask the gateway about a booking's registered payment and apply the
    /// answer. Used by the pending-payment expiry task.
    pub async fn sync_with_gateway(
        &self,
        booking: Booking,
    ) -> DomainResult<(VerificationOutcome, GatewayPaymentState)> {
        let reference = booking.gateway_reference.clone().ok_or_else(|| {
            DomainError::UnknownPayment(format!(
                "no payment was initiated for booking {}",
                booking.booking_id
            ))
        })?;
        let lookup = self.bounded(self.gateway.lookup(&reference)).await?;
        let state = lookup.state;
        let result = self.settle_with_lookup(booking, lookup).await?;
        Ok((result, state))
    }

    /// Resolve the first candidate that matches a booking, in resolution order.
    async fn resolve(
        &self,
        candidates: &[PaymentIdentifier],
    ) -> DomainResult<(Booking, Option<GatewayLookup>)> {
        let first = candidates
            .first()
            .ok_or_else(|| DomainError::Validation("no payment identifier supplied".into()))?;

        let bookings = self.repos.bookings();
        for candidate in candidates {
            let (found, lookup) = match candidate {
                PaymentIdentifier::BookingId(id) => (bookings.find_by_id(id).await?, None),
                PaymentIdentifier::TransactionId(txn) => {
                    (bookings.find_by_gateway_txn_id(txn).await?, None)
                }
                PaymentIdentifier::GatewayReference(reference) => {
                    (bookings.find_by_gateway_reference(reference).await?, None)
                }
                PaymentIdentifier::GatewayToken(token) => {
                    match self.bounded(self.gateway.lookup(token)).await {
                        Ok(lookup) => {
                            let by_order = match &lookup.order_id {
                                Some(order_id) => bookings.find_by_id(order_id).await?,
                                None => None,
                            };
                            let found = match by_order {
                                Some(b) => Some(b),
                                None => {
                                    bookings
                                        .find_by_gateway_reference(&lookup.gateway_reference)
                                        .await?
                                }
                            };
                            (found, Some(lookup))
                        }
                        Err(GatewayError::NotFound(_)) => (None, None),
                        Err(e) => return Err(e.into()),
                    }
                }
            };

            if let Some(booking) = found {
                debug!(
                    booking_id = %booking.booking_id,
                    identifier = candidate.value(),
                    rank = candidate.rank(),
                    "Payment identifier resolved"
                );
                return Ok((booking, lookup));
            }
        }

        Err(DomainError::UnknownPayment(first.value().to_string()))
    }

    fn expected_amount(&self, booking: &Booking) -> DomainResult<i64> {
        booking.amount_paisa().ok_or_else(|| {
            DomainError::InvalidState(format!(
                "booking {} has no amount to pay",
                booking.booking_id
            ))
        })
    }

    async fn settle_with_lookup(
        &self,
        booking: Booking,
        lookup: GatewayLookup,
    ) -> DomainResult<VerificationOutcome> {
        if booking.payment_status == PaymentStatus::Paid {
            record_outcome(VerificationStatus::AlreadyVerified.as_str());
            return Ok(outcome(&booking, VerificationStatus::AlreadyVerified));
        }

        let expected = self.expected_amount(&booking)?;
        if lookup.amount_paisa != expected {
            return Err(self
                .amount_mismatch(&booking, expected, lookup.amount_paisa)
                .await);
        }

        match lookup.state {
            GatewayPaymentState::Completed => {
                let txn_id = lookup
                    .gateway_txn_id
                    .unwrap_or_else(|| lookup.gateway_reference.clone());
                self.record_success(booking, txn_id).await
            }
            GatewayPaymentState::Pending | GatewayPaymentState::Initiated => {
                record_outcome(VerificationStatus::Pending.as_str());
                Ok(outcome(&booking, VerificationStatus::Pending))
            }
            failed => self.record_failure(booking, failed).await,
        }
    }

    async fn record_success(
        &self,
        mut booking: Booking,
        txn_id: String,
    ) -> DomainResult<VerificationOutcome> {
        if let Some(owner) = self.repos.bookings().find_by_gateway_txn_id(&txn_id).await? {
            if owner.booking_id != booking.booking_id {
                let reason = format!(
                    "transaction {} is already recorded on booking {}",
                    txn_id, owner.booking_id
                );
                self.flag_for_review(&booking.booking_id, &reason).await;
                return Err(DomainError::Conflict(reason));
            }
        }

        let now = self.clock.now();
        if let Err(e) = apply_event(&mut booking, BookingEvent::PaymentSucceeded, now) {
            let reason = format!(
                "gateway reported transaction {} for a booking that is {}",
                txn_id, booking.status
            );
            self.flag_for_review(&booking.booking_id, &reason).await;
            return Err(e);
        }
        booking.payment_data = Some(PaymentData {
            gateway_txn_id: txn_id.clone(),
            verified_at: now,
        });

        match self.repos.bookings().update(&booking).await {
            Ok(stored) => {
                record_outcome(VerificationStatus::Verified.as_str());
                info!(
                    booking_id = %stored.booking_id,
                    gateway_txn_id = %txn_id,
                    status = %stored.status,
                    "Payment verified"
                );
                Ok(outcome(&stored, VerificationStatus::Verified))
            }
            Err(DomainError::Conflict(msg)) => {
                // A concurrent verification of the same payment may have won
                let current = self.load(&booking.booking_id).await?;
                if current.payment_status == PaymentStatus::Paid
                    && current.gateway_txn_id() == Some(txn_id.as_str())
                {
                    record_outcome(VerificationStatus::AlreadyVerified.as_str());
                    Ok(outcome(&current, VerificationStatus::AlreadyVerified))
                } else {
                    Err(DomainError::Conflict(msg))
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn record_failure(
        &self,
        mut booking: Booking,
        state: GatewayPaymentState,
    ) -> DomainResult<VerificationOutcome> {
        record_outcome(VerificationStatus::Failed.as_str());
        if apply_event(&mut booking, BookingEvent::PaymentFailed, self.clock.now()).is_err() {
            debug!(booking_id = %booking.booking_id, %state, "Failure not applicable to booking state");
            return Ok(outcome(&booking, VerificationStatus::Failed));
        }

        let stored = self.repos.bookings().update(&booking).await?;
        info!(booking_id = %stored.booking_id, %state, "Payment failed at gateway");
        Ok(outcome(&stored, VerificationStatus::Failed))
    }

    async fn amount_mismatch(&self, booking: &Booking, expected: i64, claimed: i64) -> DomainError {
        record_outcome("amount_mismatch");
        let reason = format!(
            "amount mismatch: expected {} paisa, got {}",
            expected, claimed
        );
        self.flag_for_review(&booking.booking_id, &reason).await;
        mismatch_error(booking, expected, claimed)
    }

    /// Record a manual review reason; only `review_flag` changes.
    async fn flag_for_review(&self, booking_id: &str, reason: &str) {
        warn!(booking_id, reason, "Booking flagged for manual review");

        let result = async {
            let mut booking = self.load(booking_id).await?;
            booking.review_flag = Some(reason.to_string());
            booking.updated_at = self.clock.now();
            self.repos.bookings().update(&booking).await
        }
        .await;

        if let Err(e) = result {
            warn!(booking_id, error = %e, "Failed to store review flag");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{date, fixture, fixture_with_gateway, time, Fixture};
    use super::*;
    use crate::domain::booking::BookingStatus;
    use crate::infrastructure::gateway::SandboxGateway;
    use rust_decimal::Decimal;

    async fn initiated(f: &Fixture) -> (Booking, PaymentInitiation) {
        let b = f.book("alice", "S1", date(2024, 6, 1), time(10, 0)).await;
        let init = f.payments.initiate(&b.booking_id, &Actor::user("alice")).await.unwrap();
        (b, init)
    }

    #[tokio::test]
    async fn initiate_registers_reference_before_returning() {
        let f = fixture();
        let (b, init) = initiated(&f).await;
        assert_eq!(init.amount_paisa, 500);
        assert!(init.payment_url.ends_with(&init.gateway_reference));

        let stored = f.reload(&b.booking_id).await;
        assert_eq!(stored.gateway_reference.as_deref(), Some(init.gateway_reference.as_str()));
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert_eq!(stored.status, BookingStatus::PendingPayment);
    }

    #[tokio::test]
    async fn initiate_requires_an_amount() {
        let f = fixture();
        let b = f.book("alice", "S2", date(2024, 6, 1), time(10, 0)).await;
        // Confirmed with no price: nothing to initiate
        assert!(matches!(
            f.payments.initiate(&b.booking_id, &Actor::user("alice")).await,
            Err(DomainError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn initiate_timeout_leaves_booking_pending_payment() {
        let f = fixture_with_gateway(
            SandboxGateway::new("http://sandbox.local").with_delay(Duration::from_secs(5)),
        );
        let b = f.book("alice", "S1", date(2024, 6, 1), time(10, 0)).await;

        let err = f
            .payments
            .initiate(&b.booking_id, &Actor::user("alice"))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::GatewayTimeout);

        let stored = f.reload(&b.booking_id).await;
        assert_eq!(stored.status, BookingStatus::PendingPayment);
        assert_eq!(stored.payment_status, PaymentStatus::None);
        assert_eq!(stored.gateway_reference, None);
    }

    #[tokio::test]
    async fn verify_twice_is_idempotent() {
        let f = fixture();
        let (b, init) = initiated(&f).await;
        f.gateway.complete(&init.gateway_reference, "T1");

        let first = f.payments.verify_identifier("T1", 500).await.unwrap();
        assert_eq!(first.status, VerificationStatus::Verified);
        assert_eq!(first.booking_id, b.booking_id);
        assert_eq!(first.gateway_txn_id.as_deref(), Some("T1"));
        assert_eq!(first.payment_status, PaymentStatus::Paid);

        let paid = f.reload(&b.booking_id).await;
        assert_eq!(paid.status, BookingStatus::Confirmed);
        let version = paid.version;

        let second = f.payments.verify_identifier("T1", 500).await.unwrap();
        assert_eq!(second.status, VerificationStatus::AlreadyVerified);
        assert_eq!(second.gateway_txn_id.as_deref(), Some("T1"));
        assert_eq!(second.verified_at, first.verified_at);
        assert_eq!(f.reload(&b.booking_id).await.version, version);
    }

    #[tokio::test]
    async fn paid_booking_rejects_a_different_amount() {
        let f = fixture();
        let (b, init) = initiated(&f).await;
        f.gateway.complete(&init.gateway_reference, "T1");
        f.payments.verify_identifier("T1", 500).await.unwrap();
        let version = f.reload(&b.booking_id).await.version;

        assert!(matches!(
            f.payments.verify_identifier("T1", 900).await,
            Err(DomainError::AmountMismatch {
                expected_paisa: 500,
                claimed_paisa: 900,
                ..
            })
        ));

        let stored = f.reload(&b.booking_id).await;
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.review_flag, None);
        assert_eq!(stored.version, version);
    }

    #[tokio::test]
    async fn concurrent_verifications_record_one_payment() {
        let f = fixture();
        let (b, init) = initiated(&f).await;
        f.gateway.complete(&init.gateway_reference, "T1");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let payments = f.payments.clone();
            let reference = init.gateway_reference.clone();
            handles.push(tokio::spawn(async move {
                payments.verify_identifier(&reference, 500).await
            }));
        }

        let mut verified = 0;
        for h in handles {
            let outcome = h.await.unwrap().unwrap();
            assert_eq!(outcome.payment_status, PaymentStatus::Paid);
            if outcome.status == VerificationStatus::Verified {
                verified += 1;
            }
        }
        assert_eq!(verified, 1);
        assert_eq!(f.reload(&b.booking_id).await.gateway_txn_id(), Some("T1"));
    }

    #[tokio::test]
    async fn amount_mismatch_never_pays_and_flags() {
        let f = fixture();
        let (b, init) = initiated(&f).await;
        f.gateway.complete(&init.gateway_reference, "T1");

        let err = f
            .payments
            .verify_identifier(&init.gateway_reference, 50)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::AmountMismatch {
                expected_paisa: 500,
                claimed_paisa: 50,
                ..
            }
        ));

        let stored = f.reload(&b.booking_id).await;
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert!(stored.review_flag.is_some());
    }

    #[tokio::test]
    async fn gateway_amount_is_checked_too() {
        let f = fixture();
        let (b, init) = initiated(&f).await;
        f.gateway.complete(&init.gateway_reference, "T1");
        f.gateway.set_amount(&init.gateway_reference, 100);

        assert!(matches!(
            f.payments.verify_identifier(&b.booking_id, 500).await,
            Err(DomainError::AmountMismatch { claimed_paisa: 100, .. })
        ));
        assert_ne!(f.reload(&b.booking_id).await.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn resolves_by_booking_id_and_reference() {
        let f = fixture();
        let (b, init) = initiated(&f).await;

        let pending = f.payments.verify_identifier(&b.booking_id, 500).await.unwrap();
        assert_eq!(pending.status, VerificationStatus::Pending);

        f.gateway.complete(&init.gateway_reference, "T7");
        let params = CallbackParams {
            pidx: Some(init.gateway_reference.clone()),
            ..Default::default()
        };
        let done = f.payments.verify(&params.candidates(), 500).await.unwrap();
        assert_eq!(done.status, VerificationStatus::Verified);
        assert_eq!(done.gateway_txn_id.as_deref(), Some("T7"));
    }

    #[tokio::test]
    async fn unknown_identifier() {
        let f = fixture();
        assert!(matches!(
            f.payments.verify_identifier("nothing-here", 500).await,
            Err(DomainError::UnknownPayment(_))
        ));
        assert!(matches!(
            f.payments.verify(&[], 500).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn failed_payment_can_be_retried_or_deferred() {
        let f = fixture();
        let (b, init) = initiated(&f).await;
        f.gateway.fail(&init.gateway_reference, GatewayPaymentState::UserCanceled);

        let failed = f.payments.verify_identifier(&b.booking_id, 500).await.unwrap();
        assert_eq!(failed.status, VerificationStatus::Failed);
        let stored = f.reload(&b.booking_id).await;
        assert_eq!(stored.status, BookingStatus::PendingPayment);
        assert_eq!(stored.payment_status, PaymentStatus::Failed);

        let retry = f.payments.initiate(&b.booking_id, &Actor::user("alice")).await.unwrap();
        assert_ne!(retry.gateway_reference, init.gateway_reference);

        let deferred = f.payments.pay_later(&b.booking_id, &Actor::user("alice")).await.unwrap();
        assert_eq!(deferred.status, BookingStatus::Confirmed);
        assert_eq!(deferred.payment_status, PaymentStatus::Deferred);
    }

    #[tokio::test]
    async fn transaction_cannot_pay_two_bookings() {
        let f = fixture();
        let (_, first) = initiated(&f).await;
        f.gateway.complete(&first.gateway_reference, "T1");
        f.payments.verify_identifier(&first.gateway_reference, 500).await.unwrap();

        let other = f.book("bob", "S1", date(2024, 6, 1), time(11, 0)).await;
        let second = f.payments.initiate(&other.booking_id, &Actor::user("bob")).await.unwrap();
        f.gateway.complete(&second.gateway_reference, "T1");

        assert!(matches!(
            f.payments.verify_identifier(&second.gateway_reference, 500).await,
            Err(DomainError::Conflict(_))
        ));
        assert_ne!(f.reload(&other.booking_id).await.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn webhook_failure_needs_gateway_confirmation() {
        let f = fixture();
        let (b, init) = initiated(&f).await;
        let params = CallbackParams {
            purchase_order_id: Some(b.booking_id.clone()),
            ..Default::default()
        };

        // Session still open at the gateway
        let ignored = f.payments.webhook(&params, 500, "Expired").await.unwrap();
        assert_eq!(ignored.status, VerificationStatus::Pending);
        let stored = f.reload(&b.booking_id).await;
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
        assert_eq!(stored.status, BookingStatus::PendingPayment);

        f.gateway.fail(&init.gateway_reference, GatewayPaymentState::Expired);
        let failed = f.payments.webhook(&params, 500, "Expired").await.unwrap();
        assert_eq!(failed.status, VerificationStatus::Failed);
        assert_eq!(failed.payment_status, PaymentStatus::Failed);

        assert!(matches!(
            f.payments.webhook(&params, 500, "Exploded").await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn webhook_completed_is_confirmed_with_gateway() {
        let f = fixture();
        let (b, init) = initiated(&f).await;
        let params = CallbackParams {
            purchase_order_id: Some(b.booking_id.clone()),
            ..Default::default()
        };

        // Gateway has not completed the payment: the webhook claim is not trusted
        let pending = f.payments.webhook(&params, 500, "Completed").await.unwrap();
        assert_eq!(pending.status, VerificationStatus::Pending);

        f.gateway.complete(&init.gateway_reference, "T2");
        let paid = f.payments.webhook(&params, 500, "Completed").await.unwrap();
        assert_eq!(paid.status, VerificationStatus::Verified);

        let again = f.payments.webhook(&params, 500, "User canceled").await.unwrap();
        assert_eq!(again.status, VerificationStatus::AlreadyVerified);
    }

    #[tokio::test]
    async fn settled_booking_payment_flow() {
        let f = fixture();
        let op = Actor::operator("op");
        let alice = Actor::user("alice");
        let b = f.completed_booking("alice").await;
        f.settlement
            .set_amount(
                &b.booking_id,
                &op,
                super::super::SetAmount {
                    amount_npr: Decimal::from(250),
                    actual_duration_minutes: None,
                    notes: None,
                },
                None,
            )
            .await
            .unwrap();

        let pending = f.feed.list_pending_payments("alice").await.unwrap();
        assert_eq!(pending.len(), 1);

        let init = f.payments.initiate(&b.booking_id, &alice).await.unwrap();
        assert_eq!(init.amount_paisa, 25000);
        f.gateway.complete(&init.gateway_reference, "T9");
        let done = f.payments.verify_identifier("T9", 25000).await.unwrap();
        assert_eq!(done.status, VerificationStatus::Verified);

        let paid = f.reload(&b.booking_id).await;
        assert_eq!(paid.status, BookingStatus::Completed);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert!(f.feed.list_pending_payments("alice").await.unwrap().is_empty());
    }
}
