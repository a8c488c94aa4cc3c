//! Background task that cancels `pending_payment` bookings whose payment
//! window elapsed, giving their slots back to the grid.
//!
//! Bookings with a registered gateway reference are checked with the
//! gateway first, so a payment completed out of band is recorded instead
//! of being cancelled.

use std::sync::Arc;

use chrono::Duration;
use tokio::time::Duration as TickDuration;
use tracing::{debug, info, warn};

use crate::domain::booking::Booking;
use crate::domain::payment::{GatewayPaymentState, VerificationStatus};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::{DomainError, DomainResult};
use crate::shared::shutdown::ShutdownSignal;
use crate::shared::time::SharedClock;

use super::{BookingService, PaymentReconciler};

#[derive(Debug, Clone)]
pub struct ExpirySettings {
    /// How long a booking may wait for payment
    pub ttl: Duration,
    pub check_interval_secs: u64,
}

pub struct PaymentExpiry {
    repos: Arc<dyn RepositoryProvider>,
    bookings: Arc<BookingService>,
    payments: Arc<PaymentReconciler>,
    clock: SharedClock,
    settings: ExpirySettings,
}

impl PaymentExpiry {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        bookings: Arc<BookingService>,
        payments: Arc<PaymentReconciler>,
        clock: SharedClock,
        settings: ExpirySettings,
    ) -> Self {
        Self {
            repos,
            bookings,
            payments,
            clock,
            settings,
        }
    }

    /// Run one pass; returns the number of bookings cancelled.
    pub async fn run_once(&self) -> DomainResult<usize> {
        let cutoff = self.clock.now() - self.settings.ttl;
        let overdue = self
            .repos
            .bookings()
            .find_pending_payment_before(cutoff)
            .await?;

        if overdue.is_empty() {
            return Ok(0);
        }

        info!(count = overdue.len(), "Checking overdue pending payments");

        let mut expired = 0;
        for booking in overdue {
            let booking_id = booking.booking_id.clone();
            match self.expire_one(booking).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(DomainError::Conflict(_)) => {
                    debug!(booking_id = %booking_id, "Booking changed during expiry, skipping");
                }
                Err(e) => warn!(booking_id = %booking_id, error = %e, "Failed to expire booking"),
            }
        }
        Ok(expired)
    }

    async fn expire_one(&self, booking: Booking) -> DomainResult<bool> {
        if booking.gateway_reference.is_none() {
            self.bookings.expire(booking).await?;
            return Ok(true);
        }

        let booking_id = booking.booking_id.clone();
        let (outcome, state) = match self.payments.sync_with_gateway(booking).await {
            Ok(result) => result,
            Err(e) => {
                // Never cancel while the gateway cannot tell us what happened
                warn!(booking_id = %booking_id, error = %e, "Gateway check failed, retrying next round");
                return Ok(false);
            }
        };

        match outcome.status {
            VerificationStatus::Verified | VerificationStatus::AlreadyVerified => {
                info!(booking_id = %booking_id, "Overdue booking was paid out of band");
                Ok(false)
            }
            VerificationStatus::Pending if state == GatewayPaymentState::Pending => {
                debug!(booking_id = %booking_id, "Payment still processing at gateway");
                Ok(false)
            }
            _ => {
                let current = self
                    .repos
                    .bookings()
                    .find_by_id(&booking_id)
                    .await?
                    .ok_or_else(|| DomainError::booking_not_found(&booking_id))?;
                self.bookings.expire(current).await?;
                Ok(true)
            }
        }
    }
}

/// Start the pending-payment expiry background task.
pub fn start_payment_expiry_task(expiry: Arc<PaymentExpiry>, shutdown: ShutdownSignal) {
    let interval_secs = expiry.settings.check_interval_secs;
    tokio::spawn(async move {
        info!(check_interval = interval_secs, "Pending payment expiry task started");

        let mut interval = tokio::time::interval(TickDuration::from_secs(interval_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = expiry.run_once().await {
                        warn!(error = %e, "Pending payment expiry check error");
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("Pending payment expiry task shutting down");
                    break;
                }
            }
        }

        info!("Pending payment expiry task stopped");
    });
}
