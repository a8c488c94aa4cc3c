//! Payment sync feed
//!
//! Read-only views derived from booking state. Clients that missed an
//! update poll these and converge; no event log is kept.

use std::sync::Arc;

use chrono::Duration;

use crate::domain::booking::{Booking, PaymentStatus};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::DomainResult;
use crate::shared::time::SharedClock;

pub struct NotificationFeed {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
}

impl NotificationFeed {
    pub fn new(repos: Arc<dyn RepositoryProvider>, clock: SharedClock) -> Self {
        Self { repos, clock }
    }

    /// Bookings of `user_id` with a payment due
    pub async fn list_pending_payments(&self, user_id: &str) -> DomainResult<Vec<Booking>> {
        self.repos
            .bookings()
            .find_by_payment_status(Some(user_id), PaymentStatus::Pending)
            .await
    }

    /// Bookings whose payment was verified within the last `window`,
    /// newest first, optionally for one user.
    pub async fn list_recent_payment_confirmations(
        &self,
        window: Duration,
        user_id: Option<&str>,
    ) -> DomainResult<Vec<Booking>> {
        let now = self.clock.now();
        let recent = self
            .repos
            .bookings()
            .find_paid_between(now - window, now)
            .await?;
        Ok(match user_id {
            Some(user) => recent.into_iter().filter(|b| b.user_id == user).collect(),
            None => recent,
        })
    }
}
