//! Slot grid service
//!
//! Validates bucket requests against the operating window and delegates the
//! compare-and-increment to the slot repository.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::repositories::RepositoryProvider;
use crate::domain::slot::{ReservationToken, SlotAvailability, SlotGridSettings, SlotKey};
use crate::domain::station::{ChargerSpec, StationCatalog};
use crate::domain::{DomainError, DomainResult};
use crate::shared::time::SharedClock;

pub struct SlotGrid {
    repos: Arc<dyn RepositoryProvider>,
    catalog: Arc<dyn StationCatalog>,
    settings: SlotGridSettings,
    clock: SharedClock,
}

impl SlotGrid {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        catalog: Arc<dyn StationCatalog>,
        settings: SlotGridSettings,
        clock: SharedClock,
    ) -> Self {
        Self {
            repos,
            catalog,
            settings,
            clock,
        }
    }

    fn local_now(&self) -> NaiveDateTime {
        self.settings.local_now(self.clock.now())
    }

    fn check_date(&self, date: NaiveDate) -> DomainResult<()> {
        let now = self.clock.now();
        if date < self.settings.local_now(now).date() {
            return Err(DomainError::InvalidSlot(format!("{} is in the past", date)));
        }
        let horizon = self.settings.horizon(now);
        if date > horizon {
            return Err(DomainError::OutOfWindow(format!(
                "{} is beyond the booking horizon ({})",
                date, horizon
            )));
        }
        Ok(())
    }

    fn check_bucket(&self, date: NaiveDate, time: NaiveTime) -> DomainResult<()> {
        if !self.settings.is_bucket_start(time) {
            return Err(DomainError::InvalidSlot(format!(
                "{} is not a bucket start within operating hours",
                time.format("%H:%M")
            )));
        }
        self.check_date(date)?;
        if date.and_time(time) < self.local_now() {
            return Err(DomainError::InvalidSlot(format!(
                "{} {} has already started",
                date,
                time.format("%H:%M")
            )));
        }
        Ok(())
    }

    /// Take one unit of capacity of a bucket.
    pub async fn reserve(
        &self,
        station_id: &str,
        charger_type: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> DomainResult<ReservationToken> {
        self.check_bucket(date, time)?;
        let charger = self.catalog.resolve_charger(station_id, charger_type).await?;
        let key = SlotKey::new(station_id, charger.charger_type, date, time);

        match self.take(&key, charger.slots).await? {
            Some(token) => Ok(token),
            None => {
                metrics::counter!("slot_conflicts_total").increment(1);
                debug!(slot = %key, "Slot is full");
                Err(DomainError::SlotUnavailable(key.to_string()))
            }
        }
    }

    async fn take(&self, key: &SlotKey, capacity: u32) -> DomainResult<Option<ReservationToken>> {
        let token = Uuid::new_v4();
        if !self.repos.slots().try_reserve(key, capacity, token).await? {
            return Ok(None);
        }
        debug!(slot = %key, token = %token, "Slot reserved");
        Ok(Some(ReservationToken {
            id: token,
            slot: key.clone(),
        }))
    }

    /// Reserve the soonest bucket that still has capacity, from the next
    /// bucket start up to the booking horizon.
    pub async fn reserve_soonest(
        &self,
        station_id: &str,
        charger_type: &str,
    ) -> DomainResult<ReservationToken> {
        let charger = self.catalog.resolve_charger(station_id, charger_type).await?;
        let now = self.local_now();
        let horizon = self.settings.horizon(self.clock.now());
        let times = self.settings.bucket_times();

        let mut date = now.date();
        while date <= horizon {
            let reserved = self.reserved_by_time(station_id, &charger, date).await?;
            for &time in &times {
                if date.and_time(time) < now {
                    continue;
                }
                if reserved.get(&time).copied().unwrap_or(0) >= charger.slots {
                    continue;
                }
                let key = SlotKey::new(station_id, charger.charger_type.clone(), date, time);
                // Lost a race for this bucket; keep looking
                if let Some(token) = self.take(&key, charger.slots).await? {
                    return Ok(token);
                }
            }
            date += Duration::days(1);
        }

        metrics::counter!("slot_conflicts_total").increment(1);
        Err(DomainError::SlotUnavailable(format!(
            "no free {} slot at {} before {}",
            charger.charger_type, station_id, horizon
        )))
    }

    /// Give back a reservation. Releasing twice is a no-op.
    pub async fn release(&self, token: &ReservationToken) -> DomainResult<bool> {
        self.release_by_id(token.id).await
    }

    pub async fn release_by_id(&self, token: Uuid) -> DomainResult<bool> {
        let released = self.repos.slots().release(token).await?;
        if released {
            debug!(token = %token, "Slot released");
        } else {
            debug!(token = %token, "Slot token already released");
        }
        Ok(released)
    }

    /// Release a booking's reservation, logging instead of failing.
    pub async fn release_quietly(&self, token: Uuid, booking_id: &str) {
        if let Err(e) = self.release_by_id(token).await {
            warn!(booking_id, token = %token, error = %e, "Failed to release slot reservation");
        }
    }

    /// Availability of each bucket of a day, in time order.
    ///
    /// Buckets of today that already started are left out.
    pub async fn list_slots(
        &self,
        station_id: &str,
        charger_type: &str,
        date: NaiveDate,
    ) -> DomainResult<Vec<SlotAvailability>> {
        self.check_date(date)?;
        let charger = self.catalog.resolve_charger(station_id, charger_type).await?;
        let reserved = self.reserved_by_time(station_id, &charger, date).await?;
        let now = self.local_now();

        Ok(self
            .settings
            .bucket_times()
            .into_iter()
            .filter(|t| date.and_time(*t) >= now)
            .map(|time| SlotAvailability {
                time,
                available_count: charger
                    .slots
                    .saturating_sub(reserved.get(&time).copied().unwrap_or(0)),
                total_count: charger.slots,
            })
            .collect())
    }

    async fn reserved_by_time(
        &self,
        station_id: &str,
        charger: &ChargerSpec,
        date: NaiveDate,
    ) -> DomainResult<HashMap<NaiveTime, u32>> {
        Ok(self
            .repos
            .slots()
            .find_day(station_id, &charger.charger_type, date)
            .await?
            .into_iter()
            .map(|s| (s.key.time, s.reserved_count))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{date, fixture, time};
    use super::*;

    #[tokio::test]
    async fn capacity_one_bucket_rejects_second_reservation() {
        let f = fixture();
        let first = f.grid.reserve("S1", "Type2", date(2024, 6, 1), time(10, 0)).await.unwrap();
        assert_eq!(first.slot.charger_type, "Type2");

        let second = f.grid.reserve("S1", "type2", date(2024, 6, 1), time(10, 0)).await;
        assert!(matches!(second, Err(DomainError::SlotUnavailable(_))));
    }

    #[tokio::test]
    async fn concurrent_reservations_never_overbook() {
        let f = fixture();
        let mut handles = Vec::new();
        for _ in 0..10 {
            let grid = f.grid.clone();
            handles.push(tokio::spawn(async move {
                grid.reserve("S2", "Type2", date(2024, 6, 2), time(9, 0)).await
            }));
        }

        let mut ok = 0;
        let mut unavailable = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(DomainError::SlotUnavailable(_)) => unavailable += 1,
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!(ok, 2);
        assert_eq!(unavailable, 8);
    }

    #[tokio::test]
    async fn release_round_trip() {
        let f = fixture();
        let token = f.grid.reserve("S1", "Type2", date(2024, 6, 1), time(12, 0)).await.unwrap();
        assert!(f.grid.release(&token).await.unwrap());
        assert!(!f.grid.release(&token).await.unwrap());
        f.grid.reserve("S1", "Type2", date(2024, 6, 1), time(12, 0)).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_past_and_far_future() {
        let f = fixture();
        // Clock is 2024-06-01 08:00
        assert!(matches!(
            f.grid.reserve("S1", "Type2", date(2024, 6, 1), time(7, 0)).await,
            Err(DomainError::InvalidSlot(_))
        ));
        assert!(matches!(
            f.grid.reserve("S1", "Type2", date(2024, 5, 31), time(10, 0)).await,
            Err(DomainError::InvalidSlot(_))
        ));
        assert!(matches!(
            f.grid.reserve("S1", "Type2", date(2024, 6, 9), time(10, 0)).await,
            Err(DomainError::OutOfWindow(_))
        ));
        assert!(f.grid.reserve("S1", "Type2", date(2024, 6, 8), time(10, 0)).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_off_grid_times() {
        let f = fixture();
        assert!(matches!(
            f.grid.reserve("S1", "Type2", date(2024, 6, 1), time(10, 30)).await,
            Err(DomainError::InvalidSlot(_))
        ));
        assert!(matches!(
            f.grid.reserve("S1", "Type2", date(2024, 6, 1), time(23, 0)).await,
            Err(DomainError::InvalidSlot(_))
        ));
    }

    #[tokio::test]
    async fn unknown_charger_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.grid.reserve("S1", "CCS", date(2024, 6, 1), time(10, 0)).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn lists_remaining_buckets_of_today() {
        let f = fixture();
        f.grid.reserve("S2", "Type2", date(2024, 6, 1), time(9, 0)).await.unwrap();

        let slots = f.grid.list_slots("S2", "Type2", date(2024, 6, 1)).await.unwrap();
        assert_eq!(slots.first().map(|s| s.time), Some(time(8, 0)));
        assert_eq!(slots.last().map(|s| s.time), Some(time(22, 0)));
        assert_eq!(slots.len(), 15);

        let nine = slots.iter().find(|s| s.time == time(9, 0)).unwrap();
        assert_eq!((nine.available_count, nine.total_count), (1, 2));

        let tomorrow = f.grid.list_slots("S2", "Type2", date(2024, 6, 2)).await.unwrap();
        assert_eq!(tomorrow.len(), 17);
        assert!(tomorrow.iter().all(|s| s.available_count == 2));
    }

    #[tokio::test]
    async fn soonest_skips_full_buckets() {
        let f = fixture();
        f.grid.reserve("S1", "Type2", date(2024, 6, 1), time(8, 0)).await.unwrap();
        f.grid.reserve("S1", "Type2", date(2024, 6, 1), time(9, 0)).await.unwrap();

        let token = f.grid.reserve_soonest("S1", "Type2").await.unwrap();
        assert_eq!(token.slot.date, date(2024, 6, 1));
        assert_eq!(token.slot.time, time(10, 0));
    }

    #[tokio::test]
    async fn soonest_rolls_over_to_tomorrow() {
        let f = fixture();
        f.clock.advance(chrono::Duration::hours(14)); // 22:00 local
        f.grid.reserve("S1", "Type2", date(2024, 6, 1), time(22, 0)).await.unwrap();

        let token = f.grid.reserve_soonest("S1", "Type2").await.unwrap();
        assert_eq!(token.slot.date, date(2024, 6, 2));
        assert_eq!(token.slot.time, time(6, 0));
    }
}
