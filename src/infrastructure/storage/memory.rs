//! In-memory repositories for development and testing

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::booking::{Booking, BookingRepository, BookingStatus, PaymentStatus};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::slot::{SlotKey, SlotRepository, TimeSlot};
use crate::domain::{DomainError, DomainResult};

#[derive(Debug, Clone)]
struct HeldReservation {
    slot: SlotKey,
    released: bool,
}

/// Slot ledger kept in a `DashMap`; the shard lock of a bucket's entry
/// serializes compare-and-increment on that bucket.
#[derive(Default)]
pub struct InMemorySlotRepository {
    slots: DashMap<SlotKey, TimeSlot>,
    reservations: DashMap<Uuid, HeldReservation>,
}

impl InMemorySlotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotRepository for InMemorySlotRepository {
    async fn try_reserve(&self, key: &SlotKey, capacity: u32, token: Uuid) -> DomainResult<bool> {
        let mut slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| TimeSlot::new(key.clone(), capacity));
        slot.total_capacity = capacity;

        if !slot.try_take() {
            return Ok(false);
        }

        self.reservations.insert(
            token,
            HeldReservation {
                slot: key.clone(),
                released: false,
            },
        );
        Ok(true)
    }

    async fn release(&self, token: Uuid) -> DomainResult<bool> {
        let key = match self.reservations.get_mut(&token) {
            Some(mut held) if !held.released => {
                held.released = true;
                held.slot.clone()
            }
            _ => return Ok(false),
        };

        if let Some(mut slot) = self.slots.get_mut(&key) {
            slot.give_back();
        }
        Ok(true)
    }

    async fn is_held(&self, token: Uuid) -> DomainResult<bool> {
        Ok(self
            .reservations
            .get(&token)
            .map(|held| !held.released)
            .unwrap_or(false))
    }

    async fn find(&self, key: &SlotKey) -> DomainResult<Option<TimeSlot>> {
        Ok(self.slots.get(key).map(|s| s.clone()))
    }

    async fn find_day(
        &self,
        station_id: &str,
        charger_type: &str,
        date: NaiveDate,
    ) -> DomainResult<Vec<TimeSlot>> {
        let mut day: Vec<TimeSlot> = self
            .slots
            .iter()
            .filter(|e| {
                let k = e.key();
                k.station_id == station_id && k.charger_type == charger_type && k.date == date
            })
            .map(|e| e.value().clone())
            .collect();
        day.sort_by_key(|s| s.key.time);
        Ok(day)
    }
}

/// Booking store with a `gateway_txn_id` index standing in for the unique
/// constraint of the SQL schema.
///
/// Lock order is always `bookings` then `txn_index`.
#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: DashMap<String, Booking>,
    txn_index: DashMap<String, String>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect<F>(&self, filter: F) -> Vec<Booking>
    where
        F: Fn(&Booking) -> bool,
    {
        let mut found: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|e| filter(e.value()))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> DomainResult<()> {
        booking.check_invariants()?;
        match self.bookings.entry(booking.booking_id.clone()) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "booking {} already exists",
                booking.booking_id
            ))),
            Entry::Vacant(v) => {
                v.insert(booking.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, booking: &Booking) -> DomainResult<Booking> {
        booking.check_invariants()?;

        let mut current = self
            .bookings
            .get_mut(&booking.booking_id)
            .ok_or_else(|| DomainError::booking_not_found(&booking.booking_id))?;

        if current.version != booking.version {
            return Err(DomainError::Conflict(format!(
                "booking {} was modified concurrently (expected version {}, found {})",
                booking.booking_id, booking.version, current.version
            )));
        }

        if let Some(txn) = booking.gateway_txn_id() {
            match self.txn_index.entry(txn.to_string()) {
                Entry::Occupied(owner) if owner.get() != &booking.booking_id => {
                    return Err(DomainError::Conflict(format!(
                        "transaction {} is already recorded on booking {}",
                        txn,
                        owner.get()
                    )));
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(v) => {
                    v.insert(booking.booking_id.clone());
                }
            }
        }

        let mut stored = booking.clone();
        stored.version += 1;
        *current = stored.clone();
        Ok(stored)
    }

    async fn find_by_id(&self, booking_id: &str) -> DomainResult<Option<Booking>> {
        Ok(self.bookings.get(booking_id).map(|b| b.clone()))
    }

    async fn find_by_gateway_reference(&self, reference: &str) -> DomainResult<Option<Booking>> {
        Ok(self
            .bookings
            .iter()
            .find(|e| e.gateway_reference.as_deref() == Some(reference))
            .map(|e| e.value().clone()))
    }

    async fn find_by_gateway_txn_id(&self, txn_id: &str) -> DomainResult<Option<Booking>> {
        let booking_id = match self.txn_index.get(txn_id) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        self.find_by_id(&booking_id).await
    }

    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<Booking>> {
        Ok(self.collect(|b| b.user_id == user_id))
    }

    async fn find_by_payment_status(
        &self,
        user_id: Option<&str>,
        status: PaymentStatus,
    ) -> DomainResult<Vec<Booking>> {
        Ok(self.collect(|b| {
            b.payment_status == status && user_id.map_or(true, |u| b.user_id == u)
        }))
    }

    async fn find_awaiting_settlement(&self, station_id: Option<&str>) -> DomainResult<Vec<Booking>> {
        let mut found = self.collect(|b| {
            b.charging_completed
                && !b.admin_amount_set
                && b.payment_status != PaymentStatus::Paid
                && station_id.map_or(true, |s| b.station_id == s)
        });
        found.sort_by_key(|b| b.charging_completed_at);
        Ok(found)
    }

    async fn find_paid_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        let mut found = self.collect(|b| {
            b.payment_status == PaymentStatus::Paid
                && b.payment_data
                    .as_ref()
                    .is_some_and(|p| p.verified_at >= from && p.verified_at <= to)
        });
        found.sort_by(|a, b| {
            let at = |x: &Booking| x.payment_data.as_ref().map(|p| p.verified_at);
            at(b).cmp(&at(a))
        });
        Ok(found)
    }

    async fn find_pending_payment_before(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<Booking>> {
        Ok(self.collect(|b| {
            b.status == BookingStatus::PendingPayment && b.created_at < cutoff
        }))
    }

    async fn find_flagged(&self) -> DomainResult<Vec<Booking>> {
        Ok(self.collect(|b| b.review_flag.is_some()))
    }
}

/// In-memory [`RepositoryProvider`]
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    bookings: InMemoryBookingRepository,
    slots: InMemorySlotRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn RepositoryProvider> {
        Arc::new(Self::new())
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn bookings(&self) -> &dyn BookingRepository {
        &self.bookings
    }

    fn slots(&self) -> &dyn SlotRepository {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{PaymentData, Urgency};
    use chrono::NaiveTime;

    fn key() -> SlotKey {
        SlotKey::new(
            "S1",
            "Type2",
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        )
    }

    fn booking(id: &str) -> Booking {
        let now = Utc::now();
        Booking {
            booking_id: id.to_string(),
            user_id: "u1".into(),
            station_id: "S1".into(),
            charger_type: "Type2".into(),
            booking_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            booking_time: NaiveTime::from_hms_opt(10, 0, 0),
            status: BookingStatus::PendingPayment,
            payment_status: PaymentStatus::None,
            amount_npr: None,
            charging_completed: false,
            charging_completed_at: None,
            admin_amount_set: false,
            admin_set_amount_at: None,
            actual_duration_minutes: None,
            settlement_notes: None,
            payment_data: None,
            gateway_reference: None,
            reservation_token: None,
            review_flag: None,
            auto_booked: false,
            urgency: Urgency::Medium,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[tokio::test]
    async fn concurrent_reservations_never_exceed_capacity() {
        let repo = Arc::new(InMemorySlotRepository::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.try_reserve(&key(), 3, Uuid::new_v4()).await.unwrap()
            }));
        }

        let mut won = 0;
        for h in handles {
            if h.await.unwrap() {
                won += 1;
            }
        }
        assert_eq!(won, 3);
        assert_eq!(repo.find(&key()).await.unwrap().unwrap().reserved_count, 3);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let repo = InMemorySlotRepository::new();
        let token = Uuid::new_v4();
        assert!(repo.try_reserve(&key(), 1, token).await.unwrap());
        assert!(!repo.try_reserve(&key(), 1, Uuid::new_v4()).await.unwrap());

        assert!(repo.release(token).await.unwrap());
        assert!(!repo.release(token).await.unwrap());
        assert!(!repo.is_held(token).await.unwrap());
        assert_eq!(repo.find(&key()).await.unwrap().unwrap().reserved_count, 0);

        assert!(repo.try_reserve(&key(), 1, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn stale_update_is_a_conflict() {
        let repo = InMemoryBookingRepository::new();
        let b = booking("BK-20240601-00000001");
        repo.insert(&b).await.unwrap();

        let mut first = b.clone();
        first.status = BookingStatus::Cancelled;
        let stored = repo.update(&first).await.unwrap();
        assert_eq!(stored.version, 1);

        let mut stale = b.clone();
        stale.payment_status = PaymentStatus::Deferred;
        assert!(matches!(repo.update(&stale).await, Err(DomainError::Conflict(_))));

        let current = repo.find_by_id(&b.booking_id).await.unwrap().unwrap();
        assert_eq!(current.status, BookingStatus::Cancelled);
        assert_eq!(current.payment_status, PaymentStatus::None);
    }

    #[tokio::test]
    async fn transaction_ids_are_unique_across_bookings() {
        let repo = InMemoryBookingRepository::new();
        let paid = |id: &str| {
            let mut b = booking(id);
            b.status = BookingStatus::Confirmed;
            b.payment_status = PaymentStatus::Paid;
            b.payment_data = Some(PaymentData {
                gateway_txn_id: "T1".into(),
                verified_at: Utc::now(),
            });
            b
        };

        repo.insert(&booking("BK-20240601-00000001")).await.unwrap();
        repo.insert(&booking("BK-20240601-00000002")).await.unwrap();

        repo.update(&paid("BK-20240601-00000001")).await.unwrap();
        assert!(matches!(
            repo.update(&paid("BK-20240601-00000002")).await,
            Err(DomainError::Conflict(_))
        ));

        let owner = repo.find_by_gateway_txn_id("T1").await.unwrap().unwrap();
        assert_eq!(owner.booking_id, "BK-20240601-00000001");
    }
}
