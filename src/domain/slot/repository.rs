//! Slot repository interface

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::model::{SlotKey, TimeSlot};
use crate::shared::errors::DomainResult;

#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Atomically take one unit of capacity from the bucket and record `token`
    /// against it. The bucket is created with `capacity` on first use.
    ///
    /// Returns `false` (and records nothing) when the bucket is already full.
    async fn try_reserve(&self, key: &SlotKey, capacity: u32, token: Uuid) -> DomainResult<bool>;

    /// Give back the capacity held by `token`.
    ///
    /// Returns `false` when the token is unknown or was already released.
    async fn release(&self, token: Uuid) -> DomainResult<bool>;

    /// Whether `token` still holds capacity
    async fn is_held(&self, token: Uuid) -> DomainResult<bool>;

    /// Find a single bucket
    async fn find(&self, key: &SlotKey) -> DomainResult<Option<TimeSlot>>;

    /// All materialized buckets of one day for a station's charger type
    async fn find_day(
        &self,
        station_id: &str,
        charger_type: &str,
        date: NaiveDate,
    ) -> DomainResult<Vec<TimeSlot>>;
}
