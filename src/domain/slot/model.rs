//! Slot grid domain types

use std::fmt;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one reservable bucket:
/// (station, charger type, local date, bucket start time).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub station_id: String,
    pub charger_type: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl SlotKey {
    pub fn new(
        station_id: impl Into<String>,
        charger_type: impl Into<String>,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            charger_type: charger_type.into(),
            date,
            time,
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}T{}",
            self.station_id,
            self.charger_type,
            self.date,
            self.time.format("%H:%M")
        )
    }
}

/// Capacity ledger of one bucket.
///
/// Invariant: `reserved_count <= total_capacity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub key: SlotKey,
    pub total_capacity: u32,
    pub reserved_count: u32,
}

impl TimeSlot {
    pub fn new(key: SlotKey, total_capacity: u32) -> Self {
        Self {
            key,
            total_capacity,
            reserved_count: 0,
        }
    }

    pub fn available(&self) -> u32 {
        self.total_capacity.saturating_sub(self.reserved_count)
    }

    /// Compare-and-increment. Returns `false` when the bucket is full.
    pub fn try_take(&mut self) -> bool {
        if self.reserved_count < self.total_capacity {
            self.reserved_count += 1;
            true
        } else {
            false
        }
    }

    pub fn give_back(&mut self) {
        self.reserved_count = self.reserved_count.saturating_sub(1);
    }
}

/// One row of the availability listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAvailability {
    pub time: NaiveTime,
    pub available_count: u32,
    pub total_count: u32,
}

/// Proof of a held reservation. Releasing the same token twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationToken {
    pub id: Uuid,
    pub slot: SlotKey,
}

/// Operator-configured shape of the grid.
#[derive(Debug, Clone)]
pub struct SlotGridSettings {
    /// First bucket start hour (local time)
    pub open_hour: u32,
    /// Last bucket start hour (local time), inclusive
    pub close_hour: u32,
    /// Bucket width in minutes
    pub slot_minutes: u32,
    /// How many days ahead of today bookings are accepted
    pub advance_days: i64,
    /// Station local time offset from UTC
    pub utc_offset_minutes: i32,
}

impl Default for SlotGridSettings {
    fn default() -> Self {
        Self {
            open_hour: 6,
            close_hour: 22,
            slot_minutes: 60,
            advance_days: 7,
            utc_offset_minutes: 0,
        }
    }
}

impl SlotGridSettings {
    /// Bucket start times of one operating day, ascending.
    pub fn bucket_times(&self) -> Vec<NaiveTime> {
        let step = self.slot_minutes.max(1);
        let first = self.open_hour * 60;
        let last = self.close_hour * 60;
        (first..=last)
            .step_by(step as usize)
            .filter_map(|minutes| NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0))
            .collect()
    }

    pub fn is_bucket_start(&self, time: NaiveTime) -> bool {
        time.second() == 0 && time.nanosecond() == 0 && self.bucket_times().contains(&time)
    }

    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Station-local wall clock time for `now`.
    pub fn local_now(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.offset()).naive_local()
    }

    /// Last date that may still be booked.
    pub fn horizon(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_now(now).date() + Duration::days(self.advance_days)
    }
}
