//! Slot grid aggregate
//!
//! Per-station, per-charger-type, per-day capacity ledger.

pub mod model;
pub mod repository;

pub use model::{ReservationToken, SlotAvailability, SlotGridSettings, SlotKey, TimeSlot};
pub use repository::SlotRepository;
