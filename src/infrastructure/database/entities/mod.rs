//! Database entities module

pub mod booking;
pub mod slot_reservation;
pub mod time_slot;

pub use booking::Entity as BookingEntity;
pub use slot_reservation::Entity as SlotReservation;
pub use time_slot::Entity as TimeSlotEntity;
