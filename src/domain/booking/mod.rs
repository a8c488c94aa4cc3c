//! Booking aggregate
//!
//! Contains the Booking entity, its closed status enums, the transition
//! table and the repository interface.

pub mod model;
pub mod repository;
pub mod state;

pub use model::{npr_to_paisa, Booking, BookingStatus, PaymentData, PaymentStatus, Urgency};
pub use repository::BookingRepository;
pub use state::{transition, BookingEvent};
