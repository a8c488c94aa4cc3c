pub mod actor;
pub mod booking;
pub mod payment;
pub mod repositories;
pub mod slot;
pub mod station;

// Re-export commonly used types
pub use actor::{Actor, ActorRole};
pub use booking::{Booking, BookingEvent, BookingStatus, PaymentData, PaymentStatus, Urgency};
pub use payment::{PaymentGateway, PaymentIdentifier, VerificationOutcome, VerificationStatus};
pub use repositories::{DomainResult, RepositoryProvider};
pub use slot::{SlotAvailability, SlotGridSettings, SlotKey, TimeSlot};
pub use station::{ChargerSpec, Station, StationCatalog};

pub use crate::shared::errors::DomainError;
