//! In-memory storage backend

mod memory;

pub use memory::{InMemoryBookingRepository, InMemoryRepositoryProvider, InMemorySlotRepository};
