//! Booking module — lifecycle and settlement entry points

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
