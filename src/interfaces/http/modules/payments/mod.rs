//! Payment module — initiation, verification and the sync feed

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
