//! # EV Booking Service
//!
//! Charger slot booking, operator settlement and payment reconciliation
//! for EV charging stations.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Bookings, slots, stations, the booking state machine and
//!   repository/gateway traits
//! - **application**: Services implementing the use cases
//! - **infrastructure**: SeaORM and in-memory storage, payment gateways,
//!   the station catalog
//! - **interfaces**: REST API with Swagger documentation
//! - **server**: Runtime bootstrap shared by the binaries

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{config_path_from_env, default_config_path, AppConfig};

// Re-export storage types for easy access
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};

// Re-export API router
pub use interfaces::http::create_api_router;
