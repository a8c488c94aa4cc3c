//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod booking_repository;
pub mod repository_provider;
pub mod slot_repository;

pub use booking_repository::SeaOrmBookingRepository;
pub use repository_provider::SeaOrmRepositoryProvider;
pub use slot_repository::SeaOrmSlotRepository;

use crate::domain::DomainError;

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(e.to_string())
}
