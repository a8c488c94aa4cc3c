//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_time_slots;
mod m20240601_000002_create_slot_reservations;
mod m20240601_000003_create_bookings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_time_slots::Migration),
            Box::new(m20240601_000002_create_slot_reservations::Migration),
            Box::new(m20240601_000003_create_bookings::Migration),
        ]
    }
}
