//! Infrastructure layer - external concerns

pub mod catalog;
pub mod database;
pub mod gateway;
pub mod storage;

pub use catalog::StaticStationCatalog;
pub use database::{init_database, run_migrations, DatabaseConfig, SeaOrmRepositoryProvider};
pub use gateway::{build_gateway, KhaltiGateway, SandboxGateway};
pub use storage::InMemoryRepositoryProvider;
