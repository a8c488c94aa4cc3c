//! Repository access for the domain layer
//!
//! `RepositoryProvider` gives services one handle to every per-aggregate
//! repository, so storage backends can be swapped as a unit:
//!
//! ```ignore
//! async fn handle(repos: &dyn RepositoryProvider) {
//!     let booking = repos.bookings().find_by_id("BK-20240601-0A1B2C3D").await?;
//!     let held = repos.slots().is_held(token).await?;
//! }
//! ```

use super::booking::BookingRepository;
use super::slot::SlotRepository;

pub use crate::shared::errors::DomainResult;

pub trait RepositoryProvider: Send + Sync {
    fn bookings(&self) -> &dyn BookingRepository;
    fn slots(&self) -> &dyn SlotRepository;
}
