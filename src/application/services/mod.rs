//! Application services

mod booking;
mod notification_feed;
mod payment_expiry;
mod payment_reconciler;
mod settlement;
mod slot_grid;

#[cfg(test)]
pub(crate) mod testing;

pub use booking::{BookingService, CreateBooking};
pub use notification_feed::NotificationFeed;
pub use payment_expiry::{start_payment_expiry_task, ExpirySettings, PaymentExpiry};
pub use payment_reconciler::PaymentReconciler;
pub use settlement::{SetAmount, SettlementService};
pub use slot_grid::SlotGrid;
