pub mod services;

pub use services::{
    start_payment_expiry_task, BookingService, CreateBooking, ExpirySettings, NotificationFeed,
    PaymentExpiry, PaymentReconciler, SetAmount, SettlementService, SlotGrid,
};
