pub mod admin;
pub mod bookings;
pub mod health;
pub mod metrics;
pub mod payments;
pub mod request_id;
pub mod slots;
