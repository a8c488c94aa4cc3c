//! Payment reconciliation boundary
//!
//! Identifier resolution order and the gateway collaborator interface.

pub mod gateway;
pub mod identifier;

pub use gateway::{
    GatewayError, GatewayLookup, GatewayPaymentState, PaymentGateway, PaymentInitiation,
    PaymentSession, PaymentSessionRequest, VerificationOutcome, VerificationStatus,
};
pub use identifier::{CallbackParams, PaymentIdentifier};
