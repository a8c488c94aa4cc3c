//! Payment gateway boundary

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::booking::PaymentStatus;
use crate::shared::errors::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway response could not be decoded: {0}")]
    Decode(String),

    #[error("gateway does not know payment {0}")]
    NotFound(String),
}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout => DomainError::GatewayTimeout,
            GatewayError::NotFound(reference) => DomainError::UnknownPayment(reference),
            other => DomainError::Gateway(other.to_string()),
        }
    }
}

/// What we ask the gateway to collect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSessionRequest {
    pub booking_id: String,
    pub amount_paisa: i64,
    pub product_name: String,
    pub customer_id: String,
}

/// An opened gateway checkout session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub payment_url: String,
    pub gateway_reference: String,
}

/// Payment state as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentState {
    Completed,
    Pending,
    Initiated,
    Refunded,
    Expired,
    UserCanceled,
    Failed,
}

impl GatewayPaymentState {
    pub fn is_final_failure(&self) -> bool {
        matches!(
            self,
            Self::Refunded | Self::Expired | Self::UserCanceled | Self::Failed
        )
    }
}

impl FromStr for GatewayPaymentState {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "pending" => Ok(Self::Pending),
            "initiated" => Ok(Self::Initiated),
            "refunded" | "partially refunded" => Ok(Self::Refunded),
            "expired" => Ok(Self::Expired),
            "user canceled" | "user cancelled" | "canceled" | "cancelled" => Ok(Self::UserCanceled),
            "failed" => Ok(Self::Failed),
            other => Err(GatewayError::Decode(format!(
                "unknown payment state '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for GatewayPaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "Completed",
            Self::Pending => "Pending",
            Self::Initiated => "Initiated",
            Self::Refunded => "Refunded",
            Self::Expired => "Expired",
            Self::UserCanceled => "User canceled",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Result of asking the gateway about a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayLookup {
    pub gateway_reference: String,
    /// Order id, when the gateway echoes it back
    pub order_id: Option<String>,
    pub gateway_txn_id: Option<String>,
    pub state: GatewayPaymentState,
    pub amount_paisa: i64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Open a checkout session and return the redirect URL.
    async fn create_payment_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<PaymentSession, GatewayError>;

    /// Look a payment up by gateway reference or token.
    async fn lookup(&self, reference: &str) -> Result<GatewayLookup, GatewayError>;
}

/// Outcome of a verification call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Payment recorded by this call
    Verified,
    /// Payment had already been recorded; nothing changed
    AlreadyVerified,
    /// Gateway has not completed the payment yet
    Pending,
    /// Gateway reported the payment as failed
    Failed,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::AlreadyVerified => "already_verified",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub booking_id: String,
    pub gateway_txn_id: Option<String>,
    pub status: VerificationStatus,
    pub payment_status: PaymentStatus,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Returned to the client that starts a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInitiation {
    pub booking_id: String,
    pub payment_url: String,
    pub gateway_reference: String,
    pub amount_paisa: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gateway_states_loosely() {
        assert_eq!(
            "Completed".parse::<GatewayPaymentState>().unwrap(),
            GatewayPaymentState::Completed
        );
        assert_eq!(
            "User canceled".parse::<GatewayPaymentState>().unwrap(),
            GatewayPaymentState::UserCanceled
        );
        assert!("Teleported".parse::<GatewayPaymentState>().is_err());
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        assert_eq!(DomainError::from(GatewayError::Timeout), DomainError::GatewayTimeout);
        assert!(matches!(
            DomainError::from(GatewayError::NotFound("x".into())),
            DomainError::UnknownPayment(_)
        ));
    }

    #[test]
    fn failure_states() {
        assert!(GatewayPaymentState::Expired.is_final_failure());
        assert!(!GatewayPaymentState::Pending.is_final_failure());
        assert!(!GatewayPaymentState::Completed.is_final_failure());
    }
}
