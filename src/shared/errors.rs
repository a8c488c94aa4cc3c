use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ── Slot grid ──────────────────────────────────────────────
    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Outside booking window: {0}")]
    OutOfWindow(String),

    // ── Booking lifecycle ──────────────────────────────────────
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Booking {0} has already been priced")]
    AlreadyPriced(String),

    // ── Payments ───────────────────────────────────────────────
    #[error("Unknown payment: {0}")]
    UnknownPayment(String),

    #[error("Amount mismatch for booking {booking_id}: expected {expected_paisa} paisa, got {claimed_paisa}")]
    AmountMismatch {
        booking_id: String,
        expected_paisa: i64,
        claimed_paisa: i64,
    },

    #[error("Payment gateway timed out")]
    GatewayTimeout,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    /// Stable machine-readable code, used in API error bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::SlotUnavailable(_) => "slot_unavailable",
            Self::InvalidSlot(_) => "invalid_slot",
            Self::OutOfWindow(_) => "out_of_window",
            Self::InvalidState(_) => "invalid_state",
            Self::Conflict(_) => "conflict",
            Self::AlreadyPriced(_) => "already_priced",
            Self::UnknownPayment(_) => "unknown_payment",
            Self::AmountMismatch { .. } => "amount_mismatch",
            Self::GatewayTimeout => "gateway_timeout",
            Self::Gateway(_) => "gateway_error",
            Self::Storage(_) => "storage_error",
        }
    }

    pub fn booking_not_found(booking_id: &str) -> Self {
        Self::NotFound {
            entity: "Booking",
            field: "booking_id",
            value: booking_id.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(DomainError::GatewayTimeout.code(), "gateway_timeout");
        assert_eq!(
            DomainError::AlreadyPriced("BK-1".into()).code(),
            "already_priced"
        );
        assert_eq!(DomainError::booking_not_found("BK-1").code(), "not_found");
    }

    #[test]
    fn amount_mismatch_message_names_both_amounts() {
        let err = DomainError::AmountMismatch {
            booking_id: "BK-1".into(),
            expected_paisa: 50000,
            claimed_paisa: 500,
        };
        let msg = err.to_string();
        assert!(msg.contains("50000"));
        assert!(msg.contains("500 paisa") || msg.contains("got 500"));
    }
}
