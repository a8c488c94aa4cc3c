//! Caller identity as established by the upstream auth layer

use std::str::FromStr;

use super::booking::Booking;
use crate::shared::errors::{DomainError, DomainResult};

/// Actor role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActorRole {
    #[default]
    User,
    Operator,
}

impl FromStr for ActorRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "operator" | "admin" => Ok(Self::Operator),
            other => Err(DomainError::Unauthorized(format!("unknown role '{}'", other))),
        }
    }
}

/// Who is performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: ActorRole::User,
        }
    }

    pub fn operator(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: ActorRole::Operator,
        }
    }

    pub fn is_operator(&self) -> bool {
        self.role == ActorRole::Operator
    }

    pub fn require_operator(&self) -> DomainResult<()> {
        if self.is_operator() {
            Ok(())
        } else {
            Err(DomainError::Forbidden("operator role required".into()))
        }
    }

    /// Operators see every booking; users only their own.
    pub fn ensure_can_access(&self, booking: &Booking) -> DomainResult<()> {
        if self.is_operator() || booking.is_owned_by(&self.user_id) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "booking {} belongs to another user",
                booking.booking_id
            )))
        }
    }

    /// A user may only query their own data.
    pub fn ensure_is_self_or_operator(&self, user_id: &str) -> DomainResult<()> {
        if self.is_operator() || self.user_id == user_id {
            Ok(())
        } else {
            Err(DomainError::Forbidden("cannot read another user's bookings".into()))
        }
    }
}
