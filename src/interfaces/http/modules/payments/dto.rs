//! Payment DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::payment::{CallbackParams, PaymentInitiation};
use crate::domain::{Booking, VerificationOutcome};

use super::super::bookings::PaymentDataDto;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BookingRefRequest {
    #[validate(length(min = 1, max = 64))]
    pub booking_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentInitiationDto {
    pub booking_id: String,
    /// Where to send the user to pay
    pub payment_url: String,
    pub gateway_reference: String,
    pub amount_paisa: i64,
}

impl From<PaymentInitiation> for PaymentInitiationDto {
    fn from(p: PaymentInitiation) -> Self {
        Self {
            booking_id: p.booking_id,
            payment_url: p.payment_url,
            gateway_reference: p.gateway_reference,
            amount_paisa: p.amount_paisa,
        }
    }
}

/// Verify a payment from any identifier the gateway handed back
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentRequest {
    /// Booking id, transaction id, pidx or token
    #[validate(length(min = 1, max = 128))]
    pub identifier: String,
    /// Amount the client claims was paid
    #[serde(alias = "amount")]
    #[validate(range(min = 1))]
    pub amount_paisa: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerificationDto {
    pub booking_id: String,
    /// verified | already_verified | pending | failed
    pub status: String,
    pub payment_status: String,
    pub gateway_txn_id: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl From<VerificationOutcome> for VerificationDto {
    fn from(o: VerificationOutcome) -> Self {
        Self {
            booking_id: o.booking_id,
            status: o.status.as_str().to_string(),
            payment_status: o.payment_status.to_string(),
            gateway_txn_id: o.gateway_txn_id,
            verified_at: o.verified_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusDto {
    pub booking_id: String,
    pub status: String,
    pub payment_status: String,
    pub amount_paisa: Option<i64>,
    pub payment_data: Option<PaymentDataDto>,
}

impl From<Booking> for PaymentStatusDto {
    fn from(b: Booking) -> Self {
        let amount_paisa = b.amount_paisa();
        Self {
            booking_id: b.booking_id,
            status: b.status.to_string(),
            payment_status: b.payment_status.to_string(),
            amount_paisa,
            payment_data: b.payment_data.map(PaymentDataDto::from),
        }
    }
}

/// Server-to-server notification from the gateway
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct WebhookRequest {
    pub pidx: Option<String>,
    pub token: Option<String>,
    pub transaction_id: Option<String>,
    pub tidx: Option<String>,
    #[serde(alias = "product_identity")]
    pub purchase_order_id: Option<String>,
    /// Amount in paisa
    pub amount: i64,
    /// Gateway status, e.g. `Completed`, `Expired`, `User canceled`
    #[validate(length(min = 1, max = 32))]
    pub status: String,
}

impl WebhookRequest {
    pub fn params(&self) -> CallbackParams {
        CallbackParams {
            identifier: None,
            purchase_order_id: self.purchase_order_id.clone(),
            pidx: self.pidx.clone(),
            token: self.token.clone(),
            transaction_id: self.transaction_id.clone(),
            tidx: self.tidx.clone(),
        }
    }
}

/// Query string of the gateway's browser redirect
#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub pidx: Option<String>,
    pub token: Option<String>,
    pub transaction_id: Option<String>,
    pub tidx: Option<String>,
    pub purchase_order_id: Option<String>,
    /// Amount in paisa
    pub amount: i64,
    pub status: Option<String>,
}

impl CallbackQuery {
    pub fn params(&self) -> CallbackParams {
        CallbackParams {
            identifier: None,
            purchase_order_id: self.purchase_order_id.clone(),
            pidx: self.pidx.clone(),
            token: self.token.clone(),
            transaction_id: self.transaction_id.clone(),
            tidx: self.tidx.clone(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecentQuery {
    /// Look-back window; defaults to the configured window
    pub minutes: Option<i64>,
    /// Operators may omit this to see every user
    pub user_id: Option<String>,
}
