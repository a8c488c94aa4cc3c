//! Payment callback identifiers
//!
//! Gateway redirects and webhooks do not carry one canonical key: depending
//! on the flow they hold a short-lived token, a payment index (`pidx`), a
//! transaction id (`transaction_id` / `tidx`) or the order id, which is the
//! booking id itself. They are all folded into [`PaymentIdentifier`] and
//! tried in a fixed order.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

static BOOKING_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^BK-\d{8}-[0-9A-F]{8}$").expect("booking id pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentIdentifier {
    /// Order id issued by us, equal to the booking id
    BookingId(String),
    /// Gateway transaction id already recorded on a paid booking
    TransactionId(String),
    /// Reference registered against a booking at initiation
    GatewayReference(String),
    /// Opaque token only the gateway can resolve
    GatewayToken(String),
}

impl PaymentIdentifier {
    pub fn looks_like_booking_id(raw: &str) -> bool {
        BOOKING_ID_PATTERN.is_match(raw)
    }

    /// Rank of the lookup strategy; lower is tried first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::BookingId(_) => 0,
            Self::TransactionId(_) => 1,
            Self::GatewayReference(_) => 2,
            Self::GatewayToken(_) => 3,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::BookingId(v)
            | Self::TransactionId(v)
            | Self::GatewayReference(v)
            | Self::GatewayToken(v) => v,
        }
    }

    /// Lookup candidates for an identifier of unknown kind.
    pub fn candidates_for(raw: &str) -> Vec<PaymentIdentifier> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(4);
        if Self::looks_like_booking_id(raw) {
            out.push(Self::BookingId(raw.to_string()));
        }
        out.push(Self::TransactionId(raw.to_string()));
        out.push(Self::GatewayReference(raw.to_string()));
        out.push(Self::GatewayToken(raw.to_string()));
        out
    }
}

/// Raw parameters of a gateway redirect or webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub identifier: Option<String>,
    #[serde(alias = "product_identity")]
    pub purchase_order_id: Option<String>,
    pub pidx: Option<String>,
    pub token: Option<String>,
    pub transaction_id: Option<String>,
    pub tidx: Option<String>,
}

impl CallbackParams {
    /// Every identifier carried by the callback, in resolution order,
    /// without duplicates.
    pub fn candidates(&self) -> Vec<PaymentIdentifier> {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let mut out = Vec::new();

        if let Some(order_id) = non_empty(&self.purchase_order_id) {
            out.push(PaymentIdentifier::BookingId(order_id));
        }
        for txn in [non_empty(&self.transaction_id), non_empty(&self.tidx)]
            .into_iter()
            .flatten()
        {
            out.push(PaymentIdentifier::TransactionId(txn));
        }
        if let Some(pidx) = non_empty(&self.pidx) {
            out.push(PaymentIdentifier::GatewayReference(pidx.clone()));
            out.push(PaymentIdentifier::GatewayToken(pidx));
        }
        if let Some(token) = non_empty(&self.token) {
            out.push(PaymentIdentifier::GatewayReference(token.clone()));
            out.push(PaymentIdentifier::GatewayToken(token));
        }
        if let Some(raw) = non_empty(&self.identifier) {
            out.extend(PaymentIdentifier::candidates_for(&raw));
        }

        // Stable sort keeps field order within a rank
        out.sort_by_key(PaymentIdentifier::rank);
        let mut seen = Vec::with_capacity(out.len());
        out.retain(|c| {
            if seen.contains(c) {
                false
            } else {
                seen.push(c.clone());
                true
            }
        });
        out
    }
}
