//! In-process gateway for development and tests
//!
//! Sessions live in memory. With `auto_complete` every session is paid as
//! soon as it is created; otherwise tests drive it with [`SandboxGateway::complete`]
//! and [`SandboxGateway::fail`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::payment::{
    GatewayError, GatewayLookup, GatewayPaymentState, PaymentGateway, PaymentSession,
    PaymentSessionRequest,
};

#[derive(Debug, Clone)]
struct SandboxPayment {
    order_id: String,
    amount_paisa: i64,
    state: GatewayPaymentState,
    txn_id: Option<String>,
}

pub struct SandboxGateway {
    base_url: String,
    auto_complete: bool,
    delay: Option<Duration>,
    sessions: DashMap<String, SandboxPayment>,
    counter: AtomicU64,
}

impl SandboxGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auto_complete: false,
            delay: None,
            sessions: DashMap::new(),
            counter: AtomicU64::new(1),
        }
    }

    pub fn with_auto_complete(mut self, auto_complete: bool) -> Self {
        self.auto_complete = auto_complete;
        self
    }

    /// Delay every session creation, to exercise caller timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Mark a session paid with transaction id `txn_id`.
    pub fn complete(&self, pidx: &str, txn_id: &str) -> bool {
        self.set_state(pidx, GatewayPaymentState::Completed, Some(txn_id.to_string()))
    }

    pub fn fail(&self, pidx: &str, state: GatewayPaymentState) -> bool {
        self.set_state(pidx, state, None)
    }

    /// Change the amount the gateway reports for a session.
    pub fn set_amount(&self, pidx: &str, amount_paisa: i64) -> bool {
        match self.sessions.get_mut(pidx) {
            Some(mut payment) => {
                payment.amount_paisa = amount_paisa;
                true
            }
            None => false,
        }
    }

    fn set_state(&self, pidx: &str, state: GatewayPaymentState, txn_id: Option<String>) -> bool {
        match self.sessions.get_mut(pidx) {
            Some(mut payment) => {
                payment.state = state;
                payment.txn_id = txn_id;
                true
            }
            None => false,
        }
    }

    fn to_lookup(pidx: &str, payment: &SandboxPayment) -> GatewayLookup {
        GatewayLookup {
            gateway_reference: pidx.to_string(),
            order_id: Some(payment.order_id.clone()),
            gateway_txn_id: payment.txn_id.clone(),
            state: payment.state,
            amount_paisa: payment.amount_paisa,
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    async fn create_payment_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<PaymentSession, GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let pidx = format!("sbx-{:06}", n);
        let (state, txn_id) = if self.auto_complete {
            (GatewayPaymentState::Completed, Some(format!("SBX-TXN-{:06}", n)))
        } else {
            (GatewayPaymentState::Initiated, None)
        };

        self.sessions.insert(
            pidx.clone(),
            SandboxPayment {
                order_id: request.booking_id.clone(),
                amount_paisa: request.amount_paisa,
                state,
                txn_id,
            },
        );

        debug!(booking_id = %request.booking_id, pidx = %pidx, "Sandbox payment session created");

        Ok(PaymentSession {
            payment_url: format!("{}/pay/{}", self.base_url.trim_end_matches('/'), pidx),
            gateway_reference: pidx,
        })
    }

    async fn lookup(&self, reference: &str) -> Result<GatewayLookup, GatewayError> {
        if let Some(payment) = self.sessions.get(reference) {
            return Ok(Self::to_lookup(reference, &payment));
        }

        // Transaction ids resolve too, like a token lookup would
        self.sessions
            .iter()
            .find(|e| e.txn_id.as_deref() == Some(reference))
            .map(|e| Self::to_lookup(e.key(), e.value()))
            .ok_or_else(|| GatewayError::NotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PaymentSessionRequest {
        PaymentSessionRequest {
            booking_id: "BK-20240601-0A1B2C3D".into(),
            amount_paisa: 500,
            product_name: "EV charging".into(),
            customer_id: "u1".into(),
        }
    }

    #[tokio::test]
    async fn manual_sessions_complete_on_demand() {
        let gw = SandboxGateway::new("http://sandbox.local");
        let session = gw.create_payment_session(request()).await.unwrap();
        assert_eq!(session.payment_url, format!("http://sandbox.local/pay/{}", session.gateway_reference));

        let before = gw.lookup(&session.gateway_reference).await.unwrap();
        assert_eq!(before.state, GatewayPaymentState::Initiated);

        assert!(gw.complete(&session.gateway_reference, "T1"));
        let by_txn = gw.lookup("T1").await.unwrap();
        assert_eq!(by_txn.gateway_reference, session.gateway_reference);
        assert_eq!(by_txn.order_id.as_deref(), Some("BK-20240601-0A1B2C3D"));
        assert_eq!(by_txn.amount_paisa, 500);
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let gw = SandboxGateway::new("http://sandbox.local").with_auto_complete(true);
        assert!(matches!(gw.lookup("nope").await, Err(GatewayError::NotFound(_))));

        let session = gw.create_payment_session(request()).await.unwrap();
        let lookup = gw.lookup(&session.gateway_reference).await.unwrap();
        assert_eq!(lookup.state, GatewayPaymentState::Completed);
        assert!(lookup.gateway_txn_id.is_some());
    }
}
