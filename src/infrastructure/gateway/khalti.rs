//! Khalti ePayment gateway client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::payment::{
    GatewayError, GatewayLookup, GatewayPaymentState, PaymentGateway, PaymentSession,
    PaymentSessionRequest,
};

#[derive(Debug, Clone)]
pub struct KhaltiConfig {
    /// e.g. `https://a.khalti.com/api/v2`
    pub base_url: String,
    pub secret_key: String,
    pub return_url: String,
    pub website_url: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct CustomerInfo<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct InitiatePayload<'a> {
    return_url: &'a str,
    website_url: &'a str,
    amount: i64,
    purchase_order_id: &'a str,
    purchase_order_name: &'a str,
    customer_info: CustomerInfo<'a>,
}

#[derive(Deserialize, Debug)]
struct InitiateResponse {
    pidx: String,
    payment_url: String,
}

#[derive(Serialize)]
struct LookupPayload<'a> {
    pidx: &'a str,
}

#[derive(Deserialize, Debug)]
struct LookupResponse {
    pidx: String,
    total_amount: i64,
    status: String,
    #[serde(default)]
    transaction_id: Option<String>,
}

pub struct KhaltiGateway {
    config: KhaltiConfig,
    client: Client,
}

impl KhaltiGateway {
    pub fn new(config: KhaltiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, GatewayError> {
        let res = self
            .client
            .post(self.url(path))
            .header("authorization", format!("Key {}", self.config.secret_key))
            .json(body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        warn!(path, status = status.as_u16(), "Khalti rejected request");
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn map_transport(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

#[async_trait]
impl PaymentGateway for KhaltiGateway {
    fn name(&self) -> &'static str {
        "khalti"
    }

    async fn create_payment_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<PaymentSession, GatewayError> {
        let payload = InitiatePayload {
            return_url: &self.config.return_url,
            website_url: &self.config.website_url,
            amount: request.amount_paisa,
            purchase_order_id: &request.booking_id,
            purchase_order_name: &request.product_name,
            customer_info: CustomerInfo {
                name: &request.customer_id,
            },
        };

        debug!(booking_id = %request.booking_id, amount_paisa = request.amount_paisa, "Initiating Khalti payment");

        let res = self.post("epayment/initiate/", &payload).await?;
        let body: InitiateResponse = res
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        info!(booking_id = %request.booking_id, pidx = %body.pidx, "Khalti payment session created");

        Ok(PaymentSession {
            payment_url: body.payment_url,
            gateway_reference: body.pidx,
        })
    }

    async fn lookup(&self, reference: &str) -> Result<GatewayLookup, GatewayError> {
        let res = match self
            .post("epayment/lookup/", &LookupPayload { pidx: reference })
            .await
        {
            Ok(res) => res,
            Err(GatewayError::Rejected { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16()
                    || status == StatusCode::BAD_REQUEST.as_u16() =>
            {
                return Err(GatewayError::NotFound(reference.to_string()));
            }
            Err(e) => return Err(e),
        };

        let body: LookupResponse = res
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        Ok(GatewayLookup {
            gateway_reference: body.pidx,
            order_id: None,
            gateway_txn_id: body.transaction_id.filter(|t| !t.is_empty()),
            state: body.status.parse::<GatewayPaymentState>()?,
            amount_paisa: body.total_amount,
        })
    }
}
