//! Payment gateway adapters

mod khalti;
mod sandbox;

use std::sync::Arc;
use std::time::Duration;

pub use khalti::{KhaltiConfig, KhaltiGateway};
pub use sandbox::SandboxGateway;

use crate::config::{PaymentConfig, PaymentMode};
use crate::domain::payment::PaymentGateway;
use crate::shared::errors::InfraError;

/// Build the gateway selected by `payment.mode`.
pub fn build_gateway(config: &PaymentConfig) -> Result<Arc<dyn PaymentGateway>, InfraError> {
    match config.mode {
        PaymentMode::Sandbox => Ok(Arc::new(
            SandboxGateway::new(config.website_url.clone()).with_auto_complete(true),
        )),
        PaymentMode::Khalti => {
            let secret_key = config
                .secret_key
                .clone()
                .ok_or_else(|| InfraError::Config("payment.secret_key is not set".into()))?;
            let gateway = KhaltiGateway::new(KhaltiConfig {
                base_url: config.base_url.clone(),
                secret_key,
                return_url: config.return_url.clone(),
                website_url: config.website_url.clone(),
                timeout: Duration::from_secs(config.timeout_secs),
            })
            .map_err(|e| InfraError::Config(e.to_string()))?;
            Ok(Arc::new(gateway))
        }
    }
}
