use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod stripe;

pub use stripe::StripeAdapter;

/// Card holder details forwarded to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Card collected client-side, attached to the intent when present.
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub simulated: bool,
}

impl PaymentIntent {
    /// Stand-in used when no provider is configured or the provider call
    /// fails. Registration goes ahead with it.
    pub fn simulated(at: DateTime<Utc>) -> Self {
        let millis = at.timestamp_millis();
        Self {
            id: format!("pi_{}", millis),
            client_secret: Some(format!("pi_{}_secret_simulated", millis)),
            simulated: true,
        }
    }
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Create a payment intent for `amount_cents` and return its handle.
    async fn create_intent(&self, amount_cents: u64, currency: &str, customer: &Customer) -> Result<PaymentIntent>;

    fn name(&self) -> &str;
}

/// Adapter used when no provider key is configured.
pub struct SimulatedPayments;

#[async_trait]
impl PaymentAdapter for SimulatedPayments {
    async fn create_intent(&self, _amount_cents: u64, _currency: &str, _customer: &Customer) -> Result<PaymentIntent> {
        Ok(PaymentIntent::simulated(Utc::now()))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn simulated_intent_is_keyed_by_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let intent = PaymentIntent::simulated(at);
        assert_eq!(intent.id, "pi_1700000000123");
        assert!(intent.simulated);
    }
}
