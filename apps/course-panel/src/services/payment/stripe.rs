use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{Customer, PaymentAdapter, PaymentIntent};

pub struct StripeAdapter {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: Option<String>,
}

impl StripeAdapter {
    pub fn new(client: reqwest::Client, secret_key: String, api_base: String) -> Self {
        Self {
            client,
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn form(amount_cents: u64, currency: &str, customer: &Customer) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("amount", amount_cents.to_string()),
            ("currency", currency.to_lowercase()),
            ("receipt_email", customer.email.clone()),
            ("description", "AI Comprehensive Course Dec 2025".to_string()),
            ("metadata[customer_name]", customer.name.clone()),
            ("metadata[customer_phone]", customer.phone.clone()),
        ];
        if let Some(pm) = &customer.payment_method {
            form.push(("payment_method", pm.clone()));
        }
        form
    }
}

#[async_trait]
impl PaymentAdapter for StripeAdapter {
    async fn create_intent(&self, amount_cents: u64, currency: &str, customer: &Customer) -> Result<PaymentIntent> {
        let resp = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&Self::form(amount_cents, currency, customer))
            .send()
            .await
            .context("Stripe request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Stripe Error ({}): {}", status, body));
        }

        let intent: IntentResponse = resp.json().await.context("Invalid Stripe response")?;
        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            simulated: false,
        })
    }

    fn name(&self) -> &str {
        "stripe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_carries_cents_and_lowercase_currency() {
        let customer = Customer {
            name: "Sara Ali".to_string(),
            email: "sara@example.com".to_string(),
            phone: "+971501234567".to_string(),
            payment_method: None,
        };
        let form = StripeAdapter::form(15000, "USD", &customer);
        assert!(form.contains(&("amount", "15000".to_string())));
        assert!(form.contains(&("currency", "usd".to_string())));
        assert!(form.contains(&("receipt_email", "sara@example.com".to_string())));
        assert!(!form.iter().any(|(k, _)| *k == "payment_method"));

        let with_card = Customer {
            payment_method: Some("pm_card_visa".to_string()),
            ..customer
        };
        let form = StripeAdapter::form(15000, "USD", &with_card);
        assert!(form.contains(&("payment_method", "pm_card_visa".to_string())));
    }
}
