use anyhow::{Context, Result};
use course_db::models::registration::Registration;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::CrmConfig;

/// Pushes new registrations into the CRM as leads.
pub struct CrmService {
    client: reqwest::Client,
    config: CrmConfig,
}

impl CrmService {
    pub fn new(client: reqwest::Client, config: CrmConfig) -> Self {
        Self { client, config }
    }

    pub async fn create_lead(&self, registration: &Registration) -> Result<()> {
        let Some(token) = self.config.access_token.as_deref() else {
            debug!("CRM token not configured, skipping lead for {}", registration.id);
            return Ok(());
        };

        let resp = self
            .client
            .post(&self.config.leads_url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .json(&json!({ "data": [lead_payload(registration)] }))
            .send()
            .await
            .context("CRM request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("CRM rejected lead ({}): {}", status, body));
        }

        info!("CRM lead created for registration {}", registration.id);
        Ok(())
    }
}

pub fn lead_payload(registration: &Registration) -> Value {
    json!({
        "Lead_Source": "AI Course Website",
        "First_Name": registration.first_name,
        "Last_Name": registration.last_name,
        "Email": registration.email,
        "Phone": registration.phone,
        "Country": registration.country,
        "Course": "AI Comprehensive Course Dec 2025",
        "Registration_Type": registration.registration_type.as_str(),
        "Payment_Amount": registration.amount,
        "Payment_Method": registration.payment_method.as_str(),
        "Access_Code": registration.access_code,
        "IP_Address": registration.ip_address,
        "Registration_Date": registration.timestamp.to_rfc3339(),
    })
}
