pub mod analytics_service;
pub mod coupon_service;
pub mod crm_service;
pub mod email_service;
pub mod export_service;
pub mod payment;
pub mod registration_service;
pub mod reseller_service;

use std::time::Duration;

/// Outbound client shared by the payment, CRM and email integrations.
pub fn http_client() -> reqwest::Client {
    // Already installed is fine; any other outcome leaves reqwest without TLS.
    let _ = rustls::crypto::ring::default_provider().install_default();

    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use course_db::models::registration::{
        PaymentMethod, Registration, RegistrationStatus, RegistrationType,
    };

    pub fn registration(id: &str, country: &str, kind: RegistrationType, amount: u32) -> Registration {
        let (payment_method, status) = match kind {
            RegistrationType::SyriaFree => (PaymentMethod::DiscountCode, RegistrationStatus::Confirmed),
            RegistrationType::SyriaPaid => (PaymentMethod::SyriaLocal, RegistrationStatus::Pending),
            RegistrationType::International => (PaymentMethod::Stripe, RegistrationStatus::Confirmed),
        };

        Registration {
            id: id.to_string(),
            first_name: "Sara".to_string(),
            last_name: "Ali".to_string(),
            email: format!("{}@example.com", id.to_lowercase()),
            phone: "+971501234567".to_string(),
            country: country.to_string(),
            registration_type: kind,
            discount_code: None,
            reseller_id: None,
            amount,
            currency: "USD".to_string(),
            payment_method,
            payment_intent_id: None,
            status,
            access_code: "AI2025-ABC123XY".to_string(),
            ip_address: "10.0.0.50".to_string(),
            user_agent: None,
            referrer: None,
            course_id: "ai-comprehensive-dec-2025".to_string(),
            course_start_date: "2025-12-15".to_string(),
            course_end_date: "2026-01-15".to_string(),
            timestamp: Utc::now(),
        }
    }
}
