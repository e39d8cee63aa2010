use std::sync::{Arc, LazyLock};

use anyhow::Context;
use course_db::models::code::{DiscountCode, RedemptionMetadata};
use course_db::models::registration::{
    PaymentMethod, Registration, RegistrationStatus, RegistrationType,
};
use course_db::repositories::{RegistrationRepository, SettingsRepository};
use course_db::{CodeLedger, Decision, Entropy, Rejection};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::crm_service::CrmService;
use super::email_service::EmailService;
use super::payment::{Customer, PaymentAdapter, PaymentIntent};
use super::reseller_service::{CodeSale, ResellerService};
use crate::utils::ClientInfo;

const ACCESS_CODE_PREFIX: &str = "AI2025";
const ACCESS_CODE_LEN: usize = 8;
const REG_ID_TAIL: usize = 4;
const MIN_PHONE_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub registration_type: RegistrationType,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub reseller_id: Option<String>,
    #[serde(default)]
    pub payment_method_id: Option<String>,
}

impl RegistrationRequest {
    fn normalized(self) -> Self {
        let trimmed = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            phone: self.phone.trim().to_string(),
            country: self.country.trim().to_string(),
            registration_type: self.registration_type,
            discount_code: trimmed(self.discount_code),
            reseller_id: trimmed(self.reseller_id),
            payment_method_id: trimmed(self.payment_method_id),
        }
    }

    fn validate(&self) -> Result<(), RegistrationError> {
        if self.first_name.is_empty() || self.last_name.is_empty() {
            return Err(RegistrationError::Invalid("يرجى إدخال الاسم الأول واسم العائلة"));
        }
        if !EMAIL_RE.is_match(&self.email) {
            return Err(RegistrationError::Invalid("يرجى إدخال بريد إلكتروني صحيح"));
        }
        if self.phone.chars().count() < MIN_PHONE_LEN {
            return Err(RegistrationError::Invalid("يرجى إدخال رقم هاتف صحيح"));
        }
        if self.country.is_empty() {
            return Err(RegistrationError::Invalid("يرجى اختيار البلد"));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid registration: {0}")]
    Invalid(&'static str),
    #[error("registration is closed")]
    Closed,
    #[error("course is full")]
    Full,
    #[error("discount code rejected: {0}")]
    CodeRejected(Rejection),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RegistrationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            RegistrationError::Invalid(msg) => *msg,
            RegistrationError::Closed => "التسجيل مغلق حالياً",
            RegistrationError::Full => "عذراً، اكتمل عدد المشاركين في الدورة",
            RegistrationError::CodeRejected(reason) => reason.user_message(),
            RegistrationError::Internal(_) => {
                "حدث خطأ في التسجيل. يرجى المحاولة مرة أخرى أو التواصل مع الدعم الفني."
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedRegistration {
    pub registration: Registration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentIntent>,
}

struct Payment {
    amount: u32,
    method: PaymentMethod,
    status: RegistrationStatus,
    intent: Option<PaymentIntent>,
}

pub struct RegistrationService {
    ledger: Arc<CodeLedger>,
    entropy: Arc<dyn Entropy>,
    registrations: RegistrationRepository,
    settings: SettingsRepository,
    resellers: ResellerService,
    payments: Arc<dyn PaymentAdapter>,
    crm: Arc<CrmService>,
    email: Arc<EmailService>,
}

impl RegistrationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<CodeLedger>,
        entropy: Arc<dyn Entropy>,
        registrations: RegistrationRepository,
        settings: SettingsRepository,
        resellers: ResellerService,
        payments: Arc<dyn PaymentAdapter>,
        crm: Arc<CrmService>,
        email: Arc<EmailService>,
    ) -> Self {
        Self {
            ledger,
            entropy,
            registrations,
            settings,
            resellers,
            payments,
            crm,
            email,
        }
    }

    pub async fn register(
        &self,
        request: RegistrationRequest,
        client: &ClientInfo,
    ) -> Result<CompletedRegistration, RegistrationError> {
        let request = request.normalized();
        request.validate()?;

        let settings = self.settings.course().await?;
        if !settings.enable_registration {
            return Err(RegistrationError::Closed);
        }
        let active = self.registrations.count_active().await?;
        if active >= settings.max_participants as usize {
            return Err(RegistrationError::Full);
        }

        let payment = match request.registration_type {
            RegistrationType::International => {
                let amount = settings.international_price;
                let intent = self.payment_intent(&request, amount).await;
                Payment {
                    amount,
                    method: PaymentMethod::Stripe,
                    status: RegistrationStatus::Confirmed,
                    intent: Some(intent),
                }
            }
            RegistrationType::SyriaPaid => Payment {
                amount: settings.syria_price,
                method: PaymentMethod::SyriaLocal,
                status: RegistrationStatus::Pending,
                intent: None,
            },
            RegistrationType::SyriaFree => {
                self.redeem_code(&request, client).await?;
                Payment {
                    amount: 0,
                    method: PaymentMethod::DiscountCode,
                    status: RegistrationStatus::Confirmed,
                    intent: None,
                }
            }
        };

        let now = self.entropy.now();
        let registration = Registration {
            id: format!("REG_{}", now.timestamp_millis()),
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            phone: request.phone,
            country: request.country,
            registration_type: request.registration_type,
            discount_code: request.discount_code,
            reseller_id: request.reseller_id,
            amount: payment.amount,
            currency: "USD".to_string(),
            payment_method: payment.method,
            payment_intent_id: payment.intent.as_ref().map(|i| i.id.clone()),
            status: payment.status,
            access_code: format!(
                "{}-{}",
                ACCESS_CODE_PREFIX,
                self.entropy.base36(ACCESS_CODE_LEN).to_uppercase()
            ),
            ip_address: client.requester_id.clone(),
            user_agent: client.user_agent.clone(),
            referrer: client.referrer.clone(),
            course_id: settings.course_id.clone(),
            course_start_date: settings.start_date.clone(),
            course_end_date: settings.end_date.clone(),
            timestamp: now,
        };

        let entropy = self.entropy.clone();
        let registration = match self
            .registrations
            .insert_unique(registration, move || entropy.base36(REG_ID_TAIL).to_uppercase())
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to store registration: {:#}", e);
                return Err(RegistrationError::Internal(e));
            }
        };
        info!(
            "Registered {} ({}) as {}",
            registration.id,
            registration.registration_type.as_str(),
            registration.status.as_str()
        );

        self.book_reseller_sale(&registration, settings.syria_price).await;
        self.notify_downstream(registration.clone());

        Ok(CompletedRegistration {
            registration,
            payment: payment.intent,
        })
    }

    async fn redeem_code(&self, request: &RegistrationRequest, client: &ClientInfo) -> Result<(), RegistrationError> {
        let Some(code) = request.discount_code.as_deref() else {
            return Err(RegistrationError::Invalid("يرجى إدخال كود الخصم"));
        };

        let metadata = RedemptionMetadata {
            user_agent: client.user_agent.clone(),
            email: Some(request.email.clone()),
            reseller_id: request.reseller_id.clone(),
        };

        let decision = self
            .ledger
            .redeem(code, &client.requester_id, metadata)
            .await
            .context("Code ledger unavailable")?;

        match decision {
            Decision::Accepted => Ok(()),
            Decision::Rejected(reason) => {
                info!("Code {} rejected for {}: {}", code, client.requester_id, reason);
                Err(RegistrationError::CodeRejected(reason))
            }
        }
    }

    async fn payment_intent(&self, request: &RegistrationRequest, amount: u32) -> PaymentIntent {
        let customer = Customer {
            name: format!("{} {}", request.first_name, request.last_name),
            email: request.email.clone(),
            phone: request.phone.clone(),
            payment_method: request.payment_method_id.clone(),
        };

        match self.payments.create_intent(amount as u64 * 100, "USD", &customer).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(
                    "{} payment intent failed, using simulated intent: {:#}",
                    self.payments.name(),
                    e
                );
                PaymentIntent::simulated(self.entropy.now())
            }
        }
    }

    async fn book_reseller_sale(&self, registration: &Registration, ticket_price: u32) {
        let (Some(code), Some(reseller_id)) = (
            registration.discount_code.as_deref(),
            registration.reseller_id.as_deref(),
        ) else {
            return;
        };
        if DiscountCode::parse(code).is_none_or(|c| c.is_support()) {
            return;
        }

        let sale = CodeSale {
            reseller_id,
            code,
            student_name: registration.full_name(),
            student_email: registration.email.clone(),
            requester_id: &registration.ip_address,
            ticket_price,
        };
        match self.resellers.record_code_sale(sale, registration.timestamp).await {
            Ok(Some(_)) => {}
            Ok(None) => warn!("Code {} is not an unused code of reseller {}", code, reseller_id),
            Err(e) => warn!("Failed to book sale of {} for {}: {:#}", code, reseller_id, e),
        }
    }

    fn notify_downstream(&self, registration: Registration) {
        let crm = self.crm.clone();
        let email = self.email.clone();
        tokio::spawn(async move {
            if let Err(e) = crm.create_lead(&registration).await {
                warn!("CRM lead for {} failed: {:#}", registration.id, e);
            }
            if let Err(e) = email.send_confirmation(&registration).await {
                warn!("Confirmation email for {} failed: {:#}", registration.id, e);
            }
        });
    }
}
