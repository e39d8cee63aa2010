use std::sync::Arc;

use course_db::repositories::{RegistrationRepository, ResellerRepository, SettingsRepository};
use course_db::{CodeLedger, Entropy, KvStore, SystemEntropy};

use axum::extract::FromRef;

use crate::config::PanelConfig;
use crate::services::analytics_service::AnalyticsService;
use crate::services::coupon_service::CouponService;
use crate::services::crm_service::CrmService;
use crate::services::email_service::EmailService;
use crate::services::http_client;
use crate::services::payment::{PaymentAdapter, SimulatedPayments, StripeAdapter};
use crate::services::registration_service::RegistrationService;
use crate::services::reseller_service::ResellerService;
use crate::utils::TrustedProxies;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PanelConfig>,
    pub store_backend: &'static str,
    pub ledger: Arc<CodeLedger>,
    pub registrations: RegistrationRepository,
    pub settings: SettingsRepository,
    pub trusted_proxies: TrustedProxies,

    pub registration_service: Arc<RegistrationService>,
    pub reseller_service: Arc<ResellerService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub email_service: Arc<EmailService>,
    pub coupon_service: Arc<CouponService>,
}

impl AppState {
    pub fn new(config: PanelConfig, store: Arc<dyn KvStore>) -> Self {
        let entropy: Arc<dyn Entropy> = Arc::new(SystemEntropy);
        let ledger = Arc::new(CodeLedger::new(store.clone(), entropy.clone()));
        let registrations = RegistrationRepository::new(store.clone());
        let settings = SettingsRepository::new(store.clone());
        let client = http_client();

        let payments: Arc<dyn PaymentAdapter> = match config.stripe.secret_key.clone() {
            Some(key) => Arc::new(StripeAdapter::new(client.clone(), key, config.stripe.api_base.clone())),
            None => {
                tracing::warn!("No Stripe key configured, international payments are simulated");
                Arc::new(SimulatedPayments)
            }
        };

        let crm = Arc::new(CrmService::new(client.clone(), config.crm.clone()));
        let email_service = Arc::new(EmailService::new(client, config.email.clone(), config.links.clone()));
        let reseller_service = ResellerService::new(
            ledger.clone(),
            ResellerRepository::new(store.clone()),
            settings.clone(),
        );

        let registration_service = Arc::new(RegistrationService::new(
            ledger.clone(),
            entropy,
            registrations.clone(),
            settings.clone(),
            reseller_service.clone(),
            payments,
            crm,
            email_service.clone(),
        ));

        Self {
            store_backend: store.backend(),
            ledger,
            analytics_service: Arc::new(AnalyticsService::new(registrations.clone())),
            coupon_service: Arc::new(CouponService::new(config.public_host.clone())),
            registrations,
            settings,
            trusted_proxies: TrustedProxies::new(config.trusted_proxies.clone()),
            registration_service,
            reseller_service: Arc::new(reseller_service),
            email_service,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for TrustedProxies {
    fn from_ref(state: &AppState) -> Self {
        state.trusted_proxies.clone()
    }
}
