use anyhow::{Context, Result};
use course_db::models::registration::{Registration, RegistrationStatus, RegistrationType};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::{CourseLinks, EmailConfig};

const CONFIRMATION_SUBJECT: &str = "تأكيد التسجيل - دورة الذكاء الاصطناعي الشاملة";
const CONFIRMATION_TEMPLATE: &str = "course-registration-confirmation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientGroup {
    All,
    Confirmed,
    Pending,
    Syria,
    International,
}

impl RecipientGroup {
    pub fn includes(&self, reg: &Registration) -> bool {
        match self {
            RecipientGroup::All => true,
            RecipientGroup::Confirmed => reg.status == RegistrationStatus::Confirmed,
            RecipientGroup::Pending => reg.status == RegistrationStatus::Pending,
            RecipientGroup::Syria => reg.country == "syria",
            RecipientGroup::International => reg.registration_type == RegistrationType::International,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    Welcome,
    Reminder,
    Access,
    Completion,
}

impl EmailTemplate {
    pub fn subject(&self) -> &'static str {
        match self {
            EmailTemplate::Welcome => "مرحباً بك في دورة الذكاء الاصطناعي الشاملة",
            EmailTemplate::Reminder => "تذكير: دورة الذكاء الاصطناعي تبدأ غداً",
            EmailTemplate::Access => "معلومات الوصول لدورة الذكاء الاصطناعي",
            EmailTemplate::Completion => "تهانينا! أتممت دورة الذكاء الاصطناعي بنجاح",
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            EmailTemplate::Welcome => {
                "مرحباً {{firstName}},\n\nنرحب بك في دورة الذكاء الاصطناعي الشاملة. نتطلع لرؤيتك في الدورة التي ستبدأ في 15 ديسمبر 2025.\n\nكود الوصول الخاص بك: {{accessCode}}\n\nتحياتنا,\nفريق أُبي سكر"
            }
            EmailTemplate::Reminder => {
                "مرحباً {{firstName}},\n\nنذكرك بأن دورة الذكاء الاصطناعي الشاملة ستبدأ غداً. تأكد من تجهيز جهازك والاتصال بالإنترنت.\n\nرابط الوصول: {{courseLink}}\n\nنراك قريباً!"
            }
            EmailTemplate::Access => {
                "مرحباً {{firstName}},\n\nإليك معلومات الوصول الكاملة للدورة:\n\nكود الوصول: {{accessCode}}\nرابط المنصة: {{platformLink}}\nمجموعة التليجرام: {{telegramLink}}\n\nموفقين!"
            }
            EmailTemplate::Completion => {
                "عزيزي {{firstName}},\n\nتهانينا الحارة على إتمام دورة الذكاء الاصطناعي الشاملة بنجاح!\n\nيمكنك الآن تحميل شهادة الإتمام من الرابط التالي:\n{{certificateLink}}\n\nنفخر بإنجازك ونتمنى لك التوفيق في مسيرتك!"
            }
        }
    }
}

/// Fills the `{{...}}` placeholders for one recipient.
pub fn render(text: &str, reg: &Registration, links: &CourseLinks) -> String {
    text.replace("{{firstName}}", &reg.first_name)
        .replace("{{accessCode}}", &reg.access_code)
        .replace("{{courseLink}}", &links.course)
        .replace("{{platformLink}}", &links.platform)
        .replace("{{telegramLink}}", &links.telegram)
        .replace("{{certificateLink}}", &links.certificate)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkEmailReport {
    pub recipients: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct EmailService {
    client: reqwest::Client,
    config: EmailConfig,
    links: CourseLinks,
}

impl EmailService {
    pub fn new(client: reqwest::Client, config: EmailConfig, links: CourseLinks) -> Self {
        Self { client, config, links }
    }

    pub async fn send_confirmation(&self, registration: &Registration) -> Result<()> {
        let data = serde_json::to_value(registration).context("Failed to serialize registration")?;
        self.deliver(json!({
            "to": registration.email,
            "subject": CONFIRMATION_SUBJECT,
            "template": CONFIRMATION_TEMPLATE,
            "data": data,
        }))
        .await
    }

    /// Sends `subject`/`message` to every recipient, rendering placeholders
    /// per person. One failed delivery does not stop the rest.
    pub async fn send_bulk(&self, recipients: &[Registration], subject: &str, message: &str) -> BulkEmailReport {
        let mut report = BulkEmailReport {
            recipients: recipients.len(),
            ..Default::default()
        };

        for reg in recipients {
            let payload = json!({
                "to": reg.email,
                "subject": render(subject, reg, &self.links),
                "text": render(message, reg, &self.links),
            });

            match self.deliver(payload).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Failed to email {}: {}", reg.email, e);
                }
            }
        }

        info!(
            "Bulk email finished: {} sent, {} failed of {}",
            report.sent, report.failed, report.recipients
        );
        report
    }

    async fn deliver(&self, payload: serde_json::Value) -> Result<()> {
        let Some(url) = self.config.api_url.as_deref() else {
            info!("Email delivery not configured, logging instead: to={} subject={}", payload["to"], payload["subject"]);
            return Ok(());
        };

        let mut req = self.client.post(url).json(&payload);
        if let Some(token) = self.config.api_token.as_deref() {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.context("Email request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("Email API returned {}", resp.status()));
        }
        Ok(())
    }
}
