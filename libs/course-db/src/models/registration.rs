use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationType {
    SyriaPaid,
    SyriaFree,
    International,
}

impl RegistrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationType::SyriaPaid => "syria-paid",
            RegistrationType::SyriaFree => "syria-free",
            RegistrationType::International => "international",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RegistrationType::SyriaFree => "سوريا مجاني",
            RegistrationType::SyriaPaid => "سوريا مدفوع",
            RegistrationType::International => "دولي",
        }
    }
}

impl std::str::FromStr for RegistrationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "syria-paid" => Ok(RegistrationType::SyriaPaid),
            "syria-free" => Ok(RegistrationType::SyriaFree),
            "international" => Ok(RegistrationType::International),
            other => Err(format!("unknown registration type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RegistrationStatus::Confirmed => "مؤكد",
            RegistrationStatus::Pending => "قيد الانتظار",
            RegistrationStatus::Cancelled => "ملغي",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Stripe,
    SyriaLocal,
    #[serde(rename = "discount_code")]
    DiscountCode,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::SyriaLocal => "syria-local",
            PaymentMethod::DiscountCode => "discount_code",
            PaymentMethod::Cash => "cash",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registration {
    pub id: String,
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
    pub amount: u32,
    pub currency: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    pub status: RegistrationStatus,
    pub access_code: String,
    pub ip_address: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    pub course_id: String,
    pub course_start_date: String,
    pub course_end_date: String,
    pub timestamp: DateTime<Utc>,
}

impl Registration {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_paid(&self) -> bool {
        self.amount > 0
    }
}

/// Admin listing filter. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub registration_type: Option<RegistrationType>,
    #[serde(default)]
    pub status: Option<RegistrationStatus>,
}

impl RegistrationFilter {
    pub fn matches(&self, reg: &Registration) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                reg.first_name.to_lowercase().contains(&term)
                    || reg.last_name.to_lowercase().contains(&term)
                    || reg.email.to_lowercase().contains(&term)
            }
        };

        let matches_country = match self.country.as_deref() {
            None | Some("") => true,
            Some(country) => reg.country == country,
        };

        matches_search
            && matches_country
            && self.registration_type.is_none_or(|t| t == reg.registration_type)
            && self.status.is_none_or(|s| s == reg.status)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_uses_kebab_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&RegistrationType::SyriaFree).unwrap(),
            "\"syria-free\""
        );
        assert_eq!("international".parse::<RegistrationType>(), Ok(RegistrationType::International));
        assert!("vip".parse::<RegistrationType>().is_err());
    }

    #[test]
    fn payment_method_keeps_discount_code_spelling() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::DiscountCode).unwrap(),
            "\"discount_code\""
        );
        assert_eq!(serde_json::to_string(&PaymentMethod::SyriaLocal).unwrap(), "\"syria-local\"");
    }

    #[test]
    fn filter_combines_search_and_fields() {
        let reg = fixtures::registration("r1", "uae", RegistrationType::International, 150);

        let by_name = RegistrationFilter {
            search: Some("SAR".to_string()),
            ..Default::default()
        };
        assert!(by_name.matches(&reg));

        let wrong_country = RegistrationFilter {
            search: Some("sara".to_string()),
            country: Some("syria".to_string()),
            ..Default::default()
        };
        assert!(!wrong_country.matches(&reg));

        let by_status = RegistrationFilter {
            status: Some(RegistrationStatus::Pending),
            ..Default::default()
        };
        assert!(!by_status.matches(&reg));
        assert!(RegistrationFilter::default().matches(&reg));
    }
}
