use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Literal granted by hand to people who reach out directly.
pub const SUPPORT_CODE: &str = "ObaiLovesAi";

/// Region marker every reseller code carries between prefix and suffix.
pub const CODE_REGION: &str = "SYRIA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountCode {
    Support,
    Reseller { prefix: String, suffix: String },
}

impl DiscountCode {
    /// Parses `ObaiLovesAi` or `PREFIX-SYRIA-SUFFIX`, where PREFIX is one or
    /// more of `A-Z` and SUFFIX one or more of `A-Z0-9`. Case-sensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == SUPPORT_CODE {
            return Some(DiscountCode::Support);
        }

        let (prefix, rest) = raw.split_once('-')?;
        let suffix = rest.strip_prefix(CODE_REGION)?.strip_prefix('-')?;

        let prefix_ok = !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_uppercase());
        let suffix_ok = !suffix.is_empty()
            && suffix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());

        if prefix_ok && suffix_ok {
            Some(DiscountCode::Reseller {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            })
        } else {
            None
        }
    }

    pub fn is_support(&self) -> bool {
        matches!(self, DiscountCode::Support)
    }

    pub fn prefix(&self) -> Option<&str> {
        match self {
            DiscountCode::Support => None,
            DiscountCode::Reseller { prefix, .. } => Some(prefix),
        }
    }
}

impl std::fmt::Display for DiscountCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountCode::Support => write!(f, "{}", SUPPORT_CODE),
            DiscountCode::Reseller { prefix, suffix } => {
                write!(f, "{}-{}-{}", prefix, CODE_REGION, suffix)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CodeStatus {
    #[default]
    Unused,
    Used,
    Expired,
}

impl CodeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CodeStatus::Unused => "غير مستخدم",
            CodeStatus::Used => "مستخدم",
            CodeStatus::Expired => "منتهي",
        }
    }
}

/// One entry of a reseller's issued batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedCode {
    pub code: String,
    pub reseller_name: String,
    pub ticket_type: String,
    pub status: CodeStatus,
    /// Ticket price and commission at issuance, in whole dollars.
    #[serde(default)]
    pub amount: u32,
    #[serde(default)]
    pub commission: u32,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub used_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RedemptionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reseller_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequesterEntry {
    pub code: String,
    pub used_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: RedemptionMetadata,
}

/// Append-only audit record kept for admin tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageLogEntry {
    pub code: String,
    pub requester_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_support_literal() {
        assert_eq!(DiscountCode::parse("ObaiLovesAi"), Some(DiscountCode::Support));
        assert_eq!(DiscountCode::parse("obailovesai"), None);
    }

    #[test]
    fn parses_reseller_code() {
        let code = DiscountCode::parse("AHMED-SYRIA-123456AB12").unwrap();
        assert_eq!(code.prefix(), Some("AHMED"));
        assert_eq!(code.to_string(), "AHMED-SYRIA-123456AB12");
    }

    #[test]
    fn rejects_malformed_codes() {
        for raw in [
            "not-a-real-code",
            "",
            "-SYRIA-ABC",
            "AHMED-SYRIA-",
            "ahmed-SYRIA-ABC",
            "AHMED-LEBANON-ABC",
            "AHMED-SYRIA-abc",
            "AHMED-SYRIA-AB-C",
            "AH1-SYRIA-ABC",
            " AHMED-SYRIA-ABC",
        ] {
            assert_eq!(DiscountCode::parse(raw), None, "{raw:?} should not parse");
        }
    }

    #[test]
    fn batch_entry_tolerates_missing_optional_fields() {
        let raw = r#"{
            "code": "AHMED-SYRIA-ABC123",
            "reseller_name": "Ahmed Mohamed",
            "ticket_type": "syria-paid",
            "status": "unused",
            "issued_at": "2025-01-15T10:30:00Z"
        }"#;
        let entry: GeneratedCode = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.status, CodeStatus::Unused);
        assert_eq!((entry.amount, entry.commission), (0, 0));
        assert!(entry.used_by.is_none());
    }
}
