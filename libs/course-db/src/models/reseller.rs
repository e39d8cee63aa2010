use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::registration::PaymentMethod;

pub const DEFAULT_COMMISSION_RATE: f64 = 0.10;

/// Display name given to a reseller that has no stored profile yet.
pub const DEFAULT_RESELLER_NAME: &str = "أحمد محمد";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reseller {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub commission_rate: f64,
    pub join_date: DateTime<Utc>,
    pub status: String,
}

impl Reseller {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email: String::new(),
            phone: String::new(),
            commission_rate: DEFAULT_COMMISSION_RATE,
            join_date: Utc::now(),
            status: "active".to_string(),
        }
    }

    /// Whole-dollar commission for one ticket at `amount`.
    pub fn commission_for(&self, amount: u32) -> u32 {
        (amount as f64 * self.commission_rate).round() as u32
    }

    pub fn initial(&self) -> String {
        self.name.chars().next().map(|c| c.to_string()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Confirmed,
    #[default]
    Pending,
    Cancelled,
}

impl SaleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SaleStatus::Confirmed => "مؤكد",
            SaleStatus::Pending => "قيد الانتظار",
            SaleStatus::Cancelled => "ملغي",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: String,
    pub code: String,
    pub student_name: String,
    pub student_email: String,
    pub amount: u32,
    pub commission: u32,
    pub status: SaleStatus,
    pub timestamp: DateTime<Utc>,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutRequest {
    pub reseller_id: String,
    pub amount: u32,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_percent_of_syria_ticket() {
        let reseller = Reseller::new("RESELLER_1", "Ahmed Mohamed");
        assert_eq!(reseller.commission_for(50), 5);
        assert_eq!(reseller.initial(), "A");
    }
}
