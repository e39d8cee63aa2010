use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseSettings {
    pub course_id: String,
    pub start_date: String,
    pub end_date: String,
    pub syria_price: u32,
    pub international_price: u32,
    pub max_participants: u32,
    pub enable_registration: bool,
}

impl CourseSettings {
    /// Price of one ticket of `ticket_type`; unknown types sell at the Syria price.
    pub fn ticket_price(&self, ticket_type: &str) -> u32 {
        match ticket_type {
            "international" => self.international_price,
            "syria-free" => 0,
            _ => self.syria_price,
        }
    }
}

impl Default for CourseSettings {
    fn default() -> Self {
        Self {
            course_id: "ai-comprehensive-dec-2025".to_string(),
            start_date: "2025-12-15".to_string(),
            end_date: "2026-01-15".to_string(),
            syria_price: 50,
            international_price: 150,
            max_participants: 500,
            enable_registration: true,
        }
    }
}
