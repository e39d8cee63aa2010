//! Store keys. Reseller-scoped collections embed the reseller id.

pub const GLOBAL_USED_CODES: &str = "codes:global_used";
pub const REQUESTER_HISTORY: &str = "codes:requester_history";
pub const CODE_USAGE_LOG: &str = "codes:usage_log";
pub const REGISTRATIONS: &str = "registrations";
pub const COURSE_SETTINGS: &str = "settings:course";

pub fn reseller_profile(reseller_id: &str) -> String {
    format!("reseller:{}:profile", reseller_id)
}

pub fn reseller_codes(reseller_id: &str) -> String {
    format!("reseller:{}:codes", reseller_id)
}

pub fn reseller_sales(reseller_id: &str) -> String {
    format!("reseller:{}:sales", reseller_id)
}

pub fn reseller_payouts(reseller_id: &str) -> String {
    format!("reseller:{}:payouts", reseller_id)
}
