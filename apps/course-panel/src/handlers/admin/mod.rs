// Admin API. Routes are mounted under /admin/api.
pub mod codes;
pub mod dashboard;
pub mod email;
pub mod registrations;
pub mod settings;

pub use codes::{grant_support_code, requester_history, usage_log, used_codes};
pub use dashboard::{get_recent, get_stats};
pub use email::send_bulk_email;
pub use registrations::{
    delete_registration, export_registrations, get_registration, list_registrations,
    update_status,
};
pub use settings::{get_course_settings, save_course_settings};
