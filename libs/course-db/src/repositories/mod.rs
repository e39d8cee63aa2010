pub mod registration_repo;
pub mod reseller_repo;
pub mod settings_repo;

pub use registration_repo::RegistrationRepository;
pub use reseller_repo::ResellerRepository;
pub use settings_repo::SettingsRepository;
