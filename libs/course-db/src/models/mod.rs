pub mod code;
pub mod registration;
pub mod reseller;
pub mod settings;
