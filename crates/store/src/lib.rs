//! In-memory stores for the attribution core, backed by DashMap for
//! development; swap to Postgres repositories for production. The patient
//! store carries the row-lock capability the intake service depends on.

pub mod affiliate;
pub mod clinic;
pub mod patient;
pub mod ref_code;
pub mod settings;
pub mod touch;

pub use affiliate::AffiliateStore;
pub use clinic::ClinicStore;
pub use patient::PatientStore;
pub use ref_code::RefCodeStore;
pub use settings::SettingsStore;
pub use touch::{NewTouch, TouchStore};
