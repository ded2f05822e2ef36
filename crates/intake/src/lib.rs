//! Intake attribution — maps promo/referral codes from intake forms and
//! webhooks to affiliates, with a diagnosable failure taxonomy and a locked
//! first-wins write path that stays correct under concurrent webhook
//! delivery.

pub mod referrer;
pub mod result;
pub mod service;

pub use result::{FailureReason, IntakeAttributionResult};
pub use service::IntakeAttributionService;
