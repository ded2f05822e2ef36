//! Structured outcome of an intake attribution call. Expected business
//! failures are values here, never errors — callers always get a fully
//! populated result telling them exactly what happened and why.

use serde::Serialize;

use clinic_core::types::{AffiliateId, Confidence, TouchId};

/// Why an intake attribution call did not (fully) attribute. Each variant is
/// a distinct, user-diagnosable outcome; there is no generic "not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// The patient id does not exist.
    PatientNotFound,
    /// No code row for this clinic — often a legacy-system migration gap.
    CodeNotFound,
    /// The code exists, but belongs to a different clinic.
    ClinicMismatch,
    /// The code exists in this clinic but is deactivated.
    CodeInactive,
    /// The code resolves to an affiliate that is not active.
    AffiliateInactive,
    /// The patient already has an affiliate; traffic was still recorded.
    /// Reported with `success = true` — a partial success, not a failure.
    AlreadyAttributed,
    /// Unexpected persistence failure; the message carries the underlying
    /// error text for diagnostics.
    DatabaseError,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeAttributionResult {
    pub success: bool,
    pub affiliate_id: Option<AffiliateId>,
    pub ref_code: Option<String>,
    pub touch_id: Option<TouchId>,
    pub model: Option<String>,
    pub confidence: Option<Confidence>,
    pub weight: Option<f64>,
    pub failure_reason: Option<FailureReason>,
    pub failure_message: Option<String>,
    pub touch_created: bool,
}

impl IntakeAttributionResult {
    pub fn failure(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            success: false,
            affiliate_id: None,
            ref_code: None,
            touch_id: None,
            model: None,
            confidence: None,
            weight: None,
            failure_reason: Some(reason),
            failure_message: Some(message.into()),
            touch_created: false,
        }
    }

    /// Fresh attribution: an explicit code carries full weight and
    /// high confidence.
    pub fn attributed(affiliate_id: AffiliateId, code: &str, touch_id: TouchId) -> Self {
        Self {
            success: true,
            affiliate_id: Some(affiliate_id),
            ref_code: Some(code.to_string()),
            touch_id: Some(touch_id),
            model: Some("intake".to_string()),
            confidence: Some(Confidence::High),
            weight: Some(1.0),
            failure_reason: None,
            failure_message: None,
            touch_created: true,
        }
    }

    /// The first-wins path held: attribution unchanged, touch recorded.
    pub fn already_attributed(
        existing_affiliate: AffiliateId,
        code: &str,
        touch_id: TouchId,
    ) -> Self {
        Self {
            success: true,
            affiliate_id: Some(existing_affiliate),
            ref_code: Some(code.to_string()),
            touch_id: Some(touch_id),
            model: None,
            confidence: None,
            weight: None,
            failure_reason: Some(FailureReason::AlreadyAttributed),
            failure_message: Some("Patient is already attributed; touch recorded".to_string()),
            touch_created: true,
        }
    }
}
