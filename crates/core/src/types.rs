use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ClinicId = Uuid;
pub type PatientId = Uuid;
pub type AffiliateId = Uuid;
pub type TouchId = Uuid;

/// How the visitor interacted with a referral code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchType {
    /// Visitor followed an affiliate link.
    Click,
    /// Server-side event (intake form submission, webhook).
    Postback,
}

/// One recorded interaction between a visitor and a referral code.
/// Append-only; the only mutation is the one-time conversion marking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Touch {
    pub id: TouchId,
    pub clinic_id: ClinicId,
    /// `None` until the code is resolved to an affiliate (free-text intake
    /// answers land here unresolved, for later reconciliation).
    pub affiliate_id: Option<AffiliateId>,
    pub ref_code: String,
    pub touch_type: TouchType,
    pub visitor_fingerprint: Option<String>,
    pub cookie_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub converted_patient_id: Option<PatientId>,
    pub converted_at: Option<DateTime<Utc>>,
}

impl Touch {
    /// Invariant: `converted_at` is set if and only if `converted_patient_id` is.
    pub fn is_converted(&self) -> bool {
        debug_assert_eq!(
            self.converted_at.is_some(),
            self.converted_patient_id.is_some()
        );
        self.converted_patient_id.is_some()
    }
}

/// Affiliate lifecycle status. Only `Active` affiliates receive attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffiliateStatus {
    Active,
    Paused,
    Terminated,
}

/// A marketing partner referring patients to a clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Affiliate {
    pub id: AffiliateId,
    pub clinic_id: ClinicId,
    pub name: String,
    pub status: AffiliateStatus,
    pub lifetime_conversions: u64,
    pub created_at: DateTime<Utc>,
}

/// A clinic-scoped referral code. The same code string may exist in other
/// clinics bound to other affiliates, so lookups are always clinic-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefCode {
    pub code: String,
    pub clinic_id: ClinicId,
    pub affiliate_id: AffiliateId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Canonical form of a referral code as entered by a visitor or admin.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// A clinic (tenant). The name appears in attribution diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: ClinicId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Attribution-relevant subset of a patient record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub clinic_id: ClinicId,
    pub is_new: bool,
    pub attribution_affiliate_id: Option<AffiliateId>,
    pub attribution_ref_code: Option<String>,
    pub attribution_first_touch_at: Option<DateTime<Utc>>,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(clinic_id: ClinicId) -> Self {
        Self {
            id: Uuid::new_v4(),
            clinic_id,
            is_new: true,
            attribution_affiliate_id: None,
            attribution_ref_code: None,
            attribution_first_touch_at: None,
            tags: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// First-wins attribution write. Returns false without touching any
    /// field when an affiliate is already attributed. Callers must hold the
    /// patient row lock.
    pub fn attach_attribution(
        &mut self,
        affiliate_id: AffiliateId,
        code: &str,
        at: DateTime<Utc>,
    ) -> bool {
        if self.attribution_affiliate_id.is_some() {
            return false;
        }
        self.attribution_affiliate_id = Some(affiliate_id);
        self.attribution_ref_code = Some(code.to_string());
        self.attribution_first_touch_at = Some(at);
        self.tags.insert(affiliate_tag(code));
        true
    }
}

/// Tag marking a patient as referred via a code, e.g. `affiliate:SPRING24`.
pub fn affiliate_tag(code: &str) -> String {
    format!("affiliate:{code}")
}

/// Multi-touch weighting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionModel {
    FirstClick,
    LastClick,
    Linear,
    TimeDecay,
    PositionBased,
}

impl AttributionModel {
    /// Parse an admin-entered model name. Unknown names fall back to
    /// last-click — the documented default, not an error.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "first_click" | "first-click" | "firstclick" => Self::FirstClick,
            "last_click" | "last-click" | "lastclick" => Self::LastClick,
            "linear" => Self::Linear,
            "time_decay" | "time-decay" | "timedecay" => Self::TimeDecay,
            "position_based" | "position-based" | "position" => Self::PositionBased,
            _ => Self::LastClick,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FirstClick => "first_click",
            Self::LastClick => "last_click",
            Self::Linear => "linear",
            Self::TimeDecay => "time_decay",
            Self::PositionBased => "position_based",
        }
    }
}

/// How strongly the identifiers tie the touches to one visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Per-clinic attribution settings as stored (admin-entered, sparse).
/// Resolution into a fully-populated config happens in
/// `clinic-attribution::config` — never via scattered per-field defaulting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicAttributionSettings {
    pub new_patient_model: Option<String>,
    pub returning_patient_model: Option<String>,
    pub cookie_window_days: Option<u32>,
    pub impression_window_hours: Option<u32>,
    pub enable_fingerprinting: Option<bool>,
}
