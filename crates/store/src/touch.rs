//! Append-only touch store. Touches are never deleted; the only mutation is
//! the one-time conversion marking.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use clinic_core::error::{ClinicError, ClinicResult};
use clinic_core::types::{AffiliateId, ClinicId, PatientId, Touch, TouchId, TouchType};

/// Fields the caller supplies when recording a touch.
#[derive(Debug, Clone)]
pub struct NewTouch {
    pub clinic_id: ClinicId,
    pub affiliate_id: Option<AffiliateId>,
    pub ref_code: String,
    pub touch_type: TouchType,
    pub visitor_fingerprint: Option<String>,
    pub cookie_id: Option<String>,
}

#[derive(Default)]
pub struct TouchStore {
    touches: DashMap<TouchId, Touch>,
}

impl TouchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a touch. Insert-only; the returned record carries the id the
    /// caller needs for later conversion marking.
    pub fn record(&self, new: NewTouch) -> Touch {
        self.record_at(new, Utc::now())
    }

    pub fn record_at(&self, new: NewTouch, created_at: DateTime<Utc>) -> Touch {
        let touch = Touch {
            id: Uuid::new_v4(),
            clinic_id: new.clinic_id,
            affiliate_id: new.affiliate_id,
            ref_code: new.ref_code,
            touch_type: new.touch_type,
            visitor_fingerprint: new.visitor_fingerprint,
            cookie_id: new.cookie_id,
            created_at,
            converted_patient_id: None,
            converted_at: None,
        };
        debug!(touch_id = %touch.id, clinic_id = %touch.clinic_id, code = %touch.ref_code,
               touch_type = ?touch.touch_type, "Touch recorded");
        metrics::counter!("attribution.touches_recorded").increment(1);
        self.touches.insert(touch.id, touch.clone());
        touch
    }

    /// Record a touch already marked converted. Used by the intake service
    /// inside the patient row lock when the call performs the actual
    /// attribution.
    pub fn record_converted(
        &self,
        new: NewTouch,
        patient_id: PatientId,
        at: DateTime<Utc>,
    ) -> Touch {
        let mut touch = self.record_at(new, at);
        touch.converted_patient_id = Some(patient_id);
        touch.converted_at = Some(at);
        self.touches.insert(touch.id, touch.clone());
        touch
    }

    pub fn get(&self, id: TouchId) -> Option<Touch> {
        self.touches.get(&id).map(|t| t.clone())
    }

    /// Touches for a clinic matching any of the supplied identifiers, newer
    /// than `since`, ordered by creation time ascending. Identifier matching
    /// is OR: a touch qualifies if its fingerprint or its cookie matches.
    pub fn find_by_identifiers(
        &self,
        clinic_id: ClinicId,
        fingerprint: Option<&str>,
        cookie_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Vec<Touch> {
        let mut matched: Vec<Touch> = self
            .touches
            .iter()
            .filter(|entry| {
                let t = entry.value();
                if t.clinic_id != clinic_id || t.created_at < since {
                    return false;
                }
                let fp_match = match (fingerprint, &t.visitor_fingerprint) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                };
                let cookie_match = match (cookie_id, &t.cookie_id) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                };
                fp_match || cookie_match
            })
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by_key(|t| t.created_at);
        matched
    }

    /// Unconverted click touches for a clinic inside a recency window,
    /// ascending by creation time. Feeds the recent-touch fallback.
    pub fn recent_unconverted_clicks(&self, clinic_id: ClinicId, window: Duration) -> Vec<Touch> {
        let cutoff = Utc::now() - window;
        let mut matched: Vec<Touch> = self
            .touches
            .iter()
            .filter(|entry| {
                let t = entry.value();
                t.clinic_id == clinic_id
                    && t.touch_type == TouchType::Click
                    && !t.is_converted()
                    && t.created_at >= cutoff
            })
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by_key(|t| t.created_at);
        matched
    }

    /// Mark a touch converted. A touch converts at most once; a second
    /// attempt is an error, never a silent overwrite.
    pub fn mark_converted(
        &self,
        touch_id: TouchId,
        patient_id: PatientId,
        at: DateTime<Utc>,
    ) -> ClinicResult<()> {
        let mut entry = self
            .touches
            .get_mut(&touch_id)
            .ok_or(ClinicError::TouchNotFound(touch_id))?;
        if entry.is_converted() {
            return Err(ClinicError::AlreadyConverted(touch_id));
        }
        entry.converted_patient_id = Some(patient_id);
        entry.converted_at = Some(at);
        debug!(touch_id = %touch_id, patient_id = %patient_id, "Touch converted");
        Ok(())
    }

    /// Postback volume for a code — traffic reporting, includes redundant
    /// uses on already-attributed patients.
    pub fn count_postbacks_for_code(&self, clinic_id: ClinicId, code: &str) -> u64 {
        self.touches
            .iter()
            .filter(|e| {
                let t = e.value();
                t.clinic_id == clinic_id
                    && t.touch_type == TouchType::Postback
                    && t.ref_code == code
            })
            .count() as u64
    }

    /// Per-affiliate (clicks, conversions) for a clinic.
    pub fn traffic_for_affiliate(&self, clinic_id: ClinicId, affiliate_id: AffiliateId) -> (u64, u64) {
        let mut clicks = 0u64;
        let mut conversions = 0u64;
        for entry in self.touches.iter() {
            let t = entry.value();
            if t.clinic_id != clinic_id || t.affiliate_id != Some(affiliate_id) {
                continue;
            }
            if t.touch_type == TouchType::Click {
                clicks += 1;
            }
            if t.is_converted() {
                conversions += 1;
            }
        }
        (clicks, conversions)
    }

    pub fn len(&self) -> usize {
        self.touches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touches.is_empty()
    }
}
