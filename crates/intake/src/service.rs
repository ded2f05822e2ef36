//! The intake attribution service.
//!
//! Correctness note: concurrent webhook deliveries for the same patient
//! (duplicate payment events, retried intake submissions) serialize on the
//! patient row lock. The attribution re-check and the conditional write run
//! inside one locked scope, so "check then write" cannot race. Touch
//! creation is deliberately not idempotent across retries — every call
//! records a usage event — while the attribution mutation is idempotent
//! because it is gated by the locked re-check.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use clinic_core::config::IntakeConfig;
use clinic_core::error::{ClinicError, ClinicResult};
use clinic_core::types::{
    affiliate_tag, normalize_code, AffiliateStatus, ClinicId, PatientId, TouchType,
};
use clinic_store::{
    AffiliateStore, ClinicStore, NewTouch, PatientStore, RefCodeStore, TouchStore,
};

use crate::result::{FailureReason, IntakeAttributionResult};

pub struct IntakeAttributionService {
    patients: Arc<PatientStore>,
    touches: Arc<TouchStore>,
    ref_codes: Arc<RefCodeStore>,
    affiliates: Arc<AffiliateStore>,
    clinics: Arc<ClinicStore>,
    config: IntakeConfig,
}

impl IntakeAttributionService {
    pub fn new(
        patients: Arc<PatientStore>,
        touches: Arc<TouchStore>,
        ref_codes: Arc<RefCodeStore>,
        affiliates: Arc<AffiliateStore>,
        clinics: Arc<ClinicStore>,
        config: IntakeConfig,
    ) -> Self {
        Self {
            patients,
            touches,
            ref_codes,
            affiliates,
            clinics,
            config,
        }
    }

    /// Attribute a patient from an intake promo code. Never returns an
    /// error for expected business outcomes; infrastructure faults are
    /// normalized into a `DATABASE_ERROR` result carrying the message.
    pub fn attribute_from_intake(
        &self,
        patient_id: PatientId,
        promo_code: &str,
        clinic_id: ClinicId,
        source: &str,
    ) -> IntakeAttributionResult {
        match self.attribute_inner(patient_id, promo_code, clinic_id, source) {
            Ok(result) => result,
            Err(err) => {
                error!(patient_id = %patient_id, clinic_id = %clinic_id, source = source,
                       error = %err, "Intake attribution failed unexpectedly");
                metrics::counter!("intake.database_errors").increment(1);
                IntakeAttributionResult::failure(
                    FailureReason::DatabaseError,
                    format!("Attribution failed: {err}"),
                )
            }
        }
    }

    fn attribute_inner(
        &self,
        patient_id: PatientId,
        promo_code: &str,
        clinic_id: ClinicId,
        source: &str,
    ) -> ClinicResult<IntakeAttributionResult> {
        let code = normalize_code(promo_code);

        // Existence only; never block behind a held row lock here.
        if !self.patients.contains(patient_id) {
            return Ok(IntakeAttributionResult::failure(
                FailureReason::PatientNotFound,
                format!("No patient with id {patient_id}"),
            ));
        }

        // The one lookup the outcome depends on: active code in this clinic.
        let ref_code = match self.ref_codes.find_active(clinic_id, &code) {
            Some(rc) => rc,
            None => return Ok(self.diagnose_code_miss(clinic_id, &code)),
        };

        let affiliate = self
            .affiliates
            .get(ref_code.affiliate_id)
            .ok_or(ClinicError::AffiliateNotFound(ref_code.affiliate_id))?;
        if affiliate.status != AffiliateStatus::Active {
            return Ok(IntakeAttributionResult::failure(
                FailureReason::AffiliateInactive,
                format!(
                    "Code {} belongs to affiliate \"{}\" whose status is {:?}",
                    code, affiliate.name, affiliate.status
                ),
            ));
        }

        // Locked section. The re-check below is mandatory even though the
        // patient was read above: another delivery may have attributed the
        // patient since that unlocked read.
        let touches = self.touches.clone();
        let affiliates = self.affiliates.clone();
        let lock_timeout = Duration::from_secs(self.config.lock_timeout_secs);
        let result = self
            .patients
            .with_locked(patient_id, lock_timeout, |patient| {
                let now = Utc::now();
                let new_touch = NewTouch {
                    clinic_id,
                    affiliate_id: Some(affiliate.id),
                    ref_code: code.clone(),
                    touch_type: TouchType::Postback,
                    visitor_fingerprint: None,
                    cookie_id: None,
                };

                if let Some(existing) = patient.attribution_affiliate_id {
                    // Record the code use for traffic reporting, but leave
                    // attribution untouched: first wins.
                    let touch = touches.record_at(new_touch, now);
                    let code_uses = touches.count_postbacks_for_code(clinic_id, &code);
                    info!(patient_id = %patient_id, existing_affiliate = %existing,
                          code = %code, code_uses, source = source,
                          "Patient already attributed");
                    metrics::counter!("intake.already_attributed").increment(1);
                    return Ok(IntakeAttributionResult::already_attributed(
                        existing, &code, touch.id,
                    ));
                }

                let touch = touches.record_converted(new_touch, patient_id, now);
                patient.attach_attribution(affiliate.id, &code, now);
                affiliates.increment_conversions(affiliate.id)?;

                info!(patient_id = %patient_id, affiliate_id = %affiliate.id,
                      code = %code, source = source, touch_id = %touch.id,
                      "Patient attributed");
                metrics::counter!("intake.attributions_set").increment(1);
                Ok(IntakeAttributionResult::attributed(
                    affiliate.id,
                    &code,
                    touch.id,
                ))
            });

        match result {
            Ok(inner) => inner,
            Err(ClinicError::PatientNotFound(id)) => Ok(IntakeAttributionResult::failure(
                FailureReason::PatientNotFound,
                format!("No patient with id {id}"),
            )),
            Err(err) => Err(err),
        }
    }

    /// The clinic-scoped lookup missed; run read-only diagnostic lookups to
    /// report the most specific reason. Best-effort only — these reads never
    /// feed the transactional outcome.
    fn diagnose_code_miss(&self, clinic_id: ClinicId, code: &str) -> IntakeAttributionResult {
        if let Some(elsewhere) = self.ref_codes.find_active_elsewhere(clinic_id, code) {
            let other_clinic = self.clinics.display_name(elsewhere.clinic_id);
            return IntakeAttributionResult::failure(
                FailureReason::ClinicMismatch,
                format!("Code {code} belongs to clinic \"{other_clinic}\", not this clinic"),
            );
        }
        if self.ref_codes.find_inactive(clinic_id, code).is_some() {
            return IntakeAttributionResult::failure(
                FailureReason::CodeInactive,
                format!("Code {code} exists in this clinic but is inactive"),
            );
        }
        IntakeAttributionResult::failure(
            FailureReason::CodeNotFound,
            format!("Code {code} not found in this clinic (may need migration)"),
        )
    }

    /// Advisory tagging for codes that have no formal RefCode row yet (e.g.
    /// a free-text intake answer). Writes only the ref-code field and tag —
    /// never the affiliate — and records an unresolved touch so later
    /// reconciliation jobs can find it. Returns `Ok(false)` without writes
    /// when the patient is already affiliate-attributed: this weaker path
    /// must never clash with the resolved one.
    pub fn tag_patient_with_ref_code_only(
        &self,
        patient_id: PatientId,
        raw_code: &str,
        clinic_id: ClinicId,
    ) -> ClinicResult<bool> {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return Ok(false);
        }

        let touches = self.touches.clone();
        let lock_timeout = Duration::from_secs(self.config.lock_timeout_secs);
        self.patients.with_locked(patient_id, lock_timeout, |patient| {
            if patient.attribution_affiliate_id.is_some() {
                return false;
            }
            patient.attribution_ref_code = Some(code.clone());
            patient.tags.insert(affiliate_tag(&code));
            touches.record(NewTouch {
                clinic_id,
                affiliate_id: None,
                ref_code: code.clone(),
                touch_type: TouchType::Postback,
                visitor_fingerprint: None,
                cookie_id: None,
            });
            info!(patient_id = %patient_id, code = %code, "Patient tagged with unresolved code");
            true
        })
    }

    /// Fallback heuristic for patients with no explicit promo code. Tries
    /// the referrer URL first; failing that, looks for exactly one
    /// unconverted click in a strict recency window. Two or more candidates
    /// is ambiguous and the match is abandoned rather than guessed —
    /// misattributing revenue is worse than not attributing.
    pub fn attribute_by_recent_touch(
        &self,
        patient_id: PatientId,
        clinic_id: ClinicId,
        referrer_url: Option<&str>,
    ) -> Option<IntakeAttributionResult> {
        if let Some(code) = referrer_url.and_then(crate::referrer::extract_ref_code) {
            info!(patient_id = %patient_id, code = %code, "Code extracted from referrer URL");
            return Some(self.attribute_from_intake(patient_id, &code, clinic_id, "referrer_url"));
        }

        let window = chrono::Duration::hours(i64::from(self.config.recent_click_window_hours));
        let candidates = self.touches.recent_unconverted_clicks(clinic_id, window);
        match candidates.as_slice() {
            [single] => {
                let result = self.attribute_from_intake(
                    patient_id,
                    &single.ref_code,
                    clinic_id,
                    "recent_touch",
                );
                // Tie the original click to the conversion when this call
                // performed the actual attribution.
                if result.success && result.failure_reason.is_none() {
                    if let Err(err) =
                        self.touches.mark_converted(single.id, patient_id, Utc::now())
                    {
                        warn!(touch_id = %single.id, error = %err,
                              "Could not mark originating click converted");
                    }
                }
                Some(result)
            }
            [] => {
                info!(patient_id = %patient_id, clinic_id = %clinic_id,
                      "No recent unconverted clicks to match");
                None
            }
            many => {
                info!(patient_id = %patient_id, clinic_id = %clinic_id,
                      candidates = many.len(), "Recent-touch match ambiguous, abandoning");
                None
            }
        }
    }
}
