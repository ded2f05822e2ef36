//! Referral code store. Codes are unique per `(clinic, code)` — the same
//! string may exist in several clinics bound to different affiliates, so the
//! primary lookup is always clinic-scoped. Cross-clinic lookups exist only
//! to produce better diagnostics.

use chrono::Utc;
use dashmap::DashMap;

use clinic_core::types::{normalize_code, AffiliateId, ClinicId, RefCode};

#[derive(Default)]
pub struct RefCodeStore {
    codes: DashMap<(ClinicId, String), RefCode>,
}

impl RefCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a code binding. The code is stored normalized.
    pub fn upsert(
        &self,
        clinic_id: ClinicId,
        raw_code: &str,
        affiliate_id: AffiliateId,
        is_active: bool,
    ) -> RefCode {
        let code = normalize_code(raw_code);
        let record = RefCode {
            code: code.clone(),
            clinic_id,
            affiliate_id,
            is_active,
            created_at: Utc::now(),
        };
        self.codes.insert((clinic_id, code), record.clone());
        record
    }

    /// The one lookup business logic acts on: active code in this clinic.
    pub fn find_active(&self, clinic_id: ClinicId, code: &str) -> Option<RefCode> {
        self.codes
            .get(&(clinic_id, normalize_code(code)))
            .filter(|r| r.is_active)
            .map(|r| r.clone())
    }

    /// Diagnostic: the code exists in this clinic but is deactivated.
    pub fn find_inactive(&self, clinic_id: ClinicId, code: &str) -> Option<RefCode> {
        self.codes
            .get(&(clinic_id, normalize_code(code)))
            .filter(|r| !r.is_active)
            .map(|r| r.clone())
    }

    /// Diagnostic: an active binding of this code in any other clinic.
    /// Read-only, best-effort; never feeds the transactional outcome.
    pub fn find_active_elsewhere(&self, clinic_id: ClinicId, code: &str) -> Option<RefCode> {
        let code = normalize_code(code);
        self.codes
            .iter()
            .find(|entry| {
                let r = entry.value();
                r.code == code && r.clinic_id != clinic_id && r.is_active
            })
            .map(|entry| entry.value().clone())
    }
}
