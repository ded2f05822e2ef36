//! Per-clinic attribution config resolution.
//!
//! Clinic admins store sparse settings; system-wide defaults fill the gaps.
//! Resolution happens in exactly one place and returns a fully-populated
//! value — call sites never default individual fields ad hoc.

use serde::Serialize;

use clinic_core::config::AttributionDefaultsConfig;
use clinic_core::types::{AttributionModel, ClinicAttributionSettings};

/// Fully-populated attribution configuration for one clinic.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveAttributionConfig {
    pub new_patient_model: AttributionModel,
    pub returning_patient_model: AttributionModel,
    pub cookie_window_days: u32,
    pub impression_window_hours: u32,
    pub enable_fingerprinting: bool,
}

impl EffectiveAttributionConfig {
    /// Merge stored clinic settings over the system defaults. Unknown model
    /// names resolve to last-click via `AttributionModel::from_name`.
    pub fn resolve(
        defaults: &AttributionDefaultsConfig,
        settings: Option<&ClinicAttributionSettings>,
    ) -> Self {
        let new_patient_model = settings
            .and_then(|s| s.new_patient_model.as_deref())
            .unwrap_or(&defaults.new_patient_model);
        let returning_patient_model = settings
            .and_then(|s| s.returning_patient_model.as_deref())
            .unwrap_or(&defaults.returning_patient_model);

        Self {
            new_patient_model: AttributionModel::from_name(new_patient_model),
            returning_patient_model: AttributionModel::from_name(returning_patient_model),
            cookie_window_days: settings
                .and_then(|s| s.cookie_window_days)
                .unwrap_or(defaults.cookie_window_days),
            impression_window_hours: settings
                .and_then(|s| s.impression_window_hours)
                .unwrap_or(defaults.impression_window_hours),
            enable_fingerprinting: settings
                .and_then(|s| s.enable_fingerprinting)
                .unwrap_or(defaults.enable_fingerprinting),
        }
    }

    pub fn model_for(&self, is_new_patient: bool) -> AttributionModel {
        if is_new_patient {
            self.new_patient_model
        } else {
            self.returning_patient_model
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_unconfigured_clinic() {
        let cfg = EffectiveAttributionConfig::resolve(&AttributionDefaultsConfig::default(), None);
        assert_eq!(cfg.new_patient_model, AttributionModel::FirstClick);
        assert_eq!(cfg.returning_patient_model, AttributionModel::LastClick);
        assert_eq!(cfg.cookie_window_days, 30);
        assert!(cfg.enable_fingerprinting);
    }

    #[test]
    fn test_resolve_partial_settings() {
        let settings = ClinicAttributionSettings {
            new_patient_model: Some("time_decay".into()),
            cookie_window_days: Some(7),
            ..Default::default()
        };
        let cfg = EffectiveAttributionConfig::resolve(
            &AttributionDefaultsConfig::default(),
            Some(&settings),
        );
        assert_eq!(cfg.new_patient_model, AttributionModel::TimeDecay);
        // Unset fields come from the defaults.
        assert_eq!(cfg.returning_patient_model, AttributionModel::LastClick);
        assert_eq!(cfg.cookie_window_days, 7);
        assert_eq!(cfg.impression_window_hours, 24);
    }

    #[test]
    fn test_unknown_model_name_falls_back_to_last_click() {
        let settings = ClinicAttributionSettings {
            new_patient_model: Some("markov_chain".into()),
            ..Default::default()
        };
        let cfg = EffectiveAttributionConfig::resolve(
            &AttributionDefaultsConfig::default(),
            Some(&settings),
        );
        assert_eq!(cfg.new_patient_model, AttributionModel::LastClick);
    }
}
