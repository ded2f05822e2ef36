//! Passive attribution resolver: config lookup → touch retrieval → model
//! application → winner selection → confidence scoring. Computation only —
//! persisting the winner is the caller's job (via the patient store's
//! locked write), so resolving never mutates anything.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use clinic_core::config::AttributionDefaultsConfig;
use clinic_core::types::{AffiliateId, AttributionModel, ClinicId, Confidence, TouchId};
use clinic_store::{SettingsStore, TouchStore};

use crate::config::EffectiveAttributionConfig;
use crate::models::{pick_winner, weigh_touches, WeightedTouch};

/// The computed attribution decision. Not persisted as-is.
#[derive(Debug, Clone, Serialize)]
pub struct AttributionOutcome {
    pub affiliate_id: AffiliateId,
    pub ref_code: String,
    pub touch_id: TouchId,
    pub model: AttributionModel,
    pub confidence: Confidence,
    pub weight: f64,
    /// Full weighted breakdown, populated by `resolve_detailed` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_touches: Option<Vec<WeightedTouch>>,
}

pub struct AttributionResolver {
    touches: Arc<TouchStore>,
    settings: Arc<SettingsStore>,
    defaults: AttributionDefaultsConfig,
}

impl AttributionResolver {
    pub fn new(
        touches: Arc<TouchStore>,
        settings: Arc<SettingsStore>,
        defaults: AttributionDefaultsConfig,
    ) -> Self {
        Self {
            touches,
            settings,
            defaults,
        }
    }

    /// Resolve which affiliate gets credit for this visitor. Fails closed:
    /// `None` when no identifying signal is supplied or no touches fall
    /// inside the configured window — expected and frequent, never an error.
    pub fn resolve(
        &self,
        clinic_id: ClinicId,
        visitor_fingerprint: Option<&str>,
        cookie_id: Option<&str>,
        is_new_patient: bool,
    ) -> Option<AttributionOutcome> {
        self.resolve_inner(clinic_id, visitor_fingerprint, cookie_id, is_new_patient, false)
    }

    /// Same as `resolve`, with the full weighted-touch breakdown attached.
    pub fn resolve_detailed(
        &self,
        clinic_id: ClinicId,
        visitor_fingerprint: Option<&str>,
        cookie_id: Option<&str>,
        is_new_patient: bool,
    ) -> Option<AttributionOutcome> {
        self.resolve_inner(clinic_id, visitor_fingerprint, cookie_id, is_new_patient, true)
    }

    fn resolve_inner(
        &self,
        clinic_id: ClinicId,
        visitor_fingerprint: Option<&str>,
        cookie_id: Option<&str>,
        is_new_patient: bool,
        include_breakdown: bool,
    ) -> Option<AttributionOutcome> {
        let config = EffectiveAttributionConfig::resolve(
            &self.defaults,
            self.settings.get(clinic_id).as_ref(),
        );

        // Fingerprint matching can be disabled per clinic; the identifier
        // then stops being an identifying signal entirely.
        let fingerprint = if config.enable_fingerprinting {
            visitor_fingerprint
        } else {
            None
        };

        // No identifying signal at all: return before querying anything.
        if fingerprint.is_none() && cookie_id.is_none() {
            debug!(clinic_id = %clinic_id, "No identifiers supplied, skipping attribution");
            return None;
        }

        let since = Utc::now() - Duration::days(i64::from(config.cookie_window_days));
        let touches: Vec<_> = self
            .touches
            .find_by_identifiers(clinic_id, fingerprint, cookie_id, since)
            .into_iter()
            .filter(|t| t.affiliate_id.is_some())
            .collect();

        if touches.is_empty() {
            info!(clinic_id = %clinic_id, window_days = config.cookie_window_days,
                  "No attributable touches in window");
            return None;
        }

        let model = config.model_for(is_new_patient);
        let now = Utc::now();
        let weighted = weigh_touches(&touches, model, now);
        let winner = pick_winner(&weighted)?.clone();

        let confidence = confidence_for(fingerprint, cookie_id, touches.len());
        // Unresolved touches were filtered out above.
        let affiliate_id = winner.touch.affiliate_id?;

        info!(clinic_id = %clinic_id, affiliate_id = %affiliate_id,
              model = model.name(), touches = touches.len(), confidence = ?confidence,
              "Attribution resolved");

        Some(AttributionOutcome {
            affiliate_id,
            ref_code: winner.touch.ref_code.clone(),
            touch_id: winner.touch.id,
            model,
            confidence,
            weight: winner.weight,
            weighted_touches: include_breakdown.then_some(weighted),
        })
    }
}

/// High needs both identifiers plus at least one touch; either identifier
/// alone caps at medium.
fn confidence_for(
    fingerprint: Option<&str>,
    cookie_id: Option<&str>,
    touch_count: usize,
) -> Confidence {
    if touch_count == 0 {
        return Confidence::Low;
    }
    match (fingerprint, cookie_id) {
        (Some(_), Some(_)) => Confidence::High,
        (Some(_), None) | (None, Some(_)) => Confidence::Medium,
        (None, None) => Confidence::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::types::{ClinicAttributionSettings, TouchType};
    use clinic_store::NewTouch;
    use uuid::Uuid;

    fn setup() -> (Arc<TouchStore>, Arc<SettingsStore>, AttributionResolver) {
        let touches = Arc::new(TouchStore::new());
        let settings = Arc::new(SettingsStore::new());
        let resolver = AttributionResolver::new(
            touches.clone(),
            settings.clone(),
            AttributionDefaultsConfig::default(),
        );
        (touches, settings, resolver)
    }

    fn click(clinic_id: ClinicId, affiliate: AffiliateId, code: &str, cookie: &str) -> NewTouch {
        NewTouch {
            clinic_id,
            affiliate_id: Some(affiliate),
            ref_code: code.into(),
            touch_type: TouchType::Click,
            visitor_fingerprint: Some("fp-1".into()),
            cookie_id: Some(cookie.into()),
        }
    }

    #[test]
    fn test_no_identifiers_returns_none() {
        let (_, _, resolver) = setup();
        assert!(resolver.resolve(Uuid::new_v4(), None, None, true).is_none());
    }

    #[test]
    fn test_no_touches_returns_none() {
        let (_, _, resolver) = setup();
        assert!(resolver
            .resolve(Uuid::new_v4(), Some("fp-1"), Some("c-1"), true)
            .is_none());
    }

    #[test]
    fn test_new_patient_defaults_to_first_click() {
        let (touches, _, resolver) = setup();
        let clinic = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let now = Utc::now();
        touches.record_at(click(clinic, first, "EARLY", "c-1"), now - Duration::days(5));
        touches.record_at(click(clinic, second, "LATE", "c-1"), now - Duration::days(1));

        let outcome = resolver
            .resolve(clinic, Some("fp-1"), Some("c-1"), true)
            .unwrap();
        assert_eq!(outcome.model, AttributionModel::FirstClick);
        assert_eq!(outcome.affiliate_id, first);
        assert_eq!(outcome.ref_code, "EARLY");
        assert_eq!(outcome.confidence, Confidence::High);
        assert_eq!(outcome.weight, 1.0);
    }

    #[test]
    fn test_returning_patient_defaults_to_last_click() {
        let (touches, _, resolver) = setup();
        let clinic = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let now = Utc::now();
        touches.record_at(click(clinic, first, "EARLY", "c-1"), now - Duration::days(5));
        touches.record_at(click(clinic, second, "LATE", "c-1"), now - Duration::days(1));

        let outcome = resolver
            .resolve(clinic, None, Some("c-1"), false)
            .unwrap();
        assert_eq!(outcome.model, AttributionModel::LastClick);
        assert_eq!(outcome.affiliate_id, second);
        // Only one identifier supplied.
        assert_eq!(outcome.confidence, Confidence::Medium);
    }

    #[test]
    fn test_fingerprinting_disabled_drops_the_signal() {
        let (touches, settings, resolver) = setup();
        let clinic = Uuid::new_v4();
        settings.set(
            clinic,
            ClinicAttributionSettings {
                enable_fingerprinting: Some(false),
                ..Default::default()
            },
        );
        // Touch only reachable via fingerprint.
        touches.record(NewTouch {
            clinic_id: clinic,
            affiliate_id: Some(Uuid::new_v4()),
            ref_code: "FP".into(),
            touch_type: TouchType::Click,
            visitor_fingerprint: Some("fp-1".into()),
            cookie_id: None,
        });

        assert!(resolver.resolve(clinic, Some("fp-1"), None, true).is_none());
    }

    #[test]
    fn test_unresolved_touches_are_excluded() {
        let (touches, _, resolver) = setup();
        let clinic = Uuid::new_v4();
        touches.record(NewTouch {
            clinic_id: clinic,
            affiliate_id: None,
            ref_code: "FREETEXT".into(),
            touch_type: TouchType::Postback,
            visitor_fingerprint: None,
            cookie_id: Some("c-1".into()),
        });

        assert!(resolver.resolve(clinic, None, Some("c-1"), true).is_none());
    }

    #[test]
    fn test_detailed_breakdown_included() {
        let (touches, _, resolver) = setup();
        let clinic = Uuid::new_v4();
        let now = Utc::now();
        touches.record_at(click(clinic, Uuid::new_v4(), "A", "c-1"), now - Duration::days(2));
        touches.record_at(click(clinic, Uuid::new_v4(), "B", "c-1"), now - Duration::days(1));

        let outcome = resolver
            .resolve_detailed(clinic, Some("fp-1"), Some("c-1"), true)
            .unwrap();
        assert_eq!(outcome.weighted_touches.as_ref().unwrap().len(), 2);

        let plain = resolver
            .resolve(clinic, Some("fp-1"), Some("c-1"), true)
            .unwrap();
        assert!(plain.weighted_touches.is_none());
    }
}
