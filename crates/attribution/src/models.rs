//! Attribution weighting models. Pure functions over a time-ordered touch
//! sequence; no store access, no clock access beyond the `now` argument.

use chrono::{DateTime, Utc};
use serde::Serialize;

use clinic_core::types::{AttributionModel, Touch};

/// Exponential-decay half-life for the time-decay model.
pub const TIME_DECAY_HALF_LIFE_DAYS: f64 = 7.0;

/// First/last share of credit under the position-based model.
pub const POSITION_ENDPOINT_SHARE: f64 = 0.4;

/// A touch annotated with its share of the attribution credit.
#[derive(Debug, Clone, Serialize)]
pub struct WeightedTouch {
    pub touch: Touch,
    pub weight: f64,
}

/// Annotate `touches` (ordered by creation time ascending) with weights in
/// [0, 1]. Weights sum to 1 for non-empty input and to 0 for empty input.
/// `now` is the resolution time; only the time-decay model reads it.
pub fn weigh_touches(
    touches: &[Touch],
    model: AttributionModel,
    now: DateTime<Utc>,
) -> Vec<WeightedTouch> {
    if touches.is_empty() {
        return Vec::new();
    }
    let weights = match model {
        AttributionModel::FirstClick => single_position_weights(touches.len(), 0),
        AttributionModel::LastClick => single_position_weights(touches.len(), touches.len() - 1),
        AttributionModel::Linear => vec![1.0 / touches.len() as f64; touches.len()],
        AttributionModel::TimeDecay => time_decay_weights(touches, now),
        AttributionModel::PositionBased => position_weights(touches.len()),
    };
    touches
        .iter()
        .zip(weights)
        .map(|(touch, weight)| WeightedTouch {
            touch: touch.clone(),
            weight,
        })
        .collect()
}

/// All credit to one index.
fn single_position_weights(len: usize, winner: usize) -> Vec<f64> {
    let mut weights = vec![0.0; len];
    weights[winner] = 1.0;
    weights
}

/// Weight ∝ 0.5^(age / half_life), age measured from `now` (resolution
/// time, not the last touch), normalized to sum to 1.
fn time_decay_weights(touches: &[Touch], now: DateTime<Utc>) -> Vec<f64> {
    let raw: Vec<f64> = touches
        .iter()
        .map(|t| {
            let age_days = (now - t.created_at).num_seconds() as f64 / 86_400.0;
            0.5_f64.powf(age_days.max(0.0) / TIME_DECAY_HALF_LIFE_DAYS)
        })
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// 0.4 first, 0.4 last, remaining 0.2 split across the middle. Degenerates
/// to 1.0 for a single touch and 0.5/0.5 for two.
fn position_weights(len: usize) -> Vec<f64> {
    match len {
        1 => vec![1.0],
        2 => vec![0.5, 0.5],
        n => {
            let middle = (1.0 - 2.0 * POSITION_ENDPOINT_SHARE) / (n as f64 - 2.0);
            let mut weights = vec![middle; n];
            weights[0] = POSITION_ENDPOINT_SHARE;
            weights[n - 1] = POSITION_ENDPOINT_SHARE;
            weights
        }
    }
}

/// The touch with the strictly highest weight. Equal weights keep the first
/// touch encountered left-to-right — implementation-defined but stable
/// given stable input ordering.
pub fn pick_winner(weighted: &[WeightedTouch]) -> Option<&WeightedTouch> {
    let mut winner: Option<&WeightedTouch> = None;
    for candidate in weighted {
        match winner {
            Some(current) if candidate.weight > current.weight => winner = Some(candidate),
            None => winner = Some(candidate),
            _ => {}
        }
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use clinic_core::types::TouchType;
    use uuid::Uuid;

    const TOLERANCE: f64 = 1e-9;

    fn touch_at(created_at: DateTime<Utc>) -> Touch {
        Touch {
            id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            affiliate_id: Some(Uuid::new_v4()),
            ref_code: "CODE".into(),
            touch_type: TouchType::Click,
            visitor_fingerprint: None,
            cookie_id: Some("c".into()),
            created_at,
            converted_patient_id: None,
            converted_at: None,
        }
    }

    fn sequence(n: usize, now: DateTime<Utc>) -> Vec<Touch> {
        (0..n)
            .map(|i| touch_at(now - Duration::hours((n - i) as i64)))
            .collect()
    }

    const ALL_MODELS: [AttributionModel; 5] = [
        AttributionModel::FirstClick,
        AttributionModel::LastClick,
        AttributionModel::Linear,
        AttributionModel::TimeDecay,
        AttributionModel::PositionBased,
    ];

    #[test]
    fn test_weights_sum_to_one() {
        let now = Utc::now();
        for model in ALL_MODELS {
            for n in 1..=6 {
                let touches = sequence(n, now);
                let weighted = weigh_touches(&touches, model, now);
                let sum: f64 = weighted.iter().map(|w| w.weight).sum();
                assert!(
                    (sum - 1.0).abs() < TOLERANCE,
                    "{model:?} with {n} touches summed to {sum}"
                );
            }
        }
    }

    #[test]
    fn test_empty_input_yields_no_weights() {
        for model in ALL_MODELS {
            assert!(weigh_touches(&[], model, Utc::now()).is_empty());
        }
    }

    #[test]
    fn test_single_touch_gets_full_weight() {
        let now = Utc::now();
        for model in ALL_MODELS {
            let touches = sequence(1, now);
            let weighted = weigh_touches(&touches, model, now);
            assert_eq!(weighted.len(), 1);
            assert!((weighted[0].weight - 1.0).abs() < TOLERANCE, "{model:?}");
        }
    }

    #[test]
    fn test_first_and_last_click() {
        let now = Utc::now();
        let touches = sequence(4, now);

        let first = weigh_touches(&touches, AttributionModel::FirstClick, now);
        assert_eq!(first[0].weight, 1.0);
        assert!(first[1..].iter().all(|w| w.weight == 0.0));

        let last = weigh_touches(&touches, AttributionModel::LastClick, now);
        assert_eq!(last[3].weight, 1.0);
        assert!(last[..3].iter().all(|w| w.weight == 0.0));
    }

    #[test]
    fn test_position_based_four_touches() {
        let now = Utc::now();
        let touches = sequence(4, now);
        let weighted = weigh_touches(&touches, AttributionModel::PositionBased, now);
        let weights: Vec<f64> = weighted.iter().map(|w| w.weight).collect();
        for (got, want) in weights.iter().zip([0.4, 0.1, 0.1, 0.4]) {
            assert!((got - want).abs() < TOLERANCE, "got {weights:?}");
        }
    }

    #[test]
    fn test_position_based_two_touches() {
        let now = Utc::now();
        let touches = sequence(2, now);
        let weighted = weigh_touches(&touches, AttributionModel::PositionBased, now);
        assert!((weighted[0].weight - 0.5).abs() < TOLERANCE);
        assert!((weighted[1].weight - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn test_time_decay_one_half_life_apart() {
        // Fixed clock: now is the newer touch's time, the older touch is a
        // full half-life earlier, so its raw weight is exactly halved:
        // 0.5 / 1.5 and 1.0 / 1.5.
        let now = Utc::now();
        let touches = vec![touch_at(now - Duration::days(7)), touch_at(now)];
        let weighted = weigh_touches(&touches, AttributionModel::TimeDecay, now);
        assert!((weighted[0].weight - 1.0 / 3.0).abs() < TOLERANCE);
        assert!((weighted[1].weight - 2.0 / 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_time_decay_prefers_recent() {
        let now = Utc::now();
        let touches = vec![
            touch_at(now - Duration::days(20)),
            touch_at(now - Duration::days(3)),
            touch_at(now - Duration::hours(1)),
        ];
        let weighted = weigh_touches(&touches, AttributionModel::TimeDecay, now);
        assert!(weighted[0].weight < weighted[1].weight);
        assert!(weighted[1].weight < weighted[2].weight);
    }

    #[test]
    fn test_winner_strictly_highest() {
        let now = Utc::now();
        let touches = sequence(3, now);
        let weighted = weigh_touches(&touches, AttributionModel::LastClick, now);
        let winner = pick_winner(&weighted).unwrap();
        assert_eq!(winner.touch.id, touches[2].id);
    }

    #[test]
    fn test_winner_tie_break_keeps_first_in_order() {
        let now = Utc::now();
        let touches = sequence(4, now);
        // Linear weights are all equal; the first touch encountered wins.
        let weighted = weigh_touches(&touches, AttributionModel::Linear, now);
        let winner = pick_winner(&weighted).unwrap();
        assert_eq!(winner.touch.id, touches[0].id);
    }

    #[test]
    fn test_winner_of_empty_is_none() {
        assert!(pick_winner(&[]).is_none());
    }
}
