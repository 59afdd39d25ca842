//! Weighted ensemble fusion over the backends that actually succeeded.
//!
//! Weights are re-normalised over the survivors only, so a failed backend
//! never shrinks the total mass of the consensus.

use std::collections::BTreeMap;

use crate::backends::{BackendId, BackendResult};
use crate::normalize::{Distribution, Label};

/// Masses closer than this count as tied.
const TIE_EPS: f64 = 1e-9;

pub type EnsembleWeights = BTreeMap<BackendId, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct Fused {
    pub label: Label,
    pub distribution: Distribution,
    pub confidence: f64,
    /// Backends that fed the fusion, with their effective (re-normalised) weight.
    pub contributors: Vec<(BackendId, f64)>,
}

/// Fuse every successful result in `results`. `None` if nothing succeeded.
pub fn fuse(results: &[BackendResult], weights: &EnsembleWeights) -> Option<Fused> {
    let survivors: Vec<(BackendId, Label, Distribution)> = results
        .iter()
        .filter_map(|r| {
            r.classification()
                .map(|c| (r.backend, c.label, c.distribution))
        })
        .collect();
    if survivors.is_empty() {
        return None;
    }

    let raw: Vec<f64> = survivors
        .iter()
        .map(|(id, _, _)| {
            weights
                .get(id)
                .copied()
                .filter(|w| w.is_finite() && *w > 0.0)
                .unwrap_or(0.0)
        })
        .collect();
    let total: f64 = raw.iter().sum();
    let effective: Vec<f64> = if total > 0.0 {
        raw.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / survivors.len() as f64; survivors.len()]
    };

    let mut combined = [0.0f64; 3];
    for ((_, _, dist), w) in survivors.iter().zip(&effective) {
        combined[0] += w * dist.positive();
        combined[1] += w * dist.negative();
        combined[2] += w * dist.neutral();
    }
    let distribution = Distribution::new(combined[0], combined[1], combined[2])?;

    let tied = distribution.top_labels(TIE_EPS);
    let label = if tied.len() > 1 {
        // Highest-weighted backend whose own label is among the tied ones;
        // earlier entries win equal weights.
        let mut pick: Option<(f64, Label)> = None;
        for ((_, own, _), w) in survivors.iter().zip(&effective) {
            if tied.contains(own) && pick.map_or(true, |(best, _)| *w > best) {
                pick = Some((*w, *own));
            }
        }
        pick.map(|(_, l)| l).unwrap_or_else(|| distribution.argmax())
    } else {
        distribution.argmax()
    };

    Some(Fused {
        label,
        confidence: distribution.get(label),
        distribution,
        contributors: survivors
            .iter()
            .zip(effective)
            .map(|((id, _, _), w)| (*id, w))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Classification;
    use crate::error::BackendError;
    use crate::normalize::RawOutput;
    use rand::Rng;

    fn ok(id: BackendId, p: f64, n: f64, u: f64) -> BackendResult {
        let distribution = Distribution::new(p, n, u).unwrap();
        let label = distribution.argmax();
        BackendResult {
            backend: id,
            model_identifier: id.as_str().into(),
            latency_ms: 1,
            outcome: Ok(Classification {
                label,
                confidence: distribution.get(label),
                distribution,
                raw: RawOutput::Compound { compound: 0.0 },
            }),
        }
    }

    fn failed(id: BackendId) -> BackendResult {
        BackendResult::failed(id, id.as_str().into(), BackendError::Timeout { after_ms: 5 })
    }

    fn weights(pairs: &[(BackendId, f64)]) -> EnsembleWeights {
        pairs.iter().copied().collect()
    }

    #[test]
    fn literal_weighted_sum() {
        let results = vec![
            ok(BackendId::Remote, 0.8, 0.1, 0.1),
            ok(BackendId::Lexicon, 0.6, 0.2, 0.2),
            ok(BackendId::Statistical, 0.4, 0.3, 0.3),
        ];
        let w = weights(&[
            (BackendId::Remote, 0.5),
            (BackendId::Lexicon, 0.3),
            (BackendId::Statistical, 0.2),
        ]);
        let f = fuse(&results, &w).unwrap();
        assert!((f.distribution.positive() - 0.66).abs() < 1e-9);
        assert!((f.distribution.negative() - 0.17).abs() < 1e-9);
        assert!((f.distribution.neutral() - 0.17).abs() < 1e-9);
        assert_eq!(f.label, Label::Positive);
        assert!((f.confidence - 0.66).abs() < 1e-9);
    }

    #[test]
    fn failed_backend_weight_is_redistributed() {
        let results = vec![
            failed(BackendId::Remote),
            ok(BackendId::Lexicon, 0.6, 0.2, 0.2),
            ok(BackendId::Statistical, 0.4, 0.3, 0.3),
        ];
        let w = weights(&[
            (BackendId::Remote, 0.5),
            (BackendId::Lexicon, 0.3),
            (BackendId::Statistical, 0.2),
        ]);
        let f = fuse(&results, &w).unwrap();
        // 0.6 * 0.6 + 0.4 * 0.4
        assert!((f.distribution.positive() - 0.52).abs() < 1e-9);
        assert!(f.distribution.is_normalized());
        let eff: f64 = f.contributors.iter().map(|(_, w)| w).sum();
        assert!((eff - 1.0).abs() < 1e-12);
        assert_eq!(f.contributors.len(), 2);
    }

    #[test]
    fn single_survivor_keeps_its_distribution() {
        let results = vec![failed(BackendId::Remote), ok(BackendId::Keyword, 0.7, 0.15, 0.15)];
        let f = fuse(&results, &weights(&[(BackendId::Keyword, 0.1)])).unwrap();
        assert!((f.distribution.positive() - 0.7).abs() < 1e-12);
        assert_eq!(f.label, Label::Positive);
    }

    #[test]
    fn zero_weights_fall_back_to_equal_shares() {
        let results = vec![
            ok(BackendId::Lexicon, 1.0, 0.0, 0.0),
            ok(BackendId::Statistical, 0.0, 1.0, 0.0),
        ];
        let f = fuse(&results, &EnsembleWeights::new()).unwrap();
        assert!((f.distribution.positive() - 0.5).abs() < 1e-12);
        assert!((f.distribution.negative() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tie_goes_to_highest_weighted_backend() {
        let results = vec![
            ok(BackendId::Lexicon, 0.0, 1.0, 0.0),
            ok(BackendId::Statistical, 1.0, 0.0, 0.0),
        ];
        // Equal effective mass on positive and negative.
        let w = weights(&[(BackendId::Lexicon, 0.2), (BackendId::Statistical, 0.2)]);
        assert_eq!(fuse(&results, &w).unwrap().label, Label::Negative);

        let results = vec![
            ok(BackendId::Remote, 0.6, 0.0, 0.4),
            ok(BackendId::Lexicon, 0.0, 0.0, 1.0),
            ok(BackendId::Statistical, 1.0, 0.0, 0.0),
        ];
        // positive = 0.5*0.6 + 0.2 = 0.5, neutral = 0.5*0.4 + 0.3 = 0.5
        let w = weights(&[
            (BackendId::Remote, 0.5),
            (BackendId::Lexicon, 0.3),
            (BackendId::Statistical, 0.2),
        ]);
        let f = fuse(&results, &w).unwrap();
        assert_eq!(f.label, Label::Positive);
    }

    #[test]
    fn nothing_succeeded() {
        assert!(fuse(&[failed(BackendId::Remote)], &EnsembleWeights::new()).is_none());
    }

    #[test]
    fn randomized_fusion_matches_manual_sum() {
        let mut rng = rand::rng();
        for _ in 0..500 {
            let n = rng.random_range(1..=4usize);
            let ids = &BackendId::PRIORITY[..n];
            let mut results = Vec::new();
            let mut w = EnsembleWeights::new();
            for id in ids {
                results.push(ok(
                    *id,
                    rng.random_range(0.01..1.0),
                    rng.random_range(0.01..1.0),
                    rng.random_range(0.01..1.0),
                ));
                w.insert(*id, rng.random_range(0.0..1.0));
            }
            let f = fuse(&results, &w).unwrap();
            assert!(f.distribution.is_normalized());
            assert!((0.0..=1.0).contains(&f.confidence));
            assert!(f.distribution.top_labels(1e-9).contains(&f.label));

            let total: f64 = ids.iter().map(|id| w[id]).sum();
            let expected: f64 = results
                .iter()
                .map(|r| {
                    let share = if total > 0.0 { w[&r.backend] / total } else { 1.0 / n as f64 };
                    share * r.classification().unwrap().distribution.positive()
                })
                .sum();
            assert!((f.distribution.positive() - expected).abs() < 1e-9);
        }
    }
}
