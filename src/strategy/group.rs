use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::GroupRange;
use crate::model::record::GroupAnalysisRecord;
use crate::signal::{ScoreTable, SignalKind};

/// Per-group, per-signal multiplicative weight vector. The only mutable
/// per-group state carried between training periods; everything else is
/// recomputed fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupWeights {
    weights: BTreeMap<SignalKind, f64>,
}

impl GroupWeights {
    pub fn from_priors(priors: &BTreeMap<SignalKind, f64>) -> Self {
        Self {
            weights: priors.clone(),
        }
    }

    /// Weight for a signal; unset signals weigh 1.0.
    pub fn get(&self, kind: SignalKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(1.0)
    }

    pub fn weights(&self) -> &BTreeMap<SignalKind, f64> {
        &self.weights
    }

    /// Apply a relative adjustment (e.g. +0.05 = +5%) to every signal weight,
    /// clamped to the configured band so weight history stays bounded.
    pub fn apply_adjustment(&mut self, adjustment: f64, min: f64, max: f64) {
        for weight in self.weights.values_mut() {
            *weight = (*weight * (1.0 + adjustment)).clamp(min, max);
        }
    }
}

/// Slice the normalized score table to the group's range, combine signals
/// with the group's weight vector, and pick exactly the top `picks` members.
///
/// The forced top-K (rather than a score threshold) is deliberate: every
/// group contributes a fixed number of candidates no matter how flat its
/// score distribution is, so the cross-group pool can never under-fill from
/// a timid group. Ties break toward the lower member id.
pub fn analyze_group(
    table: &ScoreTable,
    group: &GroupRange,
    weights: &GroupWeights,
    picks: usize,
) -> GroupAnalysisRecord {
    let mut combined_scores = BTreeMap::new();
    let mut signal_scores: BTreeMap<SignalKind, BTreeMap<u8, f64>> = BTreeMap::new();

    let total_weight: f64 = table.kinds().map(|kind| weights.get(kind)).sum();

    for member in group.members() {
        let mut combined = 0.0;
        for kind in table.kinds() {
            // Members inside a validated group range always have a score.
            let score = table.score(kind, member).unwrap_or(0.0);
            combined += score * weights.get(kind);
            signal_scores.entry(kind).or_default().insert(member, score);
        }
        if total_weight > 0.0 {
            combined /= total_weight;
        }
        combined_scores.insert(member, combined);
    }

    let mut ranked: Vec<(u8, f64)> = combined_scores
        .iter()
        .map(|(&member, &score)| (member, score))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    let mut selected: Vec<u8> = ranked.into_iter().take(picks).map(|(m, _)| m).collect();
    selected.sort_unstable();

    GroupAnalysisRecord {
        group_id: group.id,
        range: (group.lo, group.hi),
        selected,
        combined_scores,
        signal_scores,
    }
}
