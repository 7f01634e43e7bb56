use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::SelectionConfig;
use crate::model::record::{GroupAnalysisRecord, PredictionRecord};

/// Ordering used when the quota-bounded pass leaves the final set short of
/// the minimum target and remaining candidates are admitted regardless of
/// group quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackfillOrder {
    /// Highest combined score first (the reference behavior).
    CombinedScore,
    /// Lowest member id first.
    MemberId,
}

/// Merge per-group candidate sets into the final prediction.
///
/// Pass 1 walks all candidates in descending combined-score order, admitting
/// a member only while its owning group is below `max_per_group`, and stops
/// at `target_max`. Pass 2 backfills past group quotas if the set is still
/// below `target_min`. Output is sorted and duplicate-free.
pub fn select(groups: &[GroupAnalysisRecord], cfg: &SelectionConfig) -> PredictionRecord {
    // (member, score, owning group), one entry per group-selected candidate.
    let mut pool: Vec<(u8, f64, u8)> = Vec::new();
    for group in groups {
        for &member in &group.selected {
            let score = group.combined_scores.get(&member).copied().unwrap_or(0.0);
            pool.push((member, score, group.group_id));
        }
    }
    pool.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut candidates: Vec<u8> = pool.iter().map(|&(m, _, _)| m).collect();
    candidates.sort_unstable();
    candidates.dedup();

    let mut final_selection: Vec<u8> = Vec::new();
    let mut group_counts: BTreeMap<u8, usize> = BTreeMap::new();

    for &(member, _, group_id) in &pool {
        if final_selection.len() >= cfg.target_max {
            break;
        }
        if final_selection.contains(&member) {
            continue;
        }
        let count = group_counts.entry(group_id).or_insert(0);
        if *count < cfg.max_per_group {
            final_selection.push(member);
            *count += 1;
        }
    }

    if final_selection.len() < cfg.target_min {
        let mut remaining: Vec<(u8, f64)> = pool
            .iter()
            .filter(|(m, _, _)| !final_selection.contains(m))
            .map(|&(m, s, _)| (m, s))
            .collect();
        remaining.dedup_by_key(|(m, _)| *m);
        match cfg.backfill {
            BackfillOrder::CombinedScore => {
                // The pool is already score-descending.
            }
            BackfillOrder::MemberId => {
                remaining.sort_by_key(|&(m, _)| m);
            }
        }
        for (member, _) in remaining {
            if final_selection.len() >= cfg.target_min {
                break;
            }
            final_selection.push(member);
        }
    }

    final_selection.sort_unstable();

    let mut selection_scores = BTreeMap::new();
    for &member in &final_selection {
        let score = pool
            .iter()
            .find(|(m, _, _)| *m == member)
            .map(|&(_, s, _)| s)
            .unwrap_or(0.0);
        selection_scores.insert(member, score);
    }

    PredictionRecord {
        candidates,
        final_selection,
        selection_scores,
    }
}
