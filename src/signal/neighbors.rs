use crate::config::SignalConfig;
use crate::model::draw::OccurrenceMatrix;
use crate::signal::{Fallback, MemberScores};

/// Similarity vote: find the `neighbors_k` historical draws closest to the
/// latest draw by Jaccard distance, then aggregate the draws that followed
/// each neighbor. A member's score is its share of those successor draws.
pub fn scores(matrix: &OccurrenceMatrix, cfg: &SignalConfig) -> MemberScores {
    let rows = matrix.len();
    let k = cfg.neighbors_k.max(1);
    if rows < k + 1 {
        return vec![Err(Fallback::InsufficientHistory); matrix.universe()];
    }

    let target = matrix.row(rows - 1);
    let mut distances: Vec<(f64, usize)> = (0..rows - 1)
        .map(|i| (jaccard_distance(matrix.row(i), target), i))
        .collect();
    // Ties break toward the older draw so the vote is deterministic.
    distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));

    let mut counts = vec![0u32; matrix.universe()];
    for &(_, idx) in distances.iter().take(k) {
        let successor = matrix.row(idx + 1);
        for (member_idx, &hit) in successor.iter().enumerate() {
            counts[member_idx] += hit as u32;
        }
    }

    counts
        .into_iter()
        .map(|c| Ok(c as f64 / k as f64))
        .collect()
}

fn jaccard_distance(a: &[u8], b: &[u8]) -> f64 {
    let mut intersection = 0u32;
    let mut union = 0u32;
    for (&x, &y) in a.iter().zip(b) {
        if x == 1 && y == 1 {
            intersection += 1;
        }
        if x == 1 || y == 1 {
            union += 1;
        }
    }
    if union == 0 {
        return 1.0;
    }
    1.0 - intersection as f64 / union as f64
}
