use crate::config::SignalConfig;
use crate::model::draw::OccurrenceMatrix;
use crate::signal::{Fallback, MemberScores};

/// Interval-stability score: `100 / (1 + variance)` of the gaps between a
/// member's consecutive occurrences. Regular appearance rhythms (low gap
/// variance) score high; a member with fewer than two occurrences has no gap
/// series and falls back.
pub fn scores(matrix: &OccurrenceMatrix, _cfg: &SignalConfig) -> MemberScores {
    (0..matrix.universe())
        .map(|member_idx| {
            let occurrences: Vec<usize> = matrix
                .column(member_idx)
                .iter()
                .enumerate()
                .filter(|(_, &v)| v == 1)
                .map(|(i, _)| i)
                .collect();
            if occurrences.len() < 2 {
                return Err(Fallback::NoOccurrences);
            }
            let gaps: Vec<f64> = occurrences
                .windows(2)
                .map(|w| (w[1] - w[0]) as f64)
                .collect();
            let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
            let variance =
                gaps.iter().map(|g| (g - mean) * (g - mean)).sum::<f64>() / gaps.len() as f64;
            Ok(100.0 / (1.0 + variance))
        })
        .collect()
}
