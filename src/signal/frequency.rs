use crate::config::SignalConfig;
use crate::model::draw::OccurrenceMatrix;
use crate::signal::{Fallback, MemberScores};

/// Occurrence share over the trailing `freq_window` draws (window shrinks to
/// the available history).
pub fn scores(matrix: &OccurrenceMatrix, cfg: &SignalConfig) -> MemberScores {
    let rows = matrix.len();
    if rows == 0 {
        return vec![Err(Fallback::InsufficientHistory); matrix.universe()];
    }
    let window = cfg.freq_window.min(rows);
    let start = rows - window;

    (0..matrix.universe())
        .map(|member_idx| {
            let count: u32 = (start..rows)
                .map(|row| matrix.row(row)[member_idx] as u32)
                .sum();
            Ok(count as f64 / window as f64)
        })
        .collect()
}
