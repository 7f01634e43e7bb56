use crate::config::SignalConfig;
use crate::model::draw::OccurrenceMatrix;
use crate::signal::{Fallback, MemberScores};

/// Least-squares slope of the cumulative occurrence series over the trailing
/// `trend_window` draws (window shrinks to the available history). The slope
/// approximates the member's recent appearance rate; regression on the
/// cumulative sum is far less noisy than on the raw 0/1 column.
pub fn scores(matrix: &OccurrenceMatrix, cfg: &SignalConfig) -> MemberScores {
    let rows = matrix.len();
    let window = cfg.trend_window.min(rows);

    (0..matrix.universe())
        .map(|member_idx| {
            if window < 2 {
                return Err(Fallback::DegenerateFit);
            }
            let column = matrix.column(member_idx);
            let mut cumulative = 0.0;
            let y: Vec<f64> = column[rows - window..]
                .iter()
                .map(|&v| {
                    cumulative += v as f64;
                    cumulative
                })
                .collect();
            Ok(slope(&y))
        })
        .collect()
}

/// Ordinary least squares slope against x = 0..n.
fn slope(y: &[f64]) -> f64 {
    let n = y.len() as f64;
    let sum_x = (n - 1.0) * n / 2.0;
    let sum_xx = (n - 1.0) * n * (2.0 * n - 1.0) / 6.0;
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = y.iter().enumerate().map(|(i, &v)| i as f64 * v).sum();
    (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x)
}
