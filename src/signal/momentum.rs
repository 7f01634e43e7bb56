use crate::config::SignalConfig;
use crate::model::draw::OccurrenceMatrix;
use crate::signal::{Fallback, MemberScores};

/// Gain/loss-ratio momentum over a smoothed occurrence count, in [0, 1].
///
/// Each member's occurrence column is first smoothed with a rolling
/// `momentum_smooth`-draw sum; the indicator is then the classic
/// `1 - 1/(1 + rs)` over the mean gain and mean loss of the last
/// `momentum_window` deltas of that series. A window with zero total loss
/// clamps to the maximum rather than dividing by zero.
pub fn scores(matrix: &OccurrenceMatrix, cfg: &SignalConfig) -> MemberScores {
    let rows = matrix.len();
    let smooth = cfg.momentum_smooth.max(1);
    let window = cfg.momentum_window.max(1);
    // `smooth`-wide sums yield `rows - smooth + 1` points and one fewer delta.
    let required = smooth + window;

    (0..matrix.universe())
        .map(|member_idx| {
            if rows < required {
                return Err(Fallback::InsufficientHistory);
            }
            let column = matrix.column(member_idx);
            let smoothed: Vec<f64> = (smooth - 1..rows)
                .map(|i| {
                    column[i + 1 - smooth..=i]
                        .iter()
                        .map(|&v| v as f64)
                        .sum()
                })
                .collect();
            let deltas: Vec<f64> = smoothed.windows(2).map(|w| w[1] - w[0]).collect();
            let tail = &deltas[deltas.len() - window..];

            let avg_gain: f64 =
                tail.iter().map(|&d| d.max(0.0)).sum::<f64>() / window as f64;
            let avg_loss: f64 =
                tail.iter().map(|&d| (-d).max(0.0)).sum::<f64>() / window as f64;

            if avg_loss <= f64::EPSILON {
                return Ok(1.0);
            }
            let rs = avg_gain / avg_loss;
            Ok(1.0 - 1.0 / (1.0 + rs))
        })
        .collect()
}
