use crate::config::SignalConfig;
use crate::model::draw::OccurrenceMatrix;
use crate::signal::{Fallback, MemberScores};

/// First-order transition model: count member-to-member transitions across
/// consecutive draws, row-normalize to probabilities, then sum the rows of
/// the latest draw's members and renormalize so the prediction mass sums to 1.
pub fn scores(matrix: &OccurrenceMatrix, _cfg: &SignalConfig) -> MemberScores {
    let rows = matrix.len();
    let universe = matrix.universe();
    if rows < 2 {
        return vec![Err(Fallback::InsufficientHistory); universe];
    }

    let mut transitions = vec![vec![0.0f64; universe]; universe];
    for t in 0..rows - 1 {
        let current = matrix.row(t);
        let next = matrix.row(t + 1);
        for (from, &cur) in current.iter().enumerate() {
            if cur == 0 {
                continue;
            }
            for (to, &nxt) in next.iter().enumerate() {
                if nxt == 1 {
                    transitions[from][to] += 1.0;
                }
            }
        }
    }

    for row in &mut transitions {
        let total: f64 = row.iter().sum();
        if total > 0.0 {
            for v in row.iter_mut() {
                *v /= total;
            }
        }
    }

    let mut mass = vec![0.0f64; universe];
    // matrix.len() >= 2 was checked above.
    if let Some(last) = matrix.last_row() {
        for (from, &hit) in last.iter().enumerate() {
            if hit == 1 {
                for (to, v) in mass.iter_mut().enumerate() {
                    *v += transitions[from][to];
                }
            }
        }
    }

    let total: f64 = mass.iter().sum();
    if total > 0.0 {
        for v in mass.iter_mut() {
            *v /= total;
        }
    }
    mass.into_iter().map(Ok).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::draw::Draw;
    use chrono::NaiveDate;

    fn matrix_from(rows: &[[u8; 5]]) -> OccurrenceMatrix {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let draws: Vec<Draw> = rows
            .iter()
            .enumerate()
            .map(|(i, nums)| Draw::new(start + chrono::Days::new(i as u64), nums.to_vec()))
            .collect();
        OccurrenceMatrix::from_draws(39, &draws)
    }

    #[test]
    fn single_draw_falls_back() {
        let cfg = Config::reference().signals;
        let matrix = matrix_from(&[[1, 2, 3, 4, 5]]);
        let scores = scores(&matrix, &cfg);
        assert!(scores.iter().all(|s| *s == Err(Fallback::InsufficientHistory)));
    }

    #[test]
    fn repeating_transition_concentrates_mass() {
        let cfg = Config::reference().signals;
        // 1..5 is always followed by 11..15, and the latest draw is 1..5.
        let matrix = matrix_from(&[
            [1, 2, 3, 4, 5],
            [11, 12, 13, 14, 15],
            [1, 2, 3, 4, 5],
            [11, 12, 13, 14, 15],
            [1, 2, 3, 4, 5],
        ]);
        let scores = scores(&matrix, &cfg);
        let mass_11 = scores[10].unwrap();
        let mass_21 = scores[20].unwrap();
        assert!(mass_11 > 0.0);
        assert_eq!(mass_21, 0.0);
        let total: f64 = scores.iter().map(|s| s.unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prediction_mass_sums_to_one() {
        let cfg = Config::reference().signals;
        let matrix = matrix_from(&[
            [1, 8, 17, 25, 33],
            [2, 9, 18, 26, 34],
            [3, 10, 19, 27, 35],
            [1, 8, 19, 26, 33],
        ]);
        let scores = scores(&matrix, &cfg);
        let total: f64 = scores.iter().map(|s| s.unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
