use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::SignalConfig;
use crate::model::draw::OccurrenceMatrix;
use crate::signal::{Fallback, MemberScores};

/// Retraining from scratch every period on a small rolling window is the
/// intended behavior; only the window construction is behind this seam so a
/// true online learner could be substituted without touching the trainer.
pub trait WindowBuilder {
    fn build(&self, matrix: &OccurrenceMatrix, member_idx: usize) -> Option<TrainingWindow>;
}

#[derive(Debug, Clone)]
pub struct TrainingWindow {
    /// One feature vector per sample: the member's lagged occurrence history.
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
    /// Feature vector for the draw being predicted.
    pub latest: Vec<f64>,
}

/// Rolling window of the member's own lagged occurrence history:
/// `min(max(20, rows / 3), 30)` lags, one sample per draw after warmup.
pub struct LaggedOccurrenceWindow;

impl WindowBuilder for LaggedOccurrenceWindow {
    fn build(&self, matrix: &OccurrenceMatrix, member_idx: usize) -> Option<TrainingWindow> {
        let rows = matrix.len();
        let window = (rows / 3).max(20).min(30);
        if rows <= window {
            return None;
        }
        let column = matrix.column(member_idx);
        let mut features = Vec::with_capacity(rows - window);
        let mut labels = Vec::with_capacity(rows - window);
        for i in window..rows {
            features.push(column[i - window..i].iter().map(|&v| v as f64).collect());
            labels.push(column[i] as f64);
        }
        let latest = column[rows - window..].iter().map(|&v| v as f64).collect();
        Some(TrainingWindow {
            features,
            labels,
            latest,
        })
    }
}

const MIN_TRAIN_SAMPLES: usize = 11;
const BOOST_SHRINKAGE: f64 = 0.1;
const FOREST_SALT: u64 = 0x464f_5245_5354;
const BOOST_SALT: u64 = 0x424f_4f53_5445;

/// Bagged decision-stump ensemble (random-forest flavored).
pub fn forest_scores(matrix: &OccurrenceMatrix, cfg: &SignalConfig) -> MemberScores {
    scores_with(&LaggedOccurrenceWindow, matrix, cfg, EnsembleKind::Forest)
}

/// Gradient-boosted decision-stump ensemble.
pub fn boosted_scores(matrix: &OccurrenceMatrix, cfg: &SignalConfig) -> MemberScores {
    scores_with(&LaggedOccurrenceWindow, matrix, cfg, EnsembleKind::Boosted)
}

#[derive(Debug, Clone, Copy)]
enum EnsembleKind {
    Forest,
    Boosted,
}

fn scores_with<W: WindowBuilder>(
    builder: &W,
    matrix: &OccurrenceMatrix,
    cfg: &SignalConfig,
    kind: EnsembleKind,
) -> MemberScores {
    (0..matrix.universe())
        .map(|member_idx| {
            let Some(window) = builder.build(matrix, member_idx) else {
                return Err(Fallback::ShortTrainingWindow {
                    occurrence_rate: occurrence_rate(matrix, member_idx),
                });
            };
            if window.labels.len() < MIN_TRAIN_SAMPLES {
                let rate = window.labels.iter().sum::<f64>() / window.labels.len().max(1) as f64;
                return Err(Fallback::ShortTrainingWindow {
                    occurrence_rate: rate,
                });
            }
            let positives = window.labels.iter().filter(|&&y| y == 1.0).count();
            if positives == 0 {
                return Err(Fallback::SingleClassCold);
            }
            if positives == window.labels.len() {
                return Err(Fallback::SingleClassHot);
            }

            let prediction = match kind {
                EnsembleKind::Forest => {
                    let seed = child_seed(cfg.ensemble_seed, member_idx, matrix.len(), FOREST_SALT);
                    forest_predict(&window, cfg, seed)
                }
                EnsembleKind::Boosted => {
                    let seed = child_seed(cfg.ensemble_seed, member_idx, matrix.len(), BOOST_SALT);
                    boosted_predict(&window, cfg, seed)
                }
            };
            Ok(prediction.clamp(0.0, 1.0))
        })
        .collect()
}

fn occurrence_rate(matrix: &OccurrenceMatrix, member_idx: usize) -> f64 {
    if matrix.is_empty() {
        return 0.5;
    }
    let column = matrix.column(member_idx);
    column.iter().map(|&v| v as f64).sum::<f64>() / column.len() as f64
}

/// Derive a per-member child seed arithmetically so identical runs are
/// byte-identical regardless of scheduling.
fn child_seed(base: u64, member_idx: usize, rows: usize, salt: u64) -> u64 {
    let mut h = base ^ salt;
    h = h
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(member_idx as u64 + 1);
    h.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(rows as u64)
}

/// Regression stump over binary lag features: split at 0.5 on the feature
/// with the lowest squared error, predict the side means.
#[derive(Debug, Clone, Copy)]
struct Stump {
    feature: usize,
    left: f64,
    right: f64,
}

impl Stump {
    fn fit(features: &[Vec<f64>], targets: &[f64], indices: &[usize]) -> Self {
        let overall: f64 =
            indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len().max(1) as f64;
        let n_features = features.first().map(Vec::len).unwrap_or(0);

        let mut best = Stump {
            feature: 0,
            left: overall,
            right: overall,
        };
        let mut best_sse = f64::INFINITY;

        for feature in 0..n_features {
            let mut left_sum = 0.0;
            let mut left_n = 0usize;
            let mut right_sum = 0.0;
            let mut right_n = 0usize;
            for &i in indices {
                if features[i][feature] <= 0.5 {
                    left_sum += targets[i];
                    left_n += 1;
                } else {
                    right_sum += targets[i];
                    right_n += 1;
                }
            }
            let left = if left_n > 0 { left_sum / left_n as f64 } else { overall };
            let right = if right_n > 0 { right_sum / right_n as f64 } else { overall };

            let mut sse = 0.0;
            for &i in indices {
                let predicted = if features[i][feature] <= 0.5 { left } else { right };
                let err = targets[i] - predicted;
                sse += err * err;
            }
            if sse < best_sse {
                best_sse = sse;
                best = Stump {
                    feature,
                    left,
                    right,
                };
            }
        }
        best
    }

    fn predict(&self, features: &[f64]) -> f64 {
        if features[self.feature] <= 0.5 {
            self.left
        } else {
            self.right
        }
    }
}

fn forest_predict(window: &TrainingWindow, cfg: &SignalConfig, seed: u64) -> f64 {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = window.labels.len();
    let trees = cfg.ensemble_trees.max(1);

    let mut total = 0.0;
    let mut bootstrap = vec![0usize; n];
    for _ in 0..trees {
        for slot in bootstrap.iter_mut() {
            *slot = rng.gen_range(0..n);
        }
        let stump = Stump::fit(&window.features, &window.labels, &bootstrap);
        total += stump.predict(&window.latest);
    }
    total / trees as f64
}

fn boosted_predict(window: &TrainingWindow, cfg: &SignalConfig, seed: u64) -> f64 {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = window.labels.len();
    let rounds = cfg.ensemble_rounds.max(1);
    let sample_size = ((n as f64 * cfg.ensemble_subsample) as usize).clamp(1, n);

    let base: f64 = window.labels.iter().sum::<f64>() / n as f64;
    let mut residuals: Vec<f64> = window.labels.iter().map(|&y| y - base).collect();
    let mut prediction = base;

    let mut indices: Vec<usize> = (0..n).collect();
    for _ in 0..rounds {
        indices.shuffle(&mut rng);
        let sample = &indices[..sample_size];
        let stump = Stump::fit(&window.features, &residuals, sample);
        for (i, residual) in residuals.iter_mut().enumerate() {
            *residual -= BOOST_SHRINKAGE * stump.predict(&window.features[i]);
        }
        prediction += BOOST_SHRINKAGE * stump.predict(&window.latest);
    }
    prediction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::draw::Draw;
    use chrono::NaiveDate;

    /// Member 1 follows `pattern`; filler members keep the draws valid.
    fn matrix_with_member_one(pattern: &[u8]) -> OccurrenceMatrix {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let draws: Vec<Draw> = pattern
            .iter()
            .enumerate()
            .map(|(i, &hit)| {
                let mut numbers = vec![30, 31, 32, 33];
                numbers.push(if hit == 1 { 1 } else { 2 });
                Draw::new(start + chrono::Days::new(i as u64), numbers)
            })
            .collect();
        OccurrenceMatrix::from_draws(39, &draws)
    }

    fn alternating(rows: usize) -> Vec<u8> {
        (0..rows).map(|i| if i % 2 == 0 { 1 } else { 0 }).collect()
    }

    #[test]
    fn window_builder_sizes_per_history() {
        let matrix = matrix_with_member_one(&alternating(40));
        let window = LaggedOccurrenceWindow.build(&matrix, 0).unwrap();
        // 40 rows -> lag window max(20, 13) = 20, so 20 samples.
        assert_eq!(window.features[0].len(), 20);
        assert_eq!(window.labels.len(), 20);
        assert_eq!(window.latest.len(), 20);
    }

    #[test]
    fn short_history_falls_back_to_occurrence_rate() {
        let cfg = Config::reference().signals;
        let matrix = matrix_with_member_one(&alternating(10));
        let scores = forest_scores(&matrix, &cfg);
        match scores[0] {
            Err(Fallback::ShortTrainingWindow { occurrence_rate }) => {
                assert!((occurrence_rate - 0.5).abs() < 1e-9);
            }
            ref other => panic!("expected short-window fallback, got {:?}", other),
        }
    }

    #[test]
    fn single_class_windows_fall_back() {
        let cfg = Config::reference().signals;
        let matrix = matrix_with_member_one(&vec![1u8; 40]);
        let forest = forest_scores(&matrix, &cfg);
        assert_eq!(forest[0], Err(Fallback::SingleClassHot));
        // Member 39 never occurs at all.
        assert_eq!(forest[38], Err(Fallback::SingleClassCold));
        let boosted = boosted_scores(&matrix, &cfg);
        assert_eq!(boosted[0], Err(Fallback::SingleClassHot));
    }

    #[test]
    fn forest_learns_a_perfectly_periodic_member() {
        let cfg = Config::reference().signals;
        let matrix = matrix_with_member_one(&alternating(40));
        let scores = forest_scores(&matrix, &cfg);
        // Last occurrence at row 38, so the member is due at row 40.
        let p = scores[0].unwrap();
        assert!(p > 0.9, "expected near-certain prediction, got {}", p);
    }

    #[test]
    fn boosting_learns_a_perfectly_periodic_member() {
        let cfg = Config::reference().signals;
        let matrix = matrix_with_member_one(&alternating(40));
        let scores = boosted_scores(&matrix, &cfg);
        let p = scores[0].unwrap();
        assert!(p > 0.9, "expected near-certain prediction, got {}", p);
    }

    #[test]
    fn identical_seeds_are_deterministic() {
        let cfg = Config::reference().signals;
        let matrix = matrix_with_member_one(&alternating(40));
        let a = forest_scores(&matrix, &cfg);
        let b = forest_scores(&matrix, &cfg);
        assert_eq!(a, b);
        let a = boosted_scores(&matrix, &cfg);
        let b = boosted_scores(&matrix, &cfg);
        assert_eq!(a, b);
    }
}
