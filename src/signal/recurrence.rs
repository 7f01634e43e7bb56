use crate::config::SignalConfig;
use crate::model::draw::OccurrenceMatrix;
use crate::signal::{Fallback, MemberScores};

const LEARNING_RATE: f64 = 0.1;

/// Per-member binary classifier: does the member occur in the next draw,
/// given the full occurrence vector of the current draw?
///
/// One logistic model per member, trained by full-batch gradient descent on
/// the trailing `recurrence_window` (draw_t, occurs_at_t+1) pairs, then
/// evaluated on the latest draw. A training window containing only one label
/// class cannot produce a meaningful probability and falls back to the
/// configured cold/hot substitute instead.
pub fn scores(matrix: &OccurrenceMatrix, cfg: &SignalConfig) -> MemberScores {
    let rows = matrix.len();
    let universe = matrix.universe();
    if rows < 2 {
        return vec![Err(Fallback::InsufficientHistory); universe];
    }

    let pairs = rows - 1;
    let window = cfg.recurrence_window.max(1).min(pairs);
    let first_pair = pairs - window;
    let latest = matrix.row(rows - 1);

    (0..universe)
        .map(|member_idx| {
            let labels: Vec<f64> = (first_pair..pairs)
                .map(|t| matrix.row(t + 1)[member_idx] as f64)
                .collect();
            let positives = labels.iter().filter(|&&y| y == 1.0).count();
            if positives == 0 {
                return Err(Fallback::SingleClassCold);
            }
            if positives == labels.len() {
                return Err(Fallback::SingleClassHot);
            }

            let mut model = Logistic::new(universe);
            for _ in 0..cfg.recurrence_epochs {
                model.step(matrix, first_pair, member_idx, &labels);
            }
            Ok(model.predict(latest))
        })
        .collect()
}

struct Logistic {
    weights: Vec<f64>,
    bias: f64,
}

impl Logistic {
    fn new(features: usize) -> Self {
        Self {
            weights: vec![0.0; features],
            bias: 0.0,
        }
    }

    fn step(
        &mut self,
        matrix: &OccurrenceMatrix,
        first_pair: usize,
        member_idx: usize,
        labels: &[f64],
    ) {
        let n = labels.len() as f64;
        let mut grad_w = vec![0.0; self.weights.len()];
        let mut grad_b = 0.0;
        for (sample, &label) in labels.iter().enumerate() {
            let features = matrix.row(first_pair + sample);
            debug_assert_eq!(matrix.row(first_pair + sample + 1)[member_idx] as f64, label);
            let p = self.predict(features);
            let err = p - label;
            for (w, &x) in grad_w.iter_mut().zip(features) {
                *w += err * x as f64;
            }
            grad_b += err;
        }
        for (w, g) in self.weights.iter_mut().zip(&grad_w) {
            *w -= LEARNING_RATE * g / n;
        }
        self.bias -= LEARNING_RATE * grad_b / n;
    }

    fn predict(&self, features: &[u8]) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, &x)| w * x as f64)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
