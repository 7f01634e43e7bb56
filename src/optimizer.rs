use crate::config::OptimizerConfig;
use crate::model::record::{BacktestWindow, WeightAction, WeightDecision};

/// Decides whether a group's weight vector should move, purely from the
/// accuracy history the caller passes in. Holds no state of its own.
///
/// The hysteresis band around the baseline exists to keep single-period noise
/// from whipsawing the weights: with so few realized outcomes per period, a
/// raw better/worse comparison would adjust almost every period.
#[derive(Debug, Clone)]
pub struct WeightOptimizer {
    cfg: OptimizerConfig,
}

impl WeightOptimizer {
    pub fn new(cfg: OptimizerConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.cfg
    }

    pub fn decide(
        &self,
        group_id: u8,
        latest_accuracy: f64,
        accuracy_history: &[f64],
    ) -> WeightDecision {
        let window = self.cfg.observation_window;
        if accuracy_history.len() < window {
            return WeightDecision {
                group_id,
                action: WeightAction::Maintain,
                adjustment: 0.0,
                reason: format!(
                    "only {} of {} observation periods available",
                    accuracy_history.len(),
                    window
                ),
                backtest: None,
            };
        }

        let recent = &accuracy_history[accuracy_history.len() - window..];
        let recent_mean: f64 = recent.iter().sum::<f64>() / window as f64;
        let baseline = self.cfg.baseline_accuracy;
        let diff = recent_mean - baseline;
        let backtest = Some(BacktestWindow {
            window,
            mean_accuracy: recent_mean,
            baseline,
        });

        if diff > self.cfg.hysteresis {
            let adjustment = (self.cfg.learning_rate * diff).min(self.cfg.max_step);
            WeightDecision {
                group_id,
                action: WeightAction::Adjust,
                adjustment,
                reason: format!(
                    "recent mean accuracy {:.3} above baseline {:.3} (latest {:.3})",
                    recent_mean, baseline, latest_accuracy
                ),
                backtest,
            }
        } else if diff < -self.cfg.hysteresis {
            let adjustment = -(self.cfg.learning_rate * diff.abs()).min(self.cfg.max_step);
            WeightDecision {
                group_id,
                action: WeightAction::Adjust,
                adjustment,
                reason: format!(
                    "recent mean accuracy {:.3} below baseline {:.3} (latest {:.3})",
                    recent_mean, baseline, latest_accuracy
                ),
                backtest,
            }
        } else {
            WeightDecision {
                group_id,
                action: WeightAction::Maintain,
                adjustment: 0.0,
                reason: format!(
                    "recent mean accuracy {:.3} within hysteresis band of baseline {:.3}",
                    recent_mean, baseline
                ),
                backtest,
            }
        }
    }
}
