use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::audit::{AuditSink, IterationLogger, TrainingSummary};
use crate::config::Config;
use crate::error::EngineError;
use crate::model::draw::{DrawHistory, OccurrenceMatrix};
use crate::model::record::{GroupHit, PeriodRecord, VerificationRecord, WeightDecision};
use crate::optimizer::WeightOptimizer;
use crate::signal;
use crate::strategy::cross_group;
use crate::strategy::group::{analyze_group, GroupWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerPhase {
    NotStarted,
    /// Currently training the period at this 0-based draw index.
    Running(usize),
    Finalized,
}

/// Durable per-group weight state, written at the end of a run and reloadable
/// at the start of the next so weight evolution survives across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub groups: Vec<GroupWeightEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWeightEntry {
    pub group_id: u8,
    pub weights: GroupWeights,
}

/// Strict chronological walk over the draw history.
///
/// Period i trains on draws `0..i` only, predicts draw i, then reveals it.
/// Weight decisions made after revealing period i take effect at period i+1;
/// the scores of period i are never recomputed. Each period's record is
/// persisted before the walk advances, so an aborted run leaves a complete
/// audit trail for everything it finished.
pub struct WalkForwardTrainer<S: AuditSink> {
    config: Config,
    history: DrawHistory,
    weights: BTreeMap<u8, GroupWeights>,
    accuracy_history: BTreeMap<u8, Vec<f64>>,
    optimizer: WeightOptimizer,
    logger: IterationLogger<S>,
    phase: TrainerPhase,
}

impl<S: AuditSink> WalkForwardTrainer<S> {
    pub fn new(
        config: Config,
        history: DrawHistory,
        logger: IterationLogger<S>,
    ) -> Result<Self, EngineError> {
        if history.len() <= config.trainer.initial_periods {
            return Err(EngineError::InsufficientHistory {
                required: config.trainer.initial_periods + 1,
                available: history.len(),
            });
        }
        let mut weights = BTreeMap::new();
        let mut accuracy_history = BTreeMap::new();
        for group in &config.groups {
            weights.insert(group.id, GroupWeights::from_priors(&config.priors));
            accuracy_history.insert(group.id, Vec::new());
        }
        let optimizer = WeightOptimizer::new(config.optimizer);
        Ok(Self {
            config,
            history,
            weights,
            accuracy_history,
            optimizer,
            logger,
            phase: TrainerPhase::NotStarted,
        })
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    pub fn group_weights(&self, group_id: u8) -> Option<&GroupWeights> {
        self.weights.get(&group_id)
    }

    pub fn accuracy_history(&self, group_id: u8) -> Option<&[f64]> {
        self.accuracy_history.get(&group_id).map(Vec::as_slice)
    }

    pub fn logger(&self) -> &IterationLogger<S> {
        &self.logger
    }

    pub fn load_weights(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let snapshot: WeightSnapshot = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        for entry in snapshot.groups {
            if let Some(slot) = self.weights.get_mut(&entry.group_id) {
                *slot = entry.weights;
            }
        }
        info!(path = %path.display(), "group weights restored");
        Ok(())
    }

    pub fn save_weights(&self, path: &Path) -> Result<()> {
        let snapshot = WeightSnapshot {
            groups: self
                .weights
                .iter()
                .map(|(&group_id, weights)| GroupWeightEntry {
                    group_id,
                    weights: weights.clone(),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "group weights saved");
        Ok(())
    }

    /// Walk every period from `initial_periods` to the end of the history.
    pub fn run(&mut self) -> Result<TrainingSummary> {
        self.run_finishing_at(Utc::now())
    }

    /// `run` with a caller-supplied completion timestamp, so determinism tests
    /// can compare whole sessions byte for byte.
    pub fn run_finishing_at(&mut self, finished_at: DateTime<Utc>) -> Result<TrainingSummary> {
        let start = self.config.trainer.initial_periods;
        let end = self.history.len();
        info!(
            first_period = start + 1,
            last_period = end,
            "starting walk-forward training"
        );

        for period in start..end {
            self.phase = TrainerPhase::Running(period);
            self.train_period(period)
                .with_context(|| format!("training period {} failed", period + 1))?;
        }

        self.phase = TrainerPhase::Finalized;
        let summary = self.logger.finalize(finished_at)?.clone();
        info!(
            periods = summary.statistics.total_periods,
            average_accuracy = summary.statistics.average_accuracy,
            total_hits = summary.statistics.total_hits,
            "walk-forward training finished"
        );
        Ok(summary)
    }

    fn train_period(&mut self, period: usize) -> Result<()> {
        let target = self
            .history
            .draw(period)
            .ok_or_else(|| EngineError::History(format!("no draw at index {}", period)))?
            .clone();
        let train = self.history.prefix(period);

        let matrix = OccurrenceMatrix::from_draws(self.config.game.universe, train);
        let table = signal::compute_normalized_table(&matrix, &self.config.signals);

        let groups: Vec<_> = self
            .config
            .groups
            .iter()
            .map(|group| {
                // Every configured group has a weight entry from construction.
                let weights = self
                    .weights
                    .get(&group.id)
                    .cloned()
                    .unwrap_or_else(|| GroupWeights::from_priors(&self.config.priors));
                analyze_group(&table, group, &weights, self.config.selection.picks_per_group)
            })
            .collect();

        let prediction = cross_group::select(&groups, &self.config.selection);

        // Reveal the truth only after the prediction is fixed.
        let actual = target.numbers.clone();
        let group_hits: Vec<GroupHit> = groups
            .iter()
            .map(|analysis| {
                let total = analysis.selected.len();
                let hits = analysis
                    .selected
                    .iter()
                    .filter(|n| actual.contains(n))
                    .count();
                let rate = if total == 0 {
                    0.0
                } else {
                    hits as f64 / total as f64
                };
                GroupHit {
                    group_id: analysis.group_id,
                    hits,
                    total,
                    rate,
                }
            })
            .collect();
        let verification =
            VerificationRecord::evaluate(prediction.final_selection.clone(), actual, group_hits);

        let mut weight_decisions: Vec<WeightDecision> = Vec::new();
        for hit in &verification.group_hits {
            let history = self
                .accuracy_history
                .entry(hit.group_id)
                .or_default();
            history.push(hit.rate);
            let decision = self.optimizer.decide(hit.group_id, hit.rate, history);
            if decision.is_adjust() {
                if let Some(weights) = self.weights.get_mut(&hit.group_id) {
                    weights.apply_adjustment(
                        decision.adjustment,
                        self.config.optimizer.weight_min,
                        self.config.optimizer.weight_max,
                    );
                }
            }
            weight_decisions.push(decision);
        }

        let record = PeriodRecord {
            period_index: period + 1,
            train_size: period,
            target_date: target.date,
            groups,
            prediction,
            verification,
            weight_decisions,
            fallbacks: table.fallbacks().to_vec(),
        };

        debug!(
            period = record.period_index,
            predicted = ?record.prediction.final_selection,
            accuracy = record.verification.accuracy,
            "period evaluated"
        );

        // The record must be durable before the walk advances.
        self.logger
            .append(&record)
            .with_context(|| format!("failed to persist period {}", record.period_index))?;
        Ok(())
    }
}
