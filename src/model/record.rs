use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::signal::{FallbackEvent, SignalKind};

/// Provenance of one group's contribution to a prediction.
#[derive(Debug, Clone, Serialize)]
pub struct GroupAnalysisRecord {
    pub group_id: u8,
    pub range: (u8, u8),
    pub selected: Vec<u8>,
    pub combined_scores: BTreeMap<u8, f64>,
    pub signal_scores: BTreeMap<SignalKind, BTreeMap<u8, f64>>,
}

/// The final candidate set for one period. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    /// Union of per-group selections before cross-group filtering.
    pub candidates: Vec<u8>,
    pub final_selection: Vec<u8>,
    pub selection_scores: BTreeMap<u8, f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GroupHit {
    pub group_id: u8,
    pub hits: usize,
    pub total: usize,
    pub rate: f64,
}

/// Revealed ground truth for a period and the realized intersection with the
/// prediction. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationRecord {
    pub predicted: Vec<u8>,
    pub actual: Vec<u8>,
    pub hits: Vec<u8>,
    /// hits / realized draw size.
    pub accuracy: f64,
    pub group_hits: Vec<GroupHit>,
}

impl VerificationRecord {
    pub fn evaluate(predicted: Vec<u8>, actual: Vec<u8>, group_hits: Vec<GroupHit>) -> Self {
        let hits: Vec<u8> = predicted
            .iter()
            .copied()
            .filter(|n| actual.contains(n))
            .collect();
        let accuracy = if actual.is_empty() {
            0.0
        } else {
            hits.len() as f64 / actual.len() as f64
        };
        Self {
            predicted,
            actual,
            hits,
            accuracy,
            group_hits,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightAction {
    Adjust,
    Maintain,
}

/// The short accuracy window that justified a weight decision.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BacktestWindow {
    pub window: usize,
    pub mean_accuracy: f64,
    pub baseline: f64,
}

/// Per-group, per-period output of the weight optimizer. Consumed by the
/// partition strategy for the next period only, never the current one.
#[derive(Debug, Clone, Serialize)]
pub struct WeightDecision {
    pub group_id: u8,
    pub action: WeightAction,
    /// Signed relative adjustment (e.g. 0.05 = +5% on every signal weight).
    pub adjustment: f64,
    pub reason: String,
    pub backtest: Option<BacktestWindow>,
}

impl WeightDecision {
    pub fn is_adjust(&self) -> bool {
        self.action == WeightAction::Adjust
    }
}

/// One durable audit record per training period.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodRecord {
    /// 1-based period number, matching the draw's position in the history.
    pub period_index: usize,
    pub train_size: usize,
    pub target_date: NaiveDate,
    pub groups: Vec<GroupAnalysisRecord>,
    pub prediction: PredictionRecord,
    pub verification: VerificationRecord,
    pub weight_decisions: Vec<WeightDecision>,
    pub fallbacks: Vec<FallbackEvent>,
}
