pub mod ensemble;
pub mod frequency;
pub mod momentum;
pub mod neighbors;
pub mod normalize;
pub mod recurrence;
pub mod stability;
pub mod transition;
pub mod trend;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::SignalConfig;
use crate::model::draw::OccurrenceMatrix;

/// Closed set of scorers. The partition strategy is checked against this enum
/// rather than against dynamically-named score columns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Frequency,
    Momentum,
    TrendSlope,
    Neighbors,
    Recurrence,
    Transition,
    IntervalStability,
    BoostedTrees,
    RandomForest,
}

impl SignalKind {
    pub const ALL: [SignalKind; 9] = [
        SignalKind::Frequency,
        SignalKind::Momentum,
        SignalKind::TrendSlope,
        SignalKind::Neighbors,
        SignalKind::Recurrence,
        SignalKind::Transition,
        SignalKind::IntervalStability,
        SignalKind::BoostedTrees,
        SignalKind::RandomForest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Frequency => "frequency",
            SignalKind::Momentum => "momentum",
            SignalKind::TrendSlope => "trend_slope",
            SignalKind::Neighbors => "neighbors",
            SignalKind::Recurrence => "recurrence",
            SignalKind::Transition => "transition",
            SignalKind::IntervalStability => "interval_stability",
            SignalKind::BoostedTrees => "boosted_trees",
            SignalKind::RandomForest => "random_forest",
        }
    }

    /// Default per-signal weight prior for the reference configuration.
    pub fn reference_prior(&self) -> f64 {
        match self {
            SignalKind::Frequency => 1.2,
            SignalKind::Momentum => 0.8,
            SignalKind::TrendSlope => 1.0,
            SignalKind::Neighbors => 0.9,
            SignalKind::Recurrence => 1.1,
            SignalKind::Transition => 1.3,
            SignalKind::IntervalStability => 0.7,
            SignalKind::BoostedTrees => 1.5,
            SignalKind::RandomForest => 1.4,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a scorer could not produce a real value for a member, together with
/// everything needed to pick the documented substitute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum Fallback {
    InsufficientHistory,
    NoOccurrences,
    SingleClassCold,
    SingleClassHot,
    DegenerateFit,
    ShortTrainingWindow { occurrence_rate: f64 },
}

impl Fallback {
    /// The single place fallback policy is resolved to a score.
    pub fn substitute(&self, cfg: &SignalConfig) -> f64 {
        match self {
            Fallback::InsufficientHistory => 0.0,
            Fallback::NoOccurrences => 0.0,
            Fallback::DegenerateFit => 0.0,
            Fallback::SingleClassCold => cfg.fallback_cold,
            Fallback::SingleClassHot => cfg.fallback_hot,
            Fallback::ShortTrainingWindow { occurrence_rate } => *occurrence_rate,
        }
    }
}

/// One raw score per member; `Err` carries the reason the scorer fell back.
pub type MemberScores = Vec<Result<f64, Fallback>>;

#[derive(Debug, Clone, Serialize)]
pub struct FallbackEvent {
    pub signal: SignalKind,
    pub member: u8,
    pub fallback: Fallback,
    pub substituted: f64,
}

/// Raw (or normalized) score per universe member per signal, for one
/// evaluation point. Recomputed fresh every period.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    universe: usize,
    columns: BTreeMap<SignalKind, Vec<f64>>,
    fallbacks: Vec<FallbackEvent>,
}

impl ScoreTable {
    pub fn new(universe: usize) -> Self {
        Self {
            universe,
            columns: BTreeMap::new(),
            fallbacks: Vec::new(),
        }
    }

    /// Resolve per-member fallbacks to their substitutes and store the column.
    /// Non-finite values are treated as a degenerate fit, never stored as-is.
    pub fn insert_column(&mut self, kind: SignalKind, raw: MemberScores, cfg: &SignalConfig) {
        debug_assert_eq!(raw.len(), self.universe);
        let mut column = Vec::with_capacity(self.universe);
        for (idx, value) in raw.into_iter().enumerate() {
            let member = (idx + 1) as u8;
            let resolved = match value {
                Ok(v) if v.is_finite() => v,
                Ok(_) => {
                    let fallback = Fallback::DegenerateFit;
                    let substituted = fallback.substitute(cfg);
                    self.fallbacks.push(FallbackEvent {
                        signal: kind,
                        member,
                        fallback,
                        substituted,
                    });
                    substituted
                }
                Err(fallback) => {
                    let substituted = fallback.substitute(cfg);
                    self.fallbacks.push(FallbackEvent {
                        signal: kind,
                        member,
                        fallback,
                        substituted,
                    });
                    substituted
                }
            };
            column.push(resolved);
        }
        self.columns.insert(kind, column);
    }

    pub fn universe(&self) -> usize {
        self.universe
    }

    pub fn column(&self, kind: SignalKind) -> Option<&[f64]> {
        self.columns.get(&kind).map(Vec::as_slice)
    }

    pub fn column_mut(&mut self, kind: SignalKind) -> Option<&mut Vec<f64>> {
        self.columns.get_mut(&kind)
    }

    /// Score for a 1-based universe member.
    pub fn score(&self, kind: SignalKind, member: u8) -> Option<f64> {
        self.columns
            .get(&kind)?
            .get((member - 1) as usize)
            .copied()
    }

    pub fn kinds(&self) -> impl Iterator<Item = SignalKind> + '_ {
        self.columns.keys().copied()
    }

    pub fn fallbacks(&self) -> &[FallbackEvent] {
        &self.fallbacks
    }
}

/// Compute every signal over the supplied history slice. The caller is
/// responsible for slicing the history to exclude the evaluation period.
pub fn compute_raw_table(matrix: &OccurrenceMatrix, cfg: &SignalConfig) -> ScoreTable {
    let mut table = ScoreTable::new(matrix.universe());
    table.insert_column(SignalKind::Frequency, frequency::scores(matrix, cfg), cfg);
    table.insert_column(SignalKind::Momentum, momentum::scores(matrix, cfg), cfg);
    table.insert_column(SignalKind::TrendSlope, trend::scores(matrix, cfg), cfg);
    table.insert_column(SignalKind::Neighbors, neighbors::scores(matrix, cfg), cfg);
    table.insert_column(SignalKind::Recurrence, recurrence::scores(matrix, cfg), cfg);
    table.insert_column(SignalKind::Transition, transition::scores(matrix, cfg), cfg);
    table.insert_column(
        SignalKind::IntervalStability,
        stability::scores(matrix, cfg),
        cfg,
    );
    table.insert_column(
        SignalKind::BoostedTrees,
        ensemble::boosted_scores(matrix, cfg),
        cfg,
    );
    table.insert_column(
        SignalKind::RandomForest,
        ensemble::forest_scores(matrix, cfg),
        cfg,
    );
    table
}

/// Raw scores followed by per-column min-max normalization; this is the table
/// the partition strategy consumes.
pub fn compute_normalized_table(matrix: &OccurrenceMatrix, cfg: &SignalConfig) -> ScoreTable {
    let mut table = compute_raw_table(matrix, cfg);
    normalize::min_max(&mut table);
    table
}
