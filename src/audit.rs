use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::EngineError;
use crate::model::record::PeriodRecord;

#[derive(Debug, Clone, Serialize)]
pub struct IterationEntry {
    pub period: usize,
    pub date: NaiveDate,
    pub accuracy: f64,
    pub hits: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SummaryStats {
    pub total_periods: usize,
    pub average_accuracy: f64,
    pub best_accuracy: f64,
    pub worst_accuracy: f64,
    pub total_hits: usize,
}

impl SummaryStats {
    fn from_iterations(iterations: &[IterationEntry]) -> Self {
        if iterations.is_empty() {
            return Self {
                total_periods: 0,
                average_accuracy: 0.0,
                best_accuracy: 0.0,
                worst_accuracy: 0.0,
                total_hits: 0,
            };
        }
        let accuracies: Vec<f64> = iterations.iter().map(|it| it.accuracy).collect();
        Self {
            total_periods: iterations.len(),
            average_accuracy: accuracies.iter().sum::<f64>() / accuracies.len() as f64,
            best_accuracy: accuracies.iter().copied().fold(f64::MIN, f64::max),
            worst_accuracy: accuracies.iter().copied().fold(f64::MAX, f64::min),
            total_hits: iterations.iter().map(|it| it.hits).sum(),
        }
    }
}

/// Rolling per-session summary, kept consistent after every append rather
/// than reconstructed by replaying period records.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub iterations: Vec<IterationEntry>,
    pub statistics: SummaryStats,
}

/// Where durable audit records go. The trainer only ever appends; there is no
/// API to rewrite a past period.
pub trait AuditSink {
    fn append_period(&mut self, period_index: usize, json: &str) -> Result<()>;
    fn write_summary(&mut self, json: &str) -> Result<()>;
}

/// Production sink: one `period_XXX.json` per period plus
/// `training_summary.json` under `<root>/<session_id>/`.
#[derive(Debug)]
pub struct FsAuditSink {
    session_dir: PathBuf,
}

impl FsAuditSink {
    pub fn create(root: &Path, session_id: &str) -> Result<Self> {
        let session_dir = root.join(session_id);
        std::fs::create_dir_all(&session_dir)
            .with_context(|| format!("failed to create {}", session_dir.display()))?;
        Ok(Self { session_dir })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }
}

impl AuditSink for FsAuditSink {
    fn append_period(&mut self, period_index: usize, json: &str) -> Result<()> {
        let path = self.session_dir.join(format!("period_{:03}.json", period_index));
        if path.exists() {
            return Err(EngineError::Audit(format!(
                "period {} is already recorded at {}",
                period_index,
                path.display()
            ))
            .into());
        }
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    fn write_summary(&mut self, json: &str) -> Result<()> {
        let path = self.session_dir.join("training_summary.json");
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// In-memory sink for tests and for the determinism property (byte-level
/// comparison of two runs without touching the filesystem).
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    pub periods: Vec<(usize, String)>,
    pub summary: Option<String>,
}

impl AuditSink for MemoryAuditSink {
    fn append_period(&mut self, period_index: usize, json: &str) -> Result<()> {
        if self.periods.iter().any(|(i, _)| *i == period_index) {
            return Err(
                EngineError::Audit(format!("period {} is already recorded", period_index)).into(),
            );
        }
        self.periods.push((period_index, json.to_string()));
        Ok(())
    }

    fn write_summary(&mut self, json: &str) -> Result<()> {
        self.summary = Some(json.to_string());
        Ok(())
    }
}

/// Append-only audit trail: one durable record per period, summary rewritten
/// after every append so a crash never leaves the two inconsistent.
#[derive(Debug)]
pub struct IterationLogger<S: AuditSink> {
    sink: S,
    summary: TrainingSummary,
}

impl<S: AuditSink> IterationLogger<S> {
    pub fn new(sink: S, session_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            sink,
            summary: TrainingSummary {
                session_id,
                started_at,
                finished_at: None,
                iterations: Vec::new(),
                statistics: SummaryStats::from_iterations(&[]),
            },
        }
    }

    pub fn append(&mut self, record: &PeriodRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)
            .map_err(EngineError::from)
            .context("period record serialization")?;
        self.sink.append_period(record.period_index, &json)?;

        self.summary.iterations.push(IterationEntry {
            period: record.period_index,
            date: record.target_date,
            accuracy: record.verification.accuracy,
            hits: record.verification.hits.len(),
        });
        self.summary.statistics = SummaryStats::from_iterations(&self.summary.iterations);
        self.write_summary()?;
        debug!(
            period = record.period_index,
            accuracy = record.verification.accuracy,
            "period record appended"
        );
        Ok(())
    }

    pub fn finalize(&mut self, finished_at: DateTime<Utc>) -> Result<&TrainingSummary> {
        self.summary.finished_at = Some(finished_at);
        self.write_summary()?;
        Ok(&self.summary)
    }

    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn write_summary(&mut self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.summary)
            .map_err(EngineError::from)
            .context("summary serialization")?;
        self.sink.write_summary(&json)
    }
}
