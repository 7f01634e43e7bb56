use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::signal::SignalKind;
use crate::strategy::cross_group::BackfillOrder;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub game: GameConfig,
    pub signals: SignalConfig,
    pub groups: Vec<GroupRange>,
    pub priors: BTreeMap<SignalKind, f64>,
    pub selection: SelectionConfig,
    pub optimizer: OptimizerConfig,
    pub trainer: TrainerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GameConfig {
    /// Universe is the integers `1..=universe`.
    pub universe: u8,
    /// Members realized per draw.
    pub draw_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    pub freq_window: usize,
    pub momentum_window: usize,
    pub momentum_smooth: usize,
    pub trend_window: usize,
    pub neighbors_k: usize,
    pub recurrence_window: usize,
    pub recurrence_epochs: usize,
    pub ensemble_trees: usize,
    pub ensemble_rounds: usize,
    pub ensemble_subsample: f64,
    pub ensemble_seed: u64,
    /// Substitute for a single-class training window where the member never occurred.
    pub fallback_cold: f64,
    /// Substitute for a single-class training window where the member always occurred.
    pub fallback_hot: f64,
}

/// One contiguous sub-range of the universe. Group definitions are immutable;
/// only the per-group weight vector evolves across training periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GroupRange {
    pub id: u8,
    pub lo: u8,
    pub hi: u8,
}

impl GroupRange {
    pub fn contains(&self, member: u8) -> bool {
        member >= self.lo && member <= self.hi
    }

    pub fn members(&self) -> impl Iterator<Item = u8> {
        self.lo..=self.hi
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    /// Forced top-K per group, regardless of how flat the scores are.
    pub picks_per_group: usize,
    pub max_per_group: usize,
    pub target_min: usize,
    pub target_max: usize,
    pub backfill: BackfillOrder,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OptimizerConfig {
    pub learning_rate: f64,
    pub observation_window: usize,
    pub baseline_accuracy: f64,
    pub hysteresis: f64,
    pub max_step: f64,
    pub weight_min: f64,
    pub weight_max: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainerConfig {
    pub initial_periods: usize,
    pub data_path: String,
    #[serde(default)]
    pub weights_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_path(Path::new("config/default.toml"))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config = Self::parse_toml(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if let Ok(dir) = std::env::var("DRAW_LAB_LOG_DIR") {
            config.logging.dir = dir;
        }
        if let Ok(data) = std::env::var("DRAW_LAB_DATA_PATH") {
            config.trainer.data_path = data;
        }
        Ok(config)
    }

    pub fn parse_toml(input: &str) -> Result<Self> {
        let config: Config = toml::from_str(input).context("invalid config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.game.universe == 0 {
            bail!("game.universe must be > 0");
        }
        if self.game.draw_size == 0 || self.game.draw_size > self.game.universe as usize {
            bail!(
                "game.draw_size must be in 1..={}, got {}",
                self.game.universe,
                self.game.draw_size
            );
        }

        if self.groups.is_empty() {
            bail!("at least one group is required");
        }
        // u16 cursor: the last group may end at u8::MAX, so `hi + 1` must not
        // be computed in u8.
        let mut expected_lo = 1u16;
        for group in &self.groups {
            if u16::from(group.lo) != expected_lo {
                bail!(
                    "group {} starts at {}, expected {} (groups must be contiguous and cover the universe)",
                    group.id,
                    group.lo,
                    expected_lo
                );
            }
            if group.hi < group.lo {
                bail!("group {} has hi {} < lo {}", group.id, group.hi, group.lo);
            }
            expected_lo = u16::from(group.hi) + 1;
        }
        let last = self.groups[self.groups.len() - 1];
        if last.hi != self.game.universe {
            bail!(
                "groups end at {}, expected {} (groups must cover the universe)",
                last.hi,
                self.game.universe
            );
        }
        let mut ids: Vec<u8> = self.groups.iter().map(|g| g.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.groups.len() {
            bail!("group ids must be unique");
        }

        if self.selection.picks_per_group == 0 {
            bail!("selection.picks_per_group must be > 0");
        }
        if self.selection.max_per_group == 0 {
            bail!("selection.max_per_group must be > 0");
        }
        if self.selection.target_min > self.selection.target_max {
            bail!(
                "selection.target_min {} > target_max {}",
                self.selection.target_min,
                self.selection.target_max
            );
        }
        let pool = self.selection.picks_per_group * self.groups.len();
        if self.selection.target_max > pool {
            bail!(
                "selection.target_max {} exceeds the candidate pool of {} ({} groups x {} picks)",
                self.selection.target_max,
                pool,
                self.groups.len(),
                self.selection.picks_per_group
            );
        }

        for (kind, prior) in &self.priors {
            if !prior.is_finite() || *prior <= 0.0 {
                bail!("priors.{} must be a positive number, got {}", kind, prior);
            }
        }

        let opt = &self.optimizer;
        if opt.observation_window == 0 {
            bail!("optimizer.observation_window must be > 0");
        }
        if opt.learning_rate <= 0.0 || !opt.learning_rate.is_finite() {
            bail!("optimizer.learning_rate must be > 0");
        }
        if opt.hysteresis < 0.0 {
            bail!("optimizer.hysteresis must be >= 0");
        }
        if opt.max_step <= 0.0 {
            bail!("optimizer.max_step must be > 0");
        }
        if opt.weight_min <= 0.0 || opt.weight_min > opt.weight_max {
            bail!(
                "optimizer weight band [{}, {}] is invalid",
                opt.weight_min,
                opt.weight_max
            );
        }

        if self.trainer.initial_periods == 0 {
            bail!("trainer.initial_periods must be > 0");
        }
        if !(0.0..=1.0).contains(&self.signals.ensemble_subsample) {
            bail!("signals.ensemble_subsample must be within [0, 1]");
        }
        Ok(())
    }

    pub fn group_of(&self, member: u8) -> Option<&GroupRange> {
        self.groups.iter().find(|g| g.contains(member))
    }

    /// The reference 39/5 four-group configuration, used by the binary when no
    /// config file exists and by integration tests.
    pub fn reference() -> Self {
        Self {
            game: GameConfig {
                universe: 39,
                draw_size: 5,
            },
            signals: SignalConfig {
                freq_window: 100,
                momentum_window: 14,
                momentum_smooth: 5,
                trend_window: 75,
                neighbors_k: 5,
                recurrence_window: 200,
                recurrence_epochs: 200,
                ensemble_trees: 30,
                ensemble_rounds: 30,
                ensemble_subsample: 0.7,
                ensemble_seed: 42,
                fallback_cold: 0.5,
                fallback_hot: 0.85,
            },
            groups: vec![
                GroupRange { id: 1, lo: 1, hi: 10 },
                GroupRange { id: 2, lo: 11, hi: 20 },
                GroupRange { id: 3, lo: 21, hi: 30 },
                GroupRange { id: 4, lo: 31, hi: 39 },
            ],
            priors: SignalKind::ALL
                .iter()
                .map(|kind| (*kind, kind.reference_prior()))
                .collect(),
            selection: SelectionConfig {
                picks_per_group: 2,
                max_per_group: 2,
                target_min: 6,
                target_max: 7,
                backfill: BackfillOrder::CombinedScore,
            },
            optimizer: OptimizerConfig {
                learning_rate: 0.4,
                observation_window: 3,
                baseline_accuracy: 0.15,
                hysteresis: 0.05,
                max_step: 0.10,
                weight_min: 0.2,
                weight_max: 3.0,
            },
            trainer: TrainerConfig {
                initial_periods: 30,
                data_path: "data/history.csv".to_string(),
                weights_path: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                dir: "logs/iterations".to_string(),
            },
        }
    }
}
