use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::GameConfig;
use crate::error::EngineError;

/// One dated ground-truth realization: `draw_size` distinct members of the universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub date: NaiveDate,
    pub numbers: Vec<u8>,
}

impl Draw {
    pub fn new(date: NaiveDate, mut numbers: Vec<u8>) -> Self {
        numbers.sort_unstable();
        Self { date, numbers }
    }

    pub fn contains(&self, member: u8) -> bool {
        self.numbers.binary_search(&member).is_ok()
    }
}

/// Full chronological draw history for one game configuration.
///
/// Construction validates the contract every downstream component relies on:
/// dates strictly ascending with no duplicates, every draw of exactly
/// `draw_size` distinct members inside `1..=universe`.
#[derive(Debug, Clone)]
pub struct DrawHistory {
    game: GameConfig,
    draws: Vec<Draw>,
}

impl DrawHistory {
    pub fn new(game: GameConfig, draws: Vec<Draw>) -> Result<Self, EngineError> {
        if draws.is_empty() {
            return Err(EngineError::History("draw history is empty".to_string()));
        }
        for (i, draw) in draws.iter().enumerate() {
            if draw.numbers.len() != game.draw_size {
                return Err(EngineError::History(format!(
                    "draw {} ({}) has {} numbers, expected {}",
                    i,
                    draw.date,
                    draw.numbers.len(),
                    game.draw_size
                )));
            }
            for pair in draw.numbers.windows(2) {
                if pair[0] >= pair[1] {
                    return Err(EngineError::History(format!(
                        "draw {} ({}) has duplicate member {}",
                        i, draw.date, pair[1]
                    )));
                }
            }
            for &n in &draw.numbers {
                if n < 1 || n > game.universe {
                    return Err(EngineError::History(format!(
                        "draw {} ({}) has member {} outside universe 1..={}",
                        i, draw.date, n, game.universe
                    )));
                }
            }
            if i > 0 && draws[i - 1].date >= draw.date {
                return Err(EngineError::History(format!(
                    "draw dates not strictly ascending at index {} ({} then {})",
                    i,
                    draws[i - 1].date,
                    draw.date
                )));
            }
        }
        Ok(Self { game, draws })
    }

    pub fn game(&self) -> &GameConfig {
        &self.game
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn draw(&self, index: usize) -> Option<&Draw> {
        self.draws.get(index)
    }

    /// The trainer's history-freeze primitive: everything strictly before `n`.
    pub fn prefix(&self, n: usize) -> &[Draw] {
        &self.draws[..n.min(self.draws.len())]
    }

    /// Parse `date,n1 n2 n3 n4 n5` lines (one draw per line, `#` comments allowed).
    pub fn from_csv_str(game: GameConfig, input: &str) -> Result<Self> {
        let mut draws = Vec::new();
        for (lineno, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (date_str, numbers_str) = line
                .split_once(',')
                .with_context(|| format!("line {}: expected 'date,numbers'", lineno + 1))?;
            let date: NaiveDate = date_str
                .trim()
                .parse()
                .with_context(|| format!("line {}: invalid date '{}'", lineno + 1, date_str))?;
            let mut numbers = Vec::new();
            for tok in numbers_str.split_whitespace() {
                let n: u8 = tok
                    .parse()
                    .with_context(|| format!("line {}: invalid number '{}'", lineno + 1, tok))?;
                numbers.push(n);
            }
            draws.push(Draw::new(date, numbers));
        }
        Ok(Self::new(game, draws)?)
    }

    pub fn load_csv(game: GameConfig, path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_csv_str(game, &input)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Row-per-draw binary occurrence table, column per universe member.
#[derive(Debug, Clone)]
pub struct OccurrenceMatrix {
    universe: usize,
    rows: Vec<Vec<u8>>,
}

impl OccurrenceMatrix {
    pub fn from_draws(universe: u8, draws: &[Draw]) -> Self {
        let universe = universe as usize;
        let mut rows = Vec::with_capacity(draws.len());
        for draw in draws {
            let mut row = vec![0u8; universe];
            for &n in &draw.numbers {
                row[(n - 1) as usize] = 1;
            }
            rows.push(row);
        }
        Self { universe, rows }
    }

    pub fn universe(&self) -> usize {
        self.universe
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> &[u8] {
        &self.rows[index]
    }

    pub fn last_row(&self) -> Option<&[u8]> {
        self.rows.last().map(Vec::as_slice)
    }

    /// Occurrence series of one member (0-based column index), oldest first.
    pub fn column(&self, member_idx: usize) -> Vec<u8> {
        self.rows.iter().map(|r| r[member_idx]).collect()
    }
}
