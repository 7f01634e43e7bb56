use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use draw_lab::audit::{FsAuditSink, IterationLogger};
use draw_lab::config::Config;
use draw_lab::model::draw::DrawHistory;
use draw_lab::trainer::WalkForwardTrainer;

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        Config::from_path(Path::new(&config_path))?
    } else {
        Config::reference()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if !Path::new(&config_path).exists() {
        warn!(path = %config_path, "config file not found, using reference configuration");
    }

    let history = DrawHistory::load_csv(config.game, Path::new(&config.trainer.data_path))?;
    info!(
        draws = history.len(),
        data_path = %config.trainer.data_path,
        "draw history loaded"
    );

    let started_at = Utc::now();
    let session_id = started_at.format("%Y%m%d_%H%M%S").to_string();
    let sink = FsAuditSink::create(Path::new(&config.logging.dir), &session_id)?;
    info!(session_dir = %sink.session_dir().display(), "audit session created");
    let logger = IterationLogger::new(sink, session_id, started_at);

    let weights_path = config.trainer.weights_path.clone();
    let mut trainer = WalkForwardTrainer::new(config, history, logger)?;
    if let Some(path) = &weights_path {
        if Path::new(path).exists() {
            trainer.load_weights(Path::new(path))?;
        }
    }

    let summary = trainer.run()?;
    if let Some(path) = &weights_path {
        trainer.save_weights(Path::new(path))?;
    }

    info!(
        periods = summary.statistics.total_periods,
        average_accuracy = summary.statistics.average_accuracy,
        best_accuracy = summary.statistics.best_accuracy,
        total_hits = summary.statistics.total_hits,
        "session complete"
    );
    Ok(())
}
