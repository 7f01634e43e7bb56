pub mod audit;
pub mod config;
pub mod error;
pub mod model;
pub mod optimizer;
pub mod signal;
pub mod strategy;
pub mod trainer;

pub use config::Config;
pub use error::EngineError;
pub use trainer::WalkForwardTrainer;
