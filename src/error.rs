use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("history error: {0}")]
    History(String),

    #[error("insufficient history: trainer needs at least {required} draws, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("audit log error: {0}")]
    Audit(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
