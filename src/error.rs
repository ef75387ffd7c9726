use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalystError {
    #[error("Planning error: {0}")]
    Planning(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Safety violation: {0}")]
    Safety(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, AnalystError>;
