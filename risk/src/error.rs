//! Error types for trading controls and risk metrics

use thiserror::Error;

/// Errors that can occur while loading policies or computing metrics
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in calculation: {0}")]
    DivisionByZero(String),

    #[error("Failed to parse YAML policy: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON policy: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RiskResult<T> = std::result::Result<T, RiskError>;
