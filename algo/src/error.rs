//! Error types for the backtesting engine

use thiserror::Error;

/// Main error type for algorithm and simulation operations
#[derive(Error, Debug)]
pub enum AlgoError {
    /// No data source was configured before running
    #[error("source not set")]
    SourceNotSet,

    /// No sids were configured before running
    #[error("sids not set")]
    SidsNotSet,

    /// Trading controls rejected the order
    #[error("Risk rejected: {policies:?}")]
    RiskRejected {
        policies: Vec<String>,
    },

    /// Order not found
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// No price has been seen for the sid yet
    #[error("No price available for sid: {0}")]
    PriceUnavailable(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed bar data
    #[error("Data error: {0}")]
    DataError(String),

    /// Risk metric or policy failure
    #[error("Risk error: {0}")]
    Risk(#[from] tickline_risk::RiskError),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("Algorithm error: {0}")]
    Other(String),
}

/// Result type for algorithm operations
pub type AlgoResult<T> = Result<T, AlgoError>;
