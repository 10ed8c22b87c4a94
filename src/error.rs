//! Error types for the cluster router.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouterError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<sqlx::Error> for RouterError {
    fn from(err: sqlx::Error) -> Self {
        RouterError::Database(err.to_string())
    }
}

impl From<config::ConfigError> for RouterError {
    fn from(err: config::ConfigError) -> Self {
        RouterError::Configuration(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RouterError {
    fn from(err: tokio::task::JoinError) -> Self {
        RouterError::Worker(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
