//! Service errors

use crate::transport::TransportError;

/// Errors that can occur in Depot operations
#[derive(Debug)]
pub enum DepotError {
    /// Unknown share code (or other keyed record)
    NotFound(String),
    /// Actor is neither the owner nor an operator
    Unauthorized,
    /// Share code generation gave up after this many collisions
    Exhausted { attempts: u32 },
    /// Invalid input provided
    InvalidInput(String),
    /// Database error
    Database(String),
    /// Transport error
    Transport(String),
    /// Service is not running
    NotRunning,
}

impl std::fmt::Display for DepotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepotError::NotFound(e) => write!(f, "not found: {}", e),
            DepotError::Unauthorized => write!(f, "not the owner or an operator"),
            DepotError::Exhausted { attempts } => {
                write!(f, "no free share code after {} attempts", attempts)
            }
            DepotError::InvalidInput(e) => write!(f, "invalid input: {}", e),
            DepotError::Database(e) => write!(f, "database error: {}", e),
            DepotError::Transport(e) => write!(f, "transport error: {}", e),
            DepotError::NotRunning => write!(f, "depot is not running"),
        }
    }
}

impl std::error::Error for DepotError {}

impl From<rusqlite::Error> for DepotError {
    fn from(e: rusqlite::Error) -> Self {
        DepotError::Database(e.to_string())
    }
}

impl From<TransportError> for DepotError {
    fn from(e: TransportError) -> Self {
        DepotError::Transport(e.to_string())
    }
}

impl From<ConfigError> for DepotError {
    fn from(e: ConfigError) -> Self {
        DepotError::InvalidInput(e.to_string())
    }
}

impl From<crate::data::StartError> for DepotError {
    fn from(e: crate::data::StartError) -> Self {
        DepotError::Database(e.to_string())
    }
}

/// Invalid configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required option is missing
    Missing(&'static str),
    /// An option has an unusable value
    Invalid { option: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(option) => write!(f, "missing required option: {}", option),
            ConfigError::Invalid { option, reason } => {
                write!(f, "invalid value for {}: {}", option, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
