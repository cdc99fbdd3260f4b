//! Guardian error types

use thiserror::Error;

/// Guardian error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A policy document failed to load
    #[error("Policy load error: {0}")]
    PolicyLoad(String),

    /// Ledger append failed; the originating operation must be refused
    #[error("Ledger write error: {0}")]
    LedgerWrite(String),

    /// Ledger chain verification found a break
    #[error("Ledger integrity error: {0}")]
    LedgerIntegrity(String),

    /// Event failed validation before any state change
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Trust Fabric update failed (non-fatal to the originating operation)
    #[error("Learning error: {0}")]
    Learning(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Guardian operations
pub type Result<T> = std::result::Result<T, Error>;
