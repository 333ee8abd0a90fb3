//! Error handling for wavefeed
//!
//! This module defines the crate error type and a Result alias used
//! throughout the feed pipeline.

use thiserror::Error;

/// Main error type for wavefeed operations
#[derive(Error, Debug)]
pub enum FeedError {
    /// Non-recoverable connection or session error from a packet source
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed subscription or channel selector
    #[error("selector error: {0}")]
    Selector(String),

    /// Errors related to configuration loading/saving
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for wavefeed operations
pub type Result<T> = std::result::Result<T, FeedError>;
