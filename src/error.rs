//! Error handling for msetrack
//!
//! Defines the scraper error taxonomy and establishes a unified Result type
//! using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Core error types for the scrape pipeline
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("notification error: {0}")]
    Notification(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = anyhow::Result<T>;
