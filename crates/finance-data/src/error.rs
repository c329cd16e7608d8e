//! Error types for data collection operations

use crate::model::SourceKind;
use std::time::Duration;
use thiserror::Error;

/// Data collection errors
#[derive(Debug, Error)]
pub enum FinanceError {
    /// The vendor answered, but with something we can't use
    #[error("{vendor} API error: {message}")]
    Api {
        vendor: SourceKind,
        message: String,
    },

    /// Non-success HTTP status from a vendor
    #[error("{vendor} returned HTTP {status}: {body}")]
    Http {
        vendor: SourceKind,
        status: u16,
        body: String,
    },

    /// Invalid ticker symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Start date after end date, or an unparsable date
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable {
        symbol: String,
        reason: String,
    },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded {
        provider: String,
    },

    /// A credential the source needs is not configured
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The coordinator has no adapter registered for this source
    #[error("Source not configured: {0}")]
    SourceNotConfigured(SourceKind),

    /// A source call exceeded its time budget
    #[error("{vendor} timed out after {after:?}")]
    Timeout {
        vendor: SourceKind,
        after: Duration,
    },

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    Yahoo(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FinanceError {
    /// Whether retrying the same call could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FinanceError::Network(_)
            | FinanceError::Timeout { .. }
            | FinanceError::RateLimitExceeded { .. } => true,
            FinanceError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for data collection operations
pub type Result<T> = std::result::Result<T, FinanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FinanceError::InvalidSymbol("??".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: ??");

        let err = FinanceError::DataUnavailable {
            symbol: "AAPL".to_string(),
            reason: "No data found".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for AAPL: No data found");

        let err = FinanceError::Http {
            vendor: SourceKind::Finnhub,
            status: 401,
            body: "Invalid API key".to_string(),
        };
        assert_eq!(err.to_string(), "finnhub returned HTTP 401: Invalid API key");
    }

    #[test]
    fn test_retryable_classification() {
        let server_error = FinanceError::Http {
            vendor: SourceKind::SecEdgar,
            status: 503,
            body: String::new(),
        };
        let client_error = FinanceError::Http {
            vendor: SourceKind::SecEdgar,
            status: 404,
            body: String::new(),
        };

        assert!(server_error.is_retryable());
        assert!(!client_error.is_retryable());
        assert!(
            FinanceError::RateLimitExceeded {
                provider: "reddit".to_string()
            }
            .is_retryable()
        );
        assert!(
            FinanceError::Timeout {
                vendor: SourceKind::Yahoo,
                after: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(!FinanceError::MissingCredential("FINNHUB_API_KEY".to_string()).is_retryable());
        assert!(!FinanceError::InvalidSymbol("x".to_string()).is_retryable());
    }
}
