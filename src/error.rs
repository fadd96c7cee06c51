//! Error types for the finance ledger.
//!
//! Engine and storage code return [`FinanceError`]; the binaries and the
//! terminal UI wrap it in `anyhow`.

use rust_decimal::Decimal;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, FinanceError>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum FinanceError {
    /// Amount was zero, negative or otherwise unusable
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Category set violates the weighting rules
    #[error("invalid categories: {0}")]
    InvalidCategories(String),

    /// Category key does not exist in the current configuration
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// Locked categories cannot be rebalanced
    #[error("category {0} is locked")]
    LockedCategory(String),

    /// Record lookup failed
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Generic validation failure on user input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Import document rejected
    #[error("invalid import file: {0}")]
    InvalidImport(String),

    /// Chat completion endpoint failed or is not configured
    #[error("oracle error: {0}")]
    Oracle(String),

    /// Remote replay failed
    #[error("sync error: {0}")]
    Sync(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl FinanceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Transient failures that a later attempt may get past.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.status().map_or(true, |s| s.is_server_error()),
            Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            Self::Sync(_) | Self::Oracle(_) => true,
            _ => false,
        }
    }
}
