//! Error types for the settlement engine
//!
//! This module provides a unified error handling system for both settlement
//! services. Every user-visible failure maps to a distinct, stable kind so
//! callers can branch on it; no partial success is ever reported as success.

use std::fmt::Display;
use thiserror::Error;

/// Settlement engine error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error when an account cannot be found by login or id
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Error when a login is registered a second time
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    /// Malformed request: non-positive amounts, negative deltas, missing holding
    #[error("Illegal request: {0}")]
    IllegalRequest(String),

    /// Error when an account balance cannot cover a buy
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Error when a holding cannot cover a sell
    #[error("Insufficient holdings: {0}")]
    InsufficientHoldings(String),

    /// Error when an instrument cannot be found by name
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    /// Error when market inventory cannot cover a buy leg
    #[error("Insufficient inventory: {0}")]
    InsufficientInventory(String),

    /// Error when a quoted price has drifted beyond tolerance
    #[error("Price stale: {0}")]
    PriceStale(String),

    /// Error when the remote leg does not answer within the bound
    #[error("Remote leg timed out: {0}")]
    RemoteTimeout(String),

    /// Cross-service failure: the remote leg rejected or timed out after
    /// the local leg committed. Wraps the underlying reason; the local leg
    /// has been compensated by the time this surfaces.
    #[error("Settlement failed: {0}")]
    SettlementFailed(#[source] Box<Error>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Decimal conversion error
    #[error("Decimal conversion error: {0}")]
    DecimalError(String),
}

impl Error {
    /// Unwrap `SettlementFailed` wrappers down to the originating kind.
    ///
    /// A failed remote leg surfaces as `SettlementFailed(reason)`; callers
    /// that want to branch on the reason (stale price, missing instrument,
    /// timeout) go through here.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::SettlementFailed(inner) => inner.root_cause(),
            other => other,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait to add context to error results
pub trait ErrorExt<T> {
    /// Add context information to an error
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T> ErrorExt<T> for Result<T> {
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        self.map_err(|e| {
            let context = context_fn().to_string();
            match e {
                Error::AccountNotFound(msg) => Error::AccountNotFound(format!("{}: {}", context, msg)),
                Error::AlreadyRegistered(msg) => Error::AlreadyRegistered(format!("{}: {}", context, msg)),
                Error::IllegalRequest(msg) => Error::IllegalRequest(format!("{}: {}", context, msg)),
                Error::InsufficientFunds(msg) => Error::InsufficientFunds(format!("{}: {}", context, msg)),
                Error::InsufficientHoldings(msg) => Error::InsufficientHoldings(format!("{}: {}", context, msg)),
                Error::InstrumentNotFound(msg) => Error::InstrumentNotFound(format!("{}: {}", context, msg)),
                Error::InsufficientInventory(msg) => Error::InsufficientInventory(format!("{}: {}", context, msg)),
                Error::PriceStale(msg) => Error::PriceStale(format!("{}: {}", context, msg)),
                Error::RemoteTimeout(msg) => Error::RemoteTimeout(format!("{}: {}", context, msg)),
                Error::SettlementFailed(inner) => Error::SettlementFailed(inner),
                Error::ConfigurationError(msg) => Error::ConfigurationError(format!("{}: {}", context, msg)),
                Error::Internal(msg) => Error::Internal(format!("{}: {}", context, msg)),
                Error::Database(e) => Error::Database(e),
                Error::Migration(e) => Error::Migration(e),
                Error::Serialization(e) => Error::Serialization(e),
                Error::DecimalError(msg) => Error::DecimalError(format!("{}: {}", context, msg)),
            }
        })
    }
}

/// Convert string messages into an error
impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Internal(message)
    }
}

/// Convert static string references into an error
impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Internal(message.to_string())
    }
}

/// From rust_decimal::Error
impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::DecimalError(err.to_string())
    }
}
