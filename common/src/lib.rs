//! Common types and utilities for the settlement engine
//!
//! This library contains shared types, utilities, and abstractions used by
//! both settlement services. It provides a unified approach to error
//! handling, database access, domain models, and the inter-service
//! settlement contract.

pub mod error;
pub mod model;
pub mod decimal;
pub mod settlement;
pub mod sync;
pub mod db;

/// Re-export important types
pub use error::{Error, Result, ErrorExt};
pub use decimal::*;
pub use settlement::MarketSettlement;
pub use sync::KeyedMutex;

// Re-export utoipa for use in model ToSchema derives
#[cfg(feature = "utoipa")]
pub use utoipa;
