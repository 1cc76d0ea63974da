//! Holding models and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Price, Quantity};
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Holding model: the quantity of one instrument owned by one account
///
/// Created on the first buy of an instrument. Quantity never goes negative;
/// a holding with quantity zero remains a valid row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Holding {
    /// Owning account ID
    pub account_id: Uuid,
    /// Instrument ID
    pub instrument_id: Uuid,
    /// Instrument name, denormalized so the account side can resolve a
    /// holding without consulting the market store
    pub instrument_name: String,
    /// Quantity owned
    pub quantity: Quantity,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    /// Create a new holding with zero quantity
    pub fn new(account_id: Uuid, instrument_id: Uuid, instrument_name: String) -> Self {
        Self {
            account_id,
            instrument_id,
            instrument_name,
            quantity: Quantity::ZERO,
            updated_at: Utc::now(),
        }
    }
}

/// Read projection joining a holding with its instrument
///
/// Rows come back in underlying storage order; callers must not assume any
/// particular ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct HoldingView {
    /// Instrument name
    pub instrument_name: String,
    /// Market identifier
    pub market: String,
    /// Current unit price
    pub price: Price,
    /// Quantity owned
    pub quantity: Quantity,
}
