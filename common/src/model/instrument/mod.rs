//! Instrument models and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Price, Quantity};
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Instrument model: one tradable listing owned by the market side
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Instrument {
    /// Unique instrument ID
    pub id: Uuid,
    /// Unique instrument name (e.g. "ACME")
    pub name: String,
    /// Market identifier (e.g. "NYSE")
    pub market: String,
    /// Available quantity
    pub quantity: Quantity,
    /// Unit sell price, always positive
    pub price: Price,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Instrument {
    /// Create a new instrument listing
    pub fn new(name: String, market: String, quantity: Quantity, price: Price) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            market,
            quantity,
            price,
            updated_at: Utc::now(),
        }
    }
}

/// Catalog projection of an instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct InstrumentView {
    /// Instrument name
    pub instrument_name: String,
    /// Market identifier
    pub market: String,
    /// Current unit price
    pub price: Price,
    /// Available quantity
    pub quantity: Quantity,
}

impl From<&Instrument> for InstrumentView {
    fn from(instrument: &Instrument) -> Self {
        Self {
            instrument_name: instrument.name.clone(),
            market: instrument.market.clone(),
            price: instrument.price,
            quantity: instrument.quantity,
        }
    }
}
