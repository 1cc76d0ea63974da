//! Trade leg requests, receipts, and the saga journal record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Amount, Price, Quantity};
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Market-side buy leg request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct BuyRequest {
    /// Instrument name
    pub instrument_name: String,
    /// Requested quantity, positive
    pub quantity: Quantity,
    /// Price quoted by the caller, checked against the current price
    pub quoted_price: Price,
}

/// Receipt for an executed buy leg
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct BuyReceipt {
    /// Instrument ID
    pub instrument_id: Uuid,
    /// Instrument name
    pub instrument_name: String,
    /// Price the caller quoted
    pub quoted_price: Price,
    /// Current unit price multiplied by quantity
    pub executed_amount: Amount,
    /// Executed quantity
    pub quantity: Quantity,
}

/// Market-side sell leg request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct SellRequest {
    /// Login of the selling account
    pub account_login: String,
    /// Instrument name
    pub instrument_name: String,
    /// Returned quantity, positive
    pub quantity: Quantity,
    /// Price quoted by the caller, checked against the current price
    pub quoted_price: Price,
}

/// Report for an executed sell leg
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct SellReport {
    /// Instrument ID
    pub instrument_id: Uuid,
    /// Login of the selling account
    pub account_login: String,
    /// Instrument name
    pub instrument_name: String,
    /// Unit price the sale executed at (the current market price)
    pub sold_price: Price,
    /// Quantity sold
    pub sold_count: Quantity,
}

/// Which leg of a trade the account side is driving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub enum TradeSide {
    /// Buying from the market
    Buy,
    /// Selling back to the market
    Sell,
}

impl TradeSide {
    /// Stable string form used by the journal store
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(TradeSide::Buy),
            "SELL" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

/// Saga state of a trade record
///
/// Forward order is Started -> LocalCommitted -> RemoteCommitted. A failure
/// after the local commit runs the compensating action and lands on
/// Compensated. Records found in Started or LocalCommitted after a crash
/// are compensated on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub enum TradeState {
    /// Journal record written, no mutation yet
    Started,
    /// Local leg committed (balance debited or holding decremented)
    LocalCommitted,
    /// Remote leg committed and local state reconciled
    RemoteCommitted,
    /// Local leg reversed after a remote failure
    Compensated,
}

impl TradeState {
    /// Stable string form used by the journal store
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeState::Started => "STARTED",
            TradeState::LocalCommitted => "LOCAL_COMMITTED",
            TradeState::RemoteCommitted => "REMOTE_COMMITTED",
            TradeState::Compensated => "COMPENSATED",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STARTED" => Some(TradeState::Started),
            "LOCAL_COMMITTED" => Some(TradeState::LocalCommitted),
            "REMOTE_COMMITTED" => Some(TradeState::RemoteCommitted),
            "COMPENSATED" => Some(TradeState::Compensated),
            _ => None,
        }
    }

    /// True for states a crash recovery pass must compensate
    pub fn is_pending(&self) -> bool {
        matches!(self, TradeState::Started | TradeState::LocalCommitted)
    }
}

/// Short-lived journal record for one trade, persisted so that a crash
/// mid-trade can be recovered or compensated on restart
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct TradeRecord {
    /// Unique trade ID
    pub id: Uuid,
    /// Account driving the trade
    pub account_id: Uuid,
    /// Buy or sell
    pub side: TradeSide,
    /// Instrument name
    pub instrument_name: String,
    /// Quantity traded
    pub quantity: Quantity,
    /// Price the caller quoted
    pub quoted_price: Price,
    /// Saga state
    pub state: TradeState,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last state transition timestamp
    pub updated_at: DateTime<Utc>,
}

impl TradeRecord {
    /// Create a journal record in the Started state
    pub fn started(
        account_id: Uuid,
        side: TradeSide,
        instrument_name: String,
        quantity: Quantity,
        quoted_price: Price,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            side,
            instrument_name,
            quantity,
            quoted_price,
            state: TradeState::Started,
            created_at: now,
            updated_at: now,
        }
    }
}
