//! Inter-service settlement contract
//!
//! The Account Settlement Service drives trades through this trait without
//! depending on the market crate. The Market Settlement Service implements
//! it directly for in-process wiring; tests substitute stubs to exercise
//! remote-failure and timeout paths.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::instrument::InstrumentView;
use crate::model::trade::{BuyReceipt, BuyRequest, SellReport, SellRequest};

/// Market-side operations invoked by the account side during a trade
#[async_trait]
pub trait MarketSettlement: Send + Sync {
    /// Execute the market leg of a buy: validate price and inventory,
    /// decrement inventory, return the receipt
    async fn buy_leg(&self, request: BuyRequest) -> Result<BuyReceipt>;

    /// Execute the market leg of a sell: validate price, increment
    /// inventory, return the report
    async fn sell_leg(&self, request: SellRequest) -> Result<SellReport>;

    /// Return inventory to the market after a failed buy reconciliation.
    /// Compensation path only; delta must be non-negative.
    async fn return_inventory(&self, instrument_name: &str, quantity: crate::decimal::Quantity) -> Result<()>;

    /// Market catalog query
    async fn catalog(&self) -> Result<Vec<InstrumentView>>;
}
