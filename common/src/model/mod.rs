//! Domain models shared by the settlement services

pub mod account;
pub mod holding;
pub mod instrument;
pub mod trade;

pub use account::{Account, AccountInfo};
pub use holding::{Holding, HoldingView};
pub use instrument::{Instrument, InstrumentView};
pub use trade::{BuyReceipt, BuyRequest, SellReport, SellRequest, TradeRecord, TradeSide, TradeState};
