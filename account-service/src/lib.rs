//! Account settlement service: owns user balances, holdings, and the trade saga

pub mod service;
pub mod repository;
pub mod saga;
pub mod config;

pub use service::AccountService;
pub use service::{RepositoryType, SellOutcome};
pub use repository::{
    HoldingsRepository, InMemoryHoldingsRepository, InMemoryLedgerRepository, LedgerRepository,
    PostgresHoldingsRepository, PostgresLedgerRepository,
};
pub use saga::{InMemoryTradeJournal, PostgresTradeJournal, TradeJournal};
pub use config::AccountServiceConfig;
