//! Market settlement service: owns the instrument inventory and price

pub mod service;
pub mod repository;
pub mod config;

pub use service::MarketService;
pub use service::RepositoryType;
pub use repository::{InventoryRepository, InMemoryInventoryRepository, PostgresInventoryRepository};
pub use config::MarketServiceConfig;
