//! Market settlement service implementation
//!
//! Owns the instrument inventory and the authoritative price. Every
//! mutation of one instrument is serialized behind a per-name lock and
//! persisted before the call returns; there are no speculative writes.

use std::sync::Arc;

use async_trait::async_trait;
use common::decimal::{prices_agree, Price, Quantity};
use common::error::{Error, ErrorExt, Result};
use common::model::instrument::{Instrument, InstrumentView};
use common::model::trade::{BuyReceipt, BuyRequest, SellReport, SellRequest};
use common::settlement::MarketSettlement;
use common::sync::KeyedMutex;
use tracing::{debug, info};

use crate::repository::{
    InMemoryInventoryRepository, InventoryRepository, PostgresInventoryRepository,
};

/// Market settlement service
pub struct MarketService {
    /// Repository for instrument data
    repo: Arc<dyn InventoryRepository>,
    /// Per-instrument serialization of inventory mutations
    locks: KeyedMutex,
}

/// Repository Type
pub enum RepositoryType {
    /// In-memory repository
    InMemory,
    /// PostgreSQL repository
    Postgres(Option<String>),
}

impl MarketService {
    /// Create a new market service backed by the in-memory repository
    pub fn new() -> Self {
        Self {
            repo: Arc::new(InMemoryInventoryRepository::new()),
            locks: KeyedMutex::new(),
        }
    }

    /// Create a new market service with a specific repository type
    pub async fn with_repository(repo_type: RepositoryType) -> Result<Self> {
        let repo: Arc<dyn InventoryRepository> = match repo_type {
            RepositoryType::InMemory => Arc::new(InMemoryInventoryRepository::new()),
            RepositoryType::Postgres(database_url) => {
                Arc::new(PostgresInventoryRepository::new(database_url).await?)
            }
        };

        Ok(Self {
            repo,
            locks: KeyedMutex::new(),
        })
    }

    /// Create a new market service with a configuration
    pub async fn with_config(config: &crate::config::MarketServiceConfig) -> Result<Self> {
        let repo: Arc<dyn InventoryRepository> =
            Arc::new(PostgresInventoryRepository::with_config(config).await?);

        Ok(Self {
            repo,
            locks: KeyedMutex::new(),
        })
    }

    /// List a new instrument (administrative operation)
    pub async fn add_instrument(
        &self,
        name: &str,
        market: &str,
        quantity: Quantity,
        price: Price,
    ) -> Result<Instrument> {
        if price <= Price::ZERO {
            return Err(Error::IllegalRequest(
                "Instrument price must be positive".to_string(),
            ));
        }
        if quantity < Quantity::ZERO {
            return Err(Error::IllegalRequest(
                "Instrument quantity can't be negative".to_string(),
            ));
        }

        info!("Listing instrument {} on {}", name, market);

        let _guard = self.locks.lock(name).await;
        if self.repo.find_by_name(name).await?.is_some() {
            return Err(Error::IllegalRequest(format!(
                "Instrument already listed: {}",
                name
            )));
        }

        self.repo
            .insert(Instrument::new(
                name.to_string(),
                market.to_string(),
                quantity,
                price,
            ))
            .await
            .with_context(|| format!("Failed to list instrument {}", name))
    }

    /// Add inventory to an existing instrument
    pub async fn update_inventory_count(&self, name: &str, delta: Quantity) -> Result<Instrument> {
        if delta < Quantity::ZERO {
            return Err(Error::IllegalRequest(
                "Inventory delta can't be negative".to_string(),
            ));
        }

        let _guard = self.locks.lock(name).await;
        let mut instrument = self.require_instrument(name).await?;

        instrument.quantity += delta;
        debug!("Inventory for {} now {}", name, instrument.quantity);
        self.repo
            .update(instrument)
            .await
            .with_context(|| format!("Failed to update inventory for {}", name))
    }

    /// Overwrite the unit price of an instrument
    ///
    /// This operation is the price authority the staleness checks compare
    /// against, so it carries no staleness check itself.
    pub async fn update_price(&self, name: &str, new_price: Price) -> Result<Instrument> {
        if new_price <= Price::ZERO {
            return Err(Error::IllegalRequest(
                "Instrument price must be positive".to_string(),
            ));
        }

        let _guard = self.locks.lock(name).await;
        let mut instrument = self.require_instrument(name).await?;

        info!("Price for {} moves {} -> {}", name, instrument.price, new_price);
        instrument.price = new_price;
        self.repo
            .update(instrument)
            .await
            .with_context(|| format!("Failed to update price for {}", name))
    }

    /// Market catalog listing
    pub async fn list_instruments(&self) -> Result<Vec<InstrumentView>> {
        let instruments = self
            .repo
            .list()
            .await
            .with_context(|| "Failed to list instruments")?;
        Ok(instruments.iter().map(InstrumentView::from).collect())
    }

    /// Get a single instrument by name
    pub async fn get_instrument(&self, name: &str) -> Result<Option<Instrument>> {
        self.repo.find_by_name(name).await
    }

    async fn require_instrument(&self, name: &str) -> Result<Instrument> {
        self.repo
            .find_by_name(name)
            .await
            .with_context(|| format!("Failed to retrieve instrument {}", name))?
            .ok_or_else(|| Error::InstrumentNotFound(format!("Instrument does not exist: {}", name)))
    }
}

impl Default for MarketService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketSettlement for MarketService {
    /// Execute the market leg of a buy
    async fn buy_leg(&self, request: BuyRequest) -> Result<BuyReceipt> {
        if request.quantity <= Quantity::ZERO {
            return Err(Error::IllegalRequest(
                "Buy quantity must be positive".to_string(),
            ));
        }

        let _guard = self.locks.lock(&request.instrument_name).await;
        let mut instrument = self.require_instrument(&request.instrument_name).await?;

        if instrument.quantity < request.quantity {
            return Err(Error::InsufficientInventory(format!(
                "Not enough shares of {}. Available: {}. Requested: {}",
                request.instrument_name, instrument.quantity, request.quantity
            )));
        }

        if !prices_agree(instrument.price, request.quoted_price) {
            return Err(Error::PriceStale(format!(
                "Price for {} has changed. Current price is {}",
                request.instrument_name, instrument.price
            )));
        }

        instrument.quantity -= request.quantity;
        let instrument = self
            .repo
            .update(instrument)
            .await
            .with_context(|| format!("Failed to persist buy leg for {}", request.instrument_name))?;

        info!(
            "Buy leg executed: {} x {} at {}",
            request.quantity, request.instrument_name, instrument.price
        );

        Ok(BuyReceipt {
            instrument_id: instrument.id,
            instrument_name: instrument.name,
            quoted_price: request.quoted_price,
            executed_amount: instrument.price * request.quantity,
            quantity: request.quantity,
        })
    }

    /// Execute the market leg of a sell
    ///
    /// The staleness check has the same polarity as the buy leg: the quote
    /// must agree with the current price within tolerance, otherwise the
    /// sale is rejected.
    async fn sell_leg(&self, request: SellRequest) -> Result<SellReport> {
        if request.quantity <= Quantity::ZERO {
            return Err(Error::IllegalRequest(
                "Sell quantity must be positive".to_string(),
            ));
        }

        let _guard = self.locks.lock(&request.instrument_name).await;
        let mut instrument = self.require_instrument(&request.instrument_name).await?;

        if !prices_agree(instrument.price, request.quoted_price) {
            return Err(Error::PriceStale(format!(
                "Price for {} has changed. Current price is {}",
                request.instrument_name, instrument.price
            )));
        }

        instrument.quantity += request.quantity;
        let instrument = self
            .repo
            .update(instrument)
            .await
            .with_context(|| format!("Failed to persist sell leg for {}", request.instrument_name))?;

        info!(
            "Sell leg executed: {} x {} at {} for {}",
            request.quantity, request.instrument_name, instrument.price, request.account_login
        );

        Ok(SellReport {
            instrument_id: instrument.id,
            account_login: request.account_login,
            instrument_name: instrument.name,
            sold_price: instrument.price,
            sold_count: request.quantity,
        })
    }

    /// Return inventory after a failed buy reconciliation (compensation)
    async fn return_inventory(&self, instrument_name: &str, quantity: Quantity) -> Result<()> {
        self.update_inventory_count(instrument_name, quantity)
            .await?;
        Ok(())
    }

    /// Market catalog query
    async fn catalog(&self) -> Result<Vec<InstrumentView>> {
        self.list_instruments().await
    }
}
