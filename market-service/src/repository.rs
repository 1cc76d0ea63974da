//! Repository for instrument inventory data

use async_trait::async_trait;
use chrono::Utc;
use common::db::connect_pool;
use common::decimal::{Price, Quantity};
use common::error::{Error, Result};
use common::model::instrument::Instrument;
use dashmap::DashMap;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

/// Inventory repository trait defining the interface for instrument storage
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Insert a new instrument; fails if the name is already listed
    async fn insert(&self, instrument: Instrument) -> Result<Instrument>;

    /// Get an instrument by name
    async fn find_by_name(&self, name: &str) -> Result<Option<Instrument>>;

    /// List all instruments in storage order
    async fn list(&self) -> Result<Vec<Instrument>>;

    /// Persist an updated instrument
    async fn update(&self, instrument: Instrument) -> Result<Instrument>;
}

/// In-memory repository for instrument data
pub struct InMemoryInventoryRepository {
    /// Instruments by name
    pub instruments: DashMap<String, Instrument>,
}

impl InMemoryInventoryRepository {
    /// Create a new in-memory inventory repository
    pub fn new() -> Self {
        Self {
            instruments: DashMap::new(),
        }
    }
}

impl Default for InMemoryInventoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn insert(&self, instrument: Instrument) -> Result<Instrument> {
        if self.instruments.contains_key(&instrument.name) {
            return Err(Error::IllegalRequest(format!(
                "Instrument already listed: {}",
                instrument.name
            )));
        }
        self.instruments
            .insert(instrument.name.clone(), instrument.clone());
        Ok(instrument)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Instrument>> {
        Ok(self.instruments.get(name).map(|i| i.clone()))
    }

    async fn list(&self) -> Result<Vec<Instrument>> {
        Ok(self
            .instruments
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update(&self, mut instrument: Instrument) -> Result<Instrument> {
        instrument.updated_at = Utc::now();
        self.instruments
            .insert(instrument.name.clone(), instrument.clone());
        Ok(instrument)
    }
}

/// PostgreSQL repository for instrument data
pub struct PostgresInventoryRepository {
    /// Database connection pool
    pool: PgPool,
}

impl PostgresInventoryRepository {
    /// Create a new PostgreSQL inventory repository
    pub async fn new(database_url: Option<String>) -> Result<Self> {
        let pool = connect_pool(database_url.as_deref(), 5).await?;
        info!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Create a repository over an existing connection pool
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new PostgreSQL inventory repository with configuration
    pub async fn with_config(config: &crate::config::MarketServiceConfig) -> Result<Self> {
        info!(
            "Connecting to PostgreSQL database with pool size: {}",
            config.db_pool_size
        );
        let pool = connect_pool(Some(&config.database_url), config.db_pool_size).await?;
        info!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    fn row_to_instrument(row: &sqlx::postgres::PgRow) -> Result<Instrument> {
        let quantity_str: String = row.get("quantity");
        let price_str: String = row.get("price");

        let quantity = quantity_str
            .parse::<Quantity>()
            .map_err(|e| Error::Internal(format!("Invalid quantity format: {}", e)))?;
        let price = price_str
            .parse::<Price>()
            .map_err(|e| Error::Internal(format!("Invalid price format: {}", e)))?;

        Ok(Instrument {
            id: row.get("id"),
            name: row.get("name"),
            market: row.get("market"),
            quantity,
            price,
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl InventoryRepository for PostgresInventoryRepository {
    async fn insert(&self, instrument: Instrument) -> Result<Instrument> {
        debug!("Inserting instrument into database: {}", instrument.name);

        let result = sqlx::query(
            "INSERT INTO instruments (id, name, market, quantity, price, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(instrument.id)
        .bind(&instrument.name)
        .bind(&instrument.market)
        .bind(instrument.quantity.to_string())
        .bind(instrument.price.to_string())
        .bind(instrument.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::IllegalRequest(format!(
                "Instrument already listed: {}",
                instrument.name
            )));
        }

        Ok(instrument)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Instrument>> {
        debug!("Getting instrument from database: {}", name);

        let row = sqlx::query(
            "SELECT id, name, market, quantity, price, updated_at
             FROM instruments
             WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_instrument(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Instrument>> {
        debug!("Listing all instruments");

        let rows = sqlx::query(
            "SELECT id, name, market, quantity, price, updated_at FROM instruments",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut instruments = Vec::with_capacity(rows.len());
        for row in rows {
            instruments.push(Self::row_to_instrument(&row)?);
        }

        Ok(instruments)
    }

    async fn update(&self, mut instrument: Instrument) -> Result<Instrument> {
        debug!("Updating instrument in database: {}", instrument.name);

        instrument.updated_at = Utc::now();

        let result = sqlx::query(
            "UPDATE instruments
             SET market = $2, quantity = $3, price = $4, updated_at = $5
             WHERE id = $1",
        )
        .bind(instrument.id)
        .bind(&instrument.market)
        .bind(instrument.quantity.to_string())
        .bind(instrument.price.to_string())
        .bind(instrument.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Internal(format!(
                "Failed to update instrument: {}",
                instrument.name
            )));
        }

        Ok(instrument)
    }
}
