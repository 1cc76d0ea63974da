//! Trade saga journal
//!
//! Every orchestrated trade writes a short-lived journal record before its
//! first mutation and advances it through the forward states. A record
//! stuck in `Started` or `LocalCommitted` after a crash marks a trade whose
//! local leg may have committed without the remote leg; the recovery pass
//! compensates it on restart.

use async_trait::async_trait;
use chrono::Utc;
use common::db::connect_pool;
use common::decimal::{Price, Quantity};
use common::error::{Error, Result};
use common::model::trade::{TradeRecord, TradeSide, TradeState};
use dashmap::DashMap;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

/// Journal of in-flight trades
#[async_trait]
pub trait TradeJournal: Send + Sync {
    /// Persist a new journal record
    async fn record(&self, record: &TradeRecord) -> Result<()>;

    /// Advance the state of an existing record
    async fn update_state(&self, id: Uuid, state: TradeState) -> Result<()>;

    /// Records not yet settled or compensated, oldest first
    async fn pending(&self) -> Result<Vec<TradeRecord>>;
}

/// In-memory trade journal
pub struct InMemoryTradeJournal {
    /// Records by trade ID
    pub records: DashMap<Uuid, TradeRecord>,
}

impl InMemoryTradeJournal {
    /// Create a new in-memory journal
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl Default for InMemoryTradeJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TradeJournal for InMemoryTradeJournal {
    async fn record(&self, record: &TradeRecord) -> Result<()> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_state(&self, id: Uuid, state: TradeState) -> Result<()> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| Error::Internal(format!("Unknown trade record: {}", id)))?;
        record.state = state;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<TradeRecord>> {
        let mut pending: Vec<TradeRecord> = self
            .records
            .iter()
            .filter(|entry| entry.value().state.is_pending())
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }
}

/// PostgreSQL trade journal
pub struct PostgresTradeJournal {
    /// Database connection pool
    pool: PgPool,
}

impl PostgresTradeJournal {
    /// Create a new PostgreSQL journal
    pub async fn new(database_url: Option<String>) -> Result<Self> {
        let pool = connect_pool(database_url.as_deref(), 5).await?;
        Ok(Self { pool })
    }

    /// Create a journal sharing an existing pool
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<TradeRecord> {
        let quantity_str: String = row.get("quantity");
        let price_str: String = row.get("quoted_price");
        let side_str: String = row.get("side");
        let state_str: String = row.get("state");

        let quantity = quantity_str
            .parse::<Quantity>()
            .map_err(|e| Error::Internal(format!("Invalid quantity format: {}", e)))?;
        let quoted_price = price_str
            .parse::<Price>()
            .map_err(|e| Error::Internal(format!("Invalid price format: {}", e)))?;
        let side = TradeSide::parse(&side_str)
            .ok_or_else(|| Error::Internal(format!("Invalid trade side: {}", side_str)))?;
        let state = TradeState::parse(&state_str)
            .ok_or_else(|| Error::Internal(format!("Invalid trade state: {}", state_str)))?;

        Ok(TradeRecord {
            id: row.get("id"),
            account_id: row.get("account_id"),
            side,
            instrument_name: row.get("instrument_name"),
            quantity,
            quoted_price,
            state,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl TradeJournal for PostgresTradeJournal {
    async fn record(&self, record: &TradeRecord) -> Result<()> {
        debug!("Recording trade {} ({:?})", record.id, record.side);

        sqlx::query(
            "INSERT INTO trade_journal
             (id, account_id, side, instrument_name, quantity, quoted_price, state, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(record.id)
        .bind(record.account_id)
        .bind(record.side.as_str())
        .bind(&record.instrument_name)
        .bind(record.quantity.to_string())
        .bind(record.quoted_price.to_string())
        .bind(record.state.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_state(&self, id: Uuid, state: TradeState) -> Result<()> {
        debug!("Trade {} -> {}", id, state.as_str());

        let result = sqlx::query(
            "UPDATE trade_journal SET state = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(state.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Internal(format!("Unknown trade record: {}", id)));
        }

        Ok(())
    }

    async fn pending(&self) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query(
            "SELECT id, account_id, side, instrument_name, quantity, quoted_price, state, created_at, updated_at
             FROM trade_journal
             WHERE state IN ('STARTED', 'LOCAL_COMMITTED')
             ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(Self::row_to_record(&row)?);
        }

        Ok(records)
    }
}
