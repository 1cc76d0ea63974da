//! Repositories for the ledger (accounts) and holdings stores

use async_trait::async_trait;
use chrono::Utc;
use common::db::connect_pool;
use common::decimal::{Amount, Quantity};
use common::error::{Error, Result};
use common::model::account::Account;
use common::model::holding::Holding;
use dashmap::DashMap;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

/// Ledger repository trait: one user's cash balance and registration row
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Insert a new account; fails with `AlreadyRegistered` if the login exists
    async fn insert(&self, account: Account) -> Result<Account>;

    /// Get an account by login
    async fn find_by_login(&self, login: &str) -> Result<Option<Account>>;

    /// Get an account by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// Persist a new balance for an account
    async fn update_balance(&self, id: Uuid, balance: Amount) -> Result<()>;
}

/// Holdings repository trait: (account, instrument) -> quantity owned
#[async_trait]
pub trait HoldingsRepository: Send + Sync {
    /// Get a holding by account and instrument name
    async fn find_by_name(&self, account_id: Uuid, instrument_name: &str) -> Result<Option<Holding>>;

    /// Get all holdings for an account, in storage order
    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Holding>>;

    /// Create or update a holding
    async fn upsert(&self, holding: Holding) -> Result<Holding>;
}

/// In-memory ledger repository
pub struct InMemoryLedgerRepository {
    /// Accounts by login
    pub accounts: DashMap<String, Account>,
}

impl InMemoryLedgerRepository {
    /// Create a new in-memory ledger repository
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }
}

impl Default for InMemoryLedgerRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedgerRepository {
    async fn insert(&self, account: Account) -> Result<Account> {
        if self.accounts.contains_key(&account.login) {
            return Err(Error::AlreadyRegistered(format!(
                "Login already exists: {}",
                account.login
            )));
        }
        self.accounts.insert(account.login.clone(), account.clone());
        Ok(account)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        Ok(self.accounts.get(login).map(|a| a.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .iter()
            .find(|entry| entry.value().id == id)
            .map(|entry| entry.value().clone()))
    }

    async fn update_balance(&self, id: Uuid, balance: Amount) -> Result<()> {
        for mut entry in self.accounts.iter_mut() {
            if entry.value().id == id {
                entry.value_mut().balance = balance;
                return Ok(());
            }
        }
        Err(Error::AccountNotFound(format!("Account not found: {}", id)))
    }
}

/// In-memory holdings repository
pub struct InMemoryHoldingsRepository {
    /// Holdings by (account ID, instrument name)
    pub holdings: DashMap<(Uuid, String), Holding>,
}

impl InMemoryHoldingsRepository {
    /// Create a new in-memory holdings repository
    pub fn new() -> Self {
        Self {
            holdings: DashMap::new(),
        }
    }
}

impl Default for InMemoryHoldingsRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HoldingsRepository for InMemoryHoldingsRepository {
    async fn find_by_name(&self, account_id: Uuid, instrument_name: &str) -> Result<Option<Holding>> {
        Ok(self
            .holdings
            .get(&(account_id, instrument_name.to_string()))
            .map(|h| h.clone()))
    }

    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Holding>> {
        let holdings = self
            .holdings
            .iter()
            .filter_map(|entry| {
                let ((acc_id, _), holding) = entry.pair();
                if *acc_id == account_id {
                    Some(holding.clone())
                } else {
                    None
                }
            })
            .collect();

        Ok(holdings)
    }

    async fn upsert(&self, mut holding: Holding) -> Result<Holding> {
        holding.updated_at = Utc::now();
        let key = (holding.account_id, holding.instrument_name.clone());
        self.holdings.insert(key, holding.clone());
        Ok(holding)
    }
}

/// PostgreSQL ledger repository
pub struct PostgresLedgerRepository {
    /// Database connection pool
    pool: PgPool,
}

impl PostgresLedgerRepository {
    /// Create a new PostgreSQL ledger repository
    pub async fn new(database_url: Option<String>) -> Result<Self> {
        let pool = connect_pool(database_url.as_deref(), 5).await?;
        info!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Create a repository sharing an existing pool
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_account(row: &sqlx::postgres::PgRow) -> Result<Account> {
        let balance_str: String = row.get("balance");
        let balance = balance_str
            .parse::<Amount>()
            .map_err(|e| Error::Internal(format!("Invalid balance format: {}", e)))?;

        Ok(Account {
            id: row.get("id"),
            login: row.get("login"),
            balance,
            registered_at: row.get("registered_at"),
        })
    }
}

#[async_trait]
impl LedgerRepository for PostgresLedgerRepository {
    async fn insert(&self, account: Account) -> Result<Account> {
        debug!("Inserting account into database: {}", account.login);

        let result = sqlx::query(
            "INSERT INTO accounts (id, login, balance, registered_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (login) DO NOTHING",
        )
        .bind(account.id)
        .bind(&account.login)
        .bind(account.balance.to_string())
        .bind(account.registered_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AlreadyRegistered(format!(
                "Login already exists: {}",
                account.login
            )));
        }

        Ok(account)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        debug!("Getting account from database: {}", login);

        let row = sqlx::query(
            "SELECT id, login, balance, registered_at FROM accounts WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        debug!("Getting account from database: {}", id);

        let row = sqlx::query(
            "SELECT id, login, balance, registered_at FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_balance(&self, id: Uuid, balance: Amount) -> Result<()> {
        debug!("Updating balance in database for account: {}", id);

        let result = sqlx::query("UPDATE accounts SET balance = $2 WHERE id = $1")
            .bind(id)
            .bind(balance.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AccountNotFound(format!("Account not found: {}", id)));
        }

        Ok(())
    }
}

/// PostgreSQL holdings repository
pub struct PostgresHoldingsRepository {
    /// Database connection pool
    pool: PgPool,
}

impl PostgresHoldingsRepository {
    /// Create a new PostgreSQL holdings repository
    pub async fn new(database_url: Option<String>) -> Result<Self> {
        let pool = connect_pool(database_url.as_deref(), 5).await?;
        Ok(Self { pool })
    }

    /// Create a repository sharing an existing pool
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_holding(row: &sqlx::postgres::PgRow) -> Result<Holding> {
        let quantity_str: String = row.get("quantity");
        let quantity = quantity_str
            .parse::<Quantity>()
            .map_err(|e| Error::Internal(format!("Invalid quantity format: {}", e)))?;

        Ok(Holding {
            account_id: row.get("account_id"),
            instrument_id: row.get("instrument_id"),
            instrument_name: row.get("instrument_name"),
            quantity,
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl HoldingsRepository for PostgresHoldingsRepository {
    async fn find_by_name(&self, account_id: Uuid, instrument_name: &str) -> Result<Option<Holding>> {
        debug!(
            "Getting holding from database: {} for {}",
            instrument_name, account_id
        );

        let row = sqlx::query(
            "SELECT account_id, instrument_id, instrument_name, quantity, updated_at
             FROM holdings
             WHERE account_id = $1 AND instrument_name = $2",
        )
        .bind(account_id)
        .bind(instrument_name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_holding(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Holding>> {
        debug!("Getting all holdings for account: {}", account_id);

        let rows = sqlx::query(
            "SELECT account_id, instrument_id, instrument_name, quantity, updated_at
             FROM holdings
             WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        let mut holdings = Vec::with_capacity(rows.len());
        for row in rows {
            holdings.push(Self::row_to_holding(&row)?);
        }

        Ok(holdings)
    }

    async fn upsert(&self, mut holding: Holding) -> Result<Holding> {
        debug!(
            "Upserting holding in database: {} {}",
            holding.instrument_name, holding.account_id
        );

        holding.updated_at = Utc::now();

        sqlx::query(
            "INSERT INTO holdings (account_id, instrument_id, instrument_name, quantity, updated_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (account_id, instrument_id)
             DO UPDATE SET quantity = $4, updated_at = $5",
        )
        .bind(holding.account_id)
        .bind(holding.instrument_id)
        .bind(&holding.instrument_name)
        .bind(holding.quantity.to_string())
        .bind(holding.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(holding)
    }
}
