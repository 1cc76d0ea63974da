//! Account settlement service implementation
//!
//! Owns the ledger and holdings stores and orchestrates the two-leg trade
//! saga against the market side. Every mutation inside a trade is an
//! awaited step; all mutations for one account are serialized behind a
//! per-login lock held across the whole trade, including the remote leg,
//! so two concurrent trades on one account cannot double-spend.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::decimal::{Amount, Price, Quantity};
use common::error::{Error, ErrorExt, Result};
use common::model::account::{Account, AccountInfo};
use common::model::holding::{Holding, HoldingView};
use common::model::instrument::InstrumentView;
use common::model::trade::{BuyRequest, SellRequest, TradeRecord, TradeSide, TradeState};
use common::settlement::MarketSettlement;
use common::sync::KeyedMutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::repository::{
    HoldingsRepository, InMemoryHoldingsRepository, InMemoryLedgerRepository, LedgerRepository,
    PostgresHoldingsRepository, PostgresLedgerRepository,
};
use crate::saga::{InMemoryTradeJournal, PostgresTradeJournal, TradeJournal};

/// Default bound on remote leg calls
const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Account settlement service
pub struct AccountService {
    /// Ledger store: cash balances and registration rows
    ledger: Arc<dyn LedgerRepository>,
    /// Holdings store: per-account instrument quantities
    holdings: Arc<dyn HoldingsRepository>,
    /// Saga journal for in-flight trades
    journal: Arc<dyn TradeJournal>,
    /// Market side of the settlement protocol
    market: Arc<dyn MarketSettlement>,
    /// Per-account serialization of trades and balance mutations
    account_locks: KeyedMutex,
    /// Bound on each remote leg call
    remote_timeout: Duration,
}

/// Repository Type
pub enum RepositoryType {
    /// In-memory repositories
    InMemory,
    /// PostgreSQL repositories
    Postgres(Option<String>),
}

/// Outcome of an orchestrated sell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellOutcome {
    /// Always true: failures surface as typed errors instead
    pub success: bool,
    /// Amount credited to the balance (sold_price * sold_count)
    pub credited: Amount,
}

impl AccountService {
    /// Create a new account service with in-memory stores
    pub fn new(market: Arc<dyn MarketSettlement>) -> Self {
        Self {
            ledger: Arc::new(InMemoryLedgerRepository::new()),
            holdings: Arc::new(InMemoryHoldingsRepository::new()),
            journal: Arc::new(InMemoryTradeJournal::new()),
            market,
            account_locks: KeyedMutex::new(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Create a new account service over explicit store implementations
    pub fn with_stores(
        ledger: Arc<dyn LedgerRepository>,
        holdings: Arc<dyn HoldingsRepository>,
        journal: Arc<dyn TradeJournal>,
        market: Arc<dyn MarketSettlement>,
    ) -> Self {
        Self {
            ledger,
            holdings,
            journal,
            market,
            account_locks: KeyedMutex::new(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Create a new account service with a specific repository type
    pub async fn with_repository(
        repo_type: RepositoryType,
        market: Arc<dyn MarketSettlement>,
    ) -> Result<Self> {
        let service = match repo_type {
            RepositoryType::InMemory => Self::new(market),
            RepositoryType::Postgres(database_url) => {
                let pool = common::db::connect_pool(database_url.as_deref(), 5).await?;
                Self {
                    ledger: Arc::new(PostgresLedgerRepository::with_pool(pool.clone())),
                    holdings: Arc::new(PostgresHoldingsRepository::with_pool(pool.clone())),
                    journal: Arc::new(PostgresTradeJournal::with_pool(pool)),
                    market,
                    account_locks: KeyedMutex::new(),
                    remote_timeout: DEFAULT_REMOTE_TIMEOUT,
                }
            }
        };

        Ok(service)
    }

    /// Create a new account service with a configuration
    pub async fn with_config(
        config: &crate::config::AccountServiceConfig,
        market: Arc<dyn MarketSettlement>,
    ) -> Result<Self> {
        let pool = common::db::connect_pool(Some(&config.database_url), config.db_pool_size).await?;

        Ok(Self {
            ledger: Arc::new(PostgresLedgerRepository::with_pool(pool.clone())),
            holdings: Arc::new(PostgresHoldingsRepository::with_pool(pool.clone())),
            journal: Arc::new(PostgresTradeJournal::with_pool(pool)),
            market,
            account_locks: KeyedMutex::new(),
            remote_timeout: config.remote_timeout,
        })
    }

    /// Override the remote leg timeout
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Register a new account with a zero balance
    pub async fn register(&self, login: &str) -> Result<AccountInfo> {
        if login.trim().is_empty() {
            return Err(Error::IllegalRequest("Login can't be empty".to_string()));
        }

        info!("Registering account: {}", login);

        let _guard = self.account_locks.lock(login).await;

        // Explicit existence check so duplicates surface as a typed
        // outcome; the store's conditional insert backs this up
        if self.ledger.find_by_login(login).await?.is_some() {
            return Err(Error::AlreadyRegistered(format!(
                "Login already exists: {}",
                login
            )));
        }

        let account = self
            .ledger
            .insert(Account::new(login.to_string()))
            .await
            .with_context(|| format!("Failed to register {}", login))?;
        Ok(AccountInfo::from(&account))
    }

    /// Add funds to an account balance
    pub async fn add_funds(&self, login: &str, amount: Amount) -> Result<Amount> {
        if amount <= Amount::ZERO {
            return Err(Error::IllegalRequest(
                "Replenishment amount can't be zero or negative".to_string(),
            ));
        }

        info!("Adding {} to account {}", amount, login);

        let _guard = self.account_locks.lock(login).await;
        let account = self.require_account(login).await?;

        let new_balance = account.balance + amount;
        self.ledger
            .update_balance(account.id, new_balance)
            .await
            .with_context(|| format!("Failed to update balance for {}", login))?;

        Ok(new_balance)
    }

    /// Get an account by login
    pub async fn get_account(&self, login: &str) -> Result<Option<Account>> {
        self.ledger.find_by_login(login).await
    }

    /// Orchestrated buy: debit cash locally, execute the market leg,
    /// credit the holding. Saga with compensation: a remote failure after
    /// the local debit credits the debit back before the error surfaces.
    pub async fn buy(
        &self,
        login: &str,
        instrument_name: &str,
        quantity: Quantity,
        quoted_price: Price,
    ) -> Result<Holding> {
        Self::validate_trade(quantity, quoted_price)?;

        let _guard = self.account_locks.lock(login).await;
        let account = self.require_account(login).await?;

        let total_price = quoted_price * quantity;
        if account.balance < total_price {
            return Err(Error::InsufficientFunds(format!(
                "Balance {} can't cover {}",
                account.balance, total_price
            )));
        }

        let mut trade = TradeRecord::started(
            account.id,
            TradeSide::Buy,
            instrument_name.to_string(),
            quantity,
            quoted_price,
        );
        self.journal
            .record(&trade)
            .await
            .with_context(|| format!("Failed to journal buy of {} for {}", instrument_name, login))?;

        debug!(
            "Buy {}: debiting {} from {} (trade {})",
            instrument_name, total_price, login, trade.id
        );

        // Local leg: debit, awaited and durable before the remote call
        self.ledger
            .update_balance(account.id, account.balance - total_price)
            .await
            .with_context(|| format!("Failed to debit {} from {}", total_price, login))?;
        self.advance(&mut trade, TradeState::LocalCommitted).await?;

        // Remote leg, bounded by the timeout
        let receipt = match self
            .call_market(
                self.market.buy_leg(BuyRequest {
                    instrument_name: instrument_name.to_string(),
                    quantity,
                    quoted_price,
                }),
                "buy leg",
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(reason) => {
                self.compensate_buy(&mut trade, &account, total_price).await;
                return Err(Error::SettlementFailed(Box::new(reason)));
            }
        };

        // Reconcile: credit the holding, awaited
        let holding = match self
            .holdings
            .find_by_name(account.id, instrument_name)
            .await
        {
            Ok(existing) => {
                let mut holding = existing.unwrap_or_else(|| {
                    Holding::new(account.id, receipt.instrument_id, receipt.instrument_name.clone())
                });
                holding.quantity += receipt.quantity;
                self.holdings
                    .upsert(holding)
                    .await
                    .with_context(|| format!("Failed to credit holding of {} for {}", instrument_name, login))
            }
            Err(e) => Err(e),
        };

        let holding = match holding {
            Ok(holding) => holding,
            Err(e) => {
                // Remote already committed; reverse both legs best-effort
                error!("Holding update failed after remote commit: {}", e);
                if let Err(remote_err) = self
                    .market
                    .return_inventory(instrument_name, quantity)
                    .await
                {
                    error!("Inventory return failed during compensation: {}", remote_err);
                }
                self.compensate_buy(&mut trade, &account, total_price).await;
                return Err(Error::SettlementFailed(Box::new(e)));
            }
        };

        self.advance(&mut trade, TradeState::RemoteCommitted).await?;

        info!(
            "Buy settled: {} x {} for {} (trade {})",
            quantity, instrument_name, login, trade.id
        );

        Ok(holding)
    }

    /// Orchestrated sell: decrement the holding locally, execute the market
    /// leg, credit the proceeds. A remote failure after the decrement
    /// restores the holding before the error surfaces.
    pub async fn sell(
        &self,
        login: &str,
        instrument_name: &str,
        quantity: Quantity,
        quoted_price: Price,
    ) -> Result<SellOutcome> {
        Self::validate_trade(quantity, quoted_price)?;

        let _guard = self.account_locks.lock(login).await;
        let account = self.require_account(login).await?;

        let holding = self
            .holdings
            .find_by_name(account.id, instrument_name)
            .await
            .with_context(|| format!("Failed to retrieve holding of {} for {}", instrument_name, login))?
            .ok_or_else(|| {
                Error::IllegalRequest(format!(
                    "No holding of {} for account {}",
                    instrument_name, login
                ))
            })?;

        if holding.quantity < quantity {
            return Err(Error::InsufficientHoldings(format!(
                "Holding {} can't cover {}",
                holding.quantity, quantity
            )));
        }

        let mut trade = TradeRecord::started(
            account.id,
            TradeSide::Sell,
            instrument_name.to_string(),
            quantity,
            quoted_price,
        );
        self.journal
            .record(&trade)
            .await
            .with_context(|| format!("Failed to journal sell of {} for {}", instrument_name, login))?;

        // Local leg: decrement the holding, awaited
        let mut decremented = holding.clone();
        decremented.quantity -= quantity;
        self.holdings
            .upsert(decremented)
            .await
            .with_context(|| format!("Failed to decrement holding of {} for {}", instrument_name, login))?;
        self.advance(&mut trade, TradeState::LocalCommitted).await?;

        // Remote leg, bounded by the timeout
        let report = match self
            .call_market(
                self.market.sell_leg(SellRequest {
                    account_login: login.to_string(),
                    instrument_name: instrument_name.to_string(),
                    quantity,
                    quoted_price,
                }),
                "sell leg",
            )
            .await
        {
            Ok(report) => report,
            Err(reason) => {
                self.compensate_sell(&mut trade, holding).await;
                return Err(Error::SettlementFailed(Box::new(reason)));
            }
        };

        // Reconcile: credit the proceeds from the report, awaited
        let credited = report.sold_price * report.sold_count;
        self.ledger
            .update_balance(account.id, account.balance + credited)
            .await
            .with_context(|| format!("Failed to credit proceeds to {}", login))?;
        self.advance(&mut trade, TradeState::RemoteCommitted).await?;

        info!(
            "Sell settled: {} x {} for {}, credited {} (trade {})",
            quantity, instrument_name, login, credited, trade.id
        );

        Ok(SellOutcome {
            success: true,
            credited,
        })
    }

    /// Read-only projection of an account's holdings joined with the
    /// market catalog. Rows come back in storage order.
    pub async fn get_holdings(&self, account_id: Uuid) -> Result<Vec<HoldingView>> {
        let holdings = self
            .holdings
            .list_for_account(account_id)
            .await
            .with_context(|| format!("Failed to list holdings for account {}", account_id))?;
        let catalog = self.market.catalog().await?;

        let mut views = Vec::with_capacity(holdings.len());
        for holding in holdings {
            match catalog
                .iter()
                .find(|i| i.instrument_name == holding.instrument_name)
            {
                Some(instrument) => views.push(HoldingView {
                    instrument_name: holding.instrument_name,
                    market: instrument.market.clone(),
                    price: instrument.price,
                    quantity: holding.quantity,
                }),
                None => {
                    warn!(
                        "Holding references unlisted instrument: {}",
                        holding.instrument_name
                    );
                }
            }
        }

        Ok(views)
    }

    /// Market catalog passthrough
    pub async fn available_instruments(&self) -> Result<Vec<InstrumentView>> {
        self.market.catalog().await
    }

    /// Compensate trades left in flight by a crash. Returns the number of
    /// records compensated.
    ///
    /// Recovery is cash-favoring. A `LocalCommitted` buy cannot tell a
    /// crash before the remote call from one after the remote leg
    /// committed but before the journal advanced; both look the same
    /// here, and both are resolved by refunding the debit. In the second
    /// case the market keeps the decremented inventory, so ambiguity
    /// costs market-side units, never account cash.
    pub async fn recover_pending(&self) -> Result<usize> {
        let pending = self.journal.pending().await?;
        let mut recovered = 0;

        for record in pending {
            let Some(account) = self.ledger.find_by_id(record.account_id).await? else {
                warn!("Pending trade {} references unknown account", record.id);
                continue;
            };
            let _guard = self.account_locks.lock(&account.login).await;

            match record.state {
                TradeState::LocalCommitted => {
                    self.reverse_local_leg(&record).await?;
                    self.journal
                        .update_state(record.id, TradeState::Compensated)
                        .await?;
                    info!("Recovered trade {} ({:?})", record.id, record.side);
                    recovered += 1;
                }
                TradeState::Started => {
                    // Nothing known to have committed; close the record
                    self.journal
                        .update_state(record.id, TradeState::Compensated)
                        .await?;
                    recovered += 1;
                }
                _ => {}
            }
        }

        Ok(recovered)
    }

    fn validate_trade(quantity: Quantity, quoted_price: Price) -> Result<()> {
        if quantity <= Quantity::ZERO {
            return Err(Error::IllegalRequest(
                "Trade quantity must be positive".to_string(),
            ));
        }
        if quoted_price <= Price::ZERO {
            return Err(Error::IllegalRequest(
                "Quoted price must be positive".to_string(),
            ));
        }
        Ok(())
    }

    async fn require_account(&self, login: &str) -> Result<Account> {
        self.ledger
            .find_by_login(login)
            .await
            .with_context(|| format!("Failed to retrieve account {}", login))?
            .ok_or_else(|| Error::AccountNotFound(format!("Unknown login: {}", login)))
    }

    /// Bound a remote leg call; elapse counts as a remote failure
    async fn call_market<T, F>(&self, fut: F, what: &str) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.remote_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::RemoteTimeout(format!(
                "{} did not complete within {:?}",
                what, self.remote_timeout
            ))),
        }
    }

    async fn advance(&self, trade: &mut TradeRecord, state: TradeState) -> Result<()> {
        trade.state = state;
        self.journal.update_state(trade.id, state).await
    }

    /// Reverse the buy's local debit and close the journal record
    async fn compensate_buy(&self, trade: &mut TradeRecord, account: &Account, total_price: Amount) {
        // Restore the pre-trade balance; the account lock is still held so
        // no other write interleaved
        if let Err(e) = self.ledger.update_balance(account.id, account.balance).await {
            // Leave the record LocalCommitted so the recovery pass retries
            error!(
                "Compensation failed for trade {}: {} ({} not re-credited)",
                trade.id, e, total_price
            );
            return;
        }

        if let Err(e) = self.advance(trade, TradeState::Compensated).await {
            error!("Journal update failed for compensated trade {}: {}", trade.id, e);
        }

        info!("Buy compensated: trade {}, {} re-credited", trade.id, total_price);
    }

    /// Restore the sell's decremented holding and close the journal record
    async fn compensate_sell(&self, trade: &mut TradeRecord, original: Holding) {
        if let Err(e) = self.holdings.upsert(original).await {
            error!(
                "Compensation failed for trade {}: {} (holding not restored)",
                trade.id, e
            );
            return;
        }

        if let Err(e) = self.advance(trade, TradeState::Compensated).await {
            error!("Journal update failed for compensated trade {}: {}", trade.id, e);
        }

        info!("Sell compensated: trade {}", trade.id);
    }

    /// Undo the local leg of a recovered trade
    async fn reverse_local_leg(&self, record: &TradeRecord) -> Result<()> {
        match record.side {
            TradeSide::Buy => {
                let account = self
                    .ledger
                    .find_by_id(record.account_id)
                    .await?
                    .ok_or_else(|| {
                        Error::AccountNotFound(format!("Account not found: {}", record.account_id))
                    })?;
                let refund = record.quoted_price * record.quantity;
                self.ledger
                    .update_balance(account.id, account.balance + refund)
                    .await
                    .with_context(|| format!("Failed to refund recovered trade {}", record.id))
            }
            TradeSide::Sell => {
                let holding = self
                    .holdings
                    .find_by_name(record.account_id, &record.instrument_name)
                    .await?
                    .ok_or_else(|| {
                        Error::Internal(format!(
                            "Holding missing for recovered trade {}",
                            record.id
                        ))
                    })?;
                let mut restored = holding;
                restored.quantity += record.quantity;
                self.holdings
                    .upsert(restored)
                    .await
                    .with_context(|| format!("Failed to restore holding for recovered trade {}", record.id))?;
                Ok(())
            }
        }
    }
}
