use std::sync::Arc;

use account_service::{
    AccountService, InMemoryHoldingsRepository, InMemoryLedgerRepository, InMemoryTradeJournal,
    LedgerRepository,
};
use async_trait::async_trait;
use common::decimal::{dec, Amount};
use common::error::{Error, Result};
use common::model::account::Account;
use market_service::MarketService;
use uuid::Uuid;

/// Build an account service wired to a real in-memory market with one
/// listing: ACME on NYSE, 100 shares at 5.00
async fn setup() -> (AccountService, Arc<MarketService>) {
    let market = Arc::new(MarketService::new());
    market
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.00))
        .await
        .unwrap();
    let service = AccountService::new(market.clone());
    (service, market)
}

#[tokio::test]
async fn test_register() {
    let (service, _) = setup().await;

    let info = service.register("alice").await.unwrap();
    assert_eq!(info.login, "alice");

    let account = service.get_account("alice").await.unwrap().unwrap();
    assert_eq!(account.balance, dec!(0));
}

#[tokio::test]
async fn test_register_twice_is_rejected() {
    let (service, _) = setup().await;

    let first = service.register("alice").await.unwrap();
    let second = service.register("alice").await;
    assert!(matches!(second, Err(Error::AlreadyRegistered(_))));

    // First registration untouched
    let account = service.get_account("alice").await.unwrap().unwrap();
    assert_eq!(account.registered_at, first.registered_at);
    assert_eq!(account.balance, dec!(0));
}

#[tokio::test]
async fn test_register_empty_login() {
    let (service, _) = setup().await;

    let result = service.register("  ").await;
    assert!(matches!(result, Err(Error::IllegalRequest(_))));
}

#[tokio::test]
async fn test_add_funds() {
    let (service, _) = setup().await;
    service.register("alice").await.unwrap();

    let balance = service.add_funds("alice", dec!(100.00)).await.unwrap();
    assert_eq!(balance, dec!(100.00));

    let balance = service.add_funds("alice", dec!(0.01)).await.unwrap();
    assert_eq!(balance, dec!(100.01));
}

#[tokio::test]
async fn test_add_funds_boundaries() {
    let (service, _) = setup().await;
    service.register("alice").await.unwrap();

    assert!(matches!(
        service.add_funds("alice", dec!(0)).await,
        Err(Error::IllegalRequest(_))
    ));
    assert!(matches!(
        service.add_funds("alice", dec!(-1)).await,
        Err(Error::IllegalRequest(_))
    ));
    assert!(matches!(
        service.add_funds("ghost", dec!(10)).await,
        Err(Error::AccountNotFound(_))
    ));

    // Smallest positive unit succeeds
    let balance = service.add_funds("alice", dec!(0.01)).await.unwrap();
    assert_eq!(balance, dec!(0.01));
}

#[tokio::test]
async fn test_buy_settles_both_sides() {
    let (service, market) = setup().await;
    service.register("alice").await.unwrap();
    service.add_funds("alice", dec!(100.00)).await.unwrap();

    let holding = service.buy("alice", "ACME", dec!(10), dec!(5.00)).await.unwrap();
    assert_eq!(holding.quantity, dec!(10));
    assert_eq!(holding.instrument_name, "ACME");

    // Balance debited exactly
    let account = service.get_account("alice").await.unwrap().unwrap();
    assert_eq!(account.balance, dec!(50.00));

    // Inventory decremented on the market side
    let instrument = market.get_instrument("ACME").await.unwrap().unwrap();
    assert_eq!(instrument.quantity, dec!(90));
}

#[tokio::test]
async fn test_repeated_buys_have_no_drift() {
    let (service, _) = setup().await;
    service.register("alice").await.unwrap();
    service.add_funds("alice", dec!(100.00)).await.unwrap();

    for _ in 0..5 {
        service.buy("alice", "ACME", dec!(2), dec!(5.00)).await.unwrap();
    }

    let account = service.get_account("alice").await.unwrap().unwrap();
    assert_eq!(account.balance, dec!(50.00));

    let holdings = held_quantity(&service, "alice").await;
    assert_eq!(holdings, dec!(10));
}

#[tokio::test]
async fn test_buy_insufficient_funds() {
    let (service, market) = setup().await;
    service.register("alice").await.unwrap();
    service.add_funds("alice", dec!(10.00)).await.unwrap();

    let result = service.buy("alice", "ACME", dec!(10), dec!(5.00)).await;
    assert!(matches!(result, Err(Error::InsufficientFunds(_))));

    // No partial debit, no inventory change
    let account = service.get_account("alice").await.unwrap().unwrap();
    assert_eq!(account.balance, dec!(10.00));
    let instrument = market.get_instrument("ACME").await.unwrap().unwrap();
    assert_eq!(instrument.quantity, dec!(100));
}

#[tokio::test]
async fn test_buy_unknown_account() {
    let (service, _) = setup().await;

    let result = service.buy("ghost", "ACME", dec!(1), dec!(5.00)).await;
    assert!(matches!(result, Err(Error::AccountNotFound(_))));
}

#[tokio::test]
async fn test_buy_validation() {
    let (service, _) = setup().await;
    service.register("alice").await.unwrap();

    assert!(matches!(
        service.buy("alice", "ACME", dec!(0), dec!(5.00)).await,
        Err(Error::IllegalRequest(_))
    ));
    assert!(matches!(
        service.buy("alice", "ACME", dec!(1), dec!(0)).await,
        Err(Error::IllegalRequest(_))
    ));
}

#[tokio::test]
async fn test_buy_stale_price_leaves_state_unchanged() {
    let (service, market) = setup().await;
    service.register("alice").await.unwrap();
    service.add_funds("alice", dec!(100.00)).await.unwrap();

    market.update_price("ACME", dec!(5.50)).await.unwrap();

    // Quote is now stale: the remote leg rejects, the debit is compensated
    let result = service.buy("alice", "ACME", dec!(10), dec!(5.00)).await;
    let err = result.unwrap_err();
    assert!(matches!(err, Error::SettlementFailed(_)));
    assert!(matches!(err.root_cause(), Error::PriceStale(_)));

    let account = service.get_account("alice").await.unwrap().unwrap();
    assert_eq!(account.balance, dec!(100.00));

    let instrument = market.get_instrument("ACME").await.unwrap().unwrap();
    assert_eq!(instrument.quantity, dec!(100));
}

#[tokio::test]
async fn test_sell_settles_both_sides() {
    let (service, market) = setup().await;
    service.register("alice").await.unwrap();
    service.add_funds("alice", dec!(100.00)).await.unwrap();
    service.buy("alice", "ACME", dec!(10), dec!(5.00)).await.unwrap();

    let outcome = service.sell("alice", "ACME", dec!(4), dec!(5.00)).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.credited, dec!(20.00));

    let account = service.get_account("alice").await.unwrap().unwrap();
    assert_eq!(account.balance, dec!(70.00)); // 100 - 50 + 20

    let holdings = held_quantity(&service, "alice").await;
    assert_eq!(holdings, dec!(6));

    let instrument = market.get_instrument("ACME").await.unwrap().unwrap();
    assert_eq!(instrument.quantity, dec!(94)); // 100 - 10 + 4
}

#[tokio::test]
async fn test_sell_without_holding() {
    let (service, _) = setup().await;
    service.register("alice").await.unwrap();

    let result = service.sell("alice", "ACME", dec!(1), dec!(5.00)).await;
    assert!(matches!(result, Err(Error::IllegalRequest(_))));
}

#[tokio::test]
async fn test_oversell_is_rejected() {
    let (service, _) = setup().await;
    service.register("alice").await.unwrap();
    service.add_funds("alice", dec!(100.00)).await.unwrap();
    service.buy("alice", "ACME", dec!(10), dec!(5.00)).await.unwrap();

    let result = service.sell("alice", "ACME", dec!(15), dec!(5.00)).await;
    assert!(matches!(result, Err(Error::InsufficientHoldings(_))));

    // Holding and balance unchanged
    let account = service.get_account("alice").await.unwrap().unwrap();
    assert_eq!(account.balance, dec!(50.00));
    let holdings = held_quantity(&service, "alice").await;
    assert_eq!(holdings, dec!(10));
}

#[tokio::test]
async fn test_holdings_projection() {
    let (service, market) = setup().await;
    market
        .add_instrument("GLOBEX", "NASDAQ", dec!(50), dec!(12.00))
        .await
        .unwrap();
    service.register("alice").await.unwrap();
    service.add_funds("alice", dec!(200.00)).await.unwrap();
    service.buy("alice", "ACME", dec!(10), dec!(5.00)).await.unwrap();
    service.buy("alice", "GLOBEX", dec!(5), dec!(12.00)).await.unwrap();

    let account = service.get_account("alice").await.unwrap().unwrap();
    let views = service.get_holdings(account.id).await.unwrap();
    assert_eq!(views.len(), 2);

    let acme = views.iter().find(|v| v.instrument_name == "ACME").unwrap();
    assert_eq!(acme.market, "NYSE");
    assert_eq!(acme.price, dec!(5.00));
    assert_eq!(acme.quantity, dec!(10));

    let globex = views.iter().find(|v| v.instrument_name == "GLOBEX").unwrap();
    assert_eq!(globex.quantity, dec!(5));
}

#[tokio::test]
async fn test_available_instruments_passthrough() {
    let (service, _) = setup().await;

    let catalog = service.available_instruments().await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].instrument_name, "ACME");
}

/// Ledger stub whose balance writes fail; reads delegate to the in-memory store
struct OfflineLedger {
    inner: InMemoryLedgerRepository,
}

#[async_trait]
impl LedgerRepository for OfflineLedger {
    async fn insert(&self, account: Account) -> Result<Account> {
        self.inner.insert(account).await
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        self.inner.find_by_login(login).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        self.inner.find_by_id(id).await
    }

    async fn update_balance(&self, _id: Uuid, _balance: Amount) -> Result<()> {
        Err(Error::Internal("ledger store offline".to_string()))
    }
}

#[tokio::test]
async fn test_store_failures_carry_operation_context() {
    let ledger = Arc::new(OfflineLedger {
        inner: InMemoryLedgerRepository::new(),
    });
    let service = AccountService::with_stores(
        ledger,
        Arc::new(InMemoryHoldingsRepository::new()),
        Arc::new(InMemoryTradeJournal::new()),
        Arc::new(MarketService::new()),
    );
    service.register("alice").await.unwrap();

    // The store failure keeps its kind and gains the operation context
    let err = service.add_funds("alice", dec!(10.00)).await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
    let message = err.to_string();
    assert!(message.contains("Failed to update balance for alice"));
    assert!(message.contains("ledger store offline"));
}

/// Total quantity held by a login across all instruments
async fn held_quantity(service: &AccountService, login: &str) -> rust_decimal::Decimal {
    let account = service.get_account(login).await.unwrap().unwrap();
    service
        .get_holdings(account.id)
        .await
        .unwrap()
        .iter()
        .map(|v| v.quantity)
        .sum()
}
