// This is a metapackage for tests
// Re-export crates as modules

/// Helpers for wiring both settlement services together in tests
pub mod test_helpers {
    use std::sync::Arc;

    use account_service::AccountService;
    use market_service::MarketService;
    use rust_decimal::Decimal;

    /// Both services wired the way the settlement engine wires them
    pub struct Engine {
        pub market: Arc<MarketService>,
        pub accounts: Arc<AccountService>,
    }

    impl Engine {
        /// In-memory engine with an empty catalog and ledger
        pub fn new() -> Self {
            let market = Arc::new(MarketService::new());
            let accounts = Arc::new(AccountService::new(market.clone()));
            Self { market, accounts }
        }

        /// Register an account and fund it in one step
        pub async fn funded_account(&self, login: &str, balance: Decimal) {
            self.accounts
                .register(login)
                .await
                .expect("register failed");
            self.accounts
                .add_funds(login, balance)
                .await
                .expect("deposit failed");
        }
    }

    impl Default for Engine {
        fn default() -> Self {
            Self::new()
        }
    }
}
