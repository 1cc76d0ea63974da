// Database persistence tests for the PostgreSQL repositories
//
// These run against a real database and are ignored by default. Point
// TEST_DATABASE_URL at a scratch database before running them.

#[cfg(test)]
mod db_persistence_tests {
    use std::env;

    use rust_decimal_macros::dec;
    use sqlx::{postgres::PgPoolOptions, PgPool};
    use tokio::runtime::Runtime;
    use uuid::Uuid;

    use account_service::{
        LedgerRepository, PostgresLedgerRepository, PostgresTradeJournal, TradeJournal,
    };
    use common::model::account::Account;
    use common::model::trade::{TradeRecord, TradeSide, TradeState};
    use market_service::{InventoryRepository, PostgresInventoryRepository};

    // Helper function to run async tests
    fn run_db_test<F>(test: F)
    where
        F: FnOnce(PgPool) -> futures::future::BoxFuture<'static, ()> + Send + 'static,
    {
        // Skip test if TEST_DATABASE_URL is not set
        let db_url = match env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("Skipping database test: TEST_DATABASE_URL not set");
                return;
            }
        };

        // Create runtime
        let rt = Runtime::new().unwrap();

        // Run the test
        rt.block_on(async {
            // Create database connection
            let pool = match PgPoolOptions::new()
                .max_connections(5)
                .connect(&db_url)
                .await
            {
                Ok(pool) => pool,
                Err(err) => {
                    println!("Skipping database test: could not connect to database: {}", err);
                    return;
                }
            };

            common::db::run_migrations(&pool)
                .await
                .expect("Failed to run migrations");

            // Run the test
            test(pool).await;
        });
    }

    #[test]
    #[ignore = "Requires test database, run with RUST_TEST_THREADS=1 cargo test -- --ignored"]
    fn test_ledger_round_trip() {
        run_db_test(|pool| {
            Box::pin(async move {
                let repo = PostgresLedgerRepository::with_pool(pool);
                let login = format!("dbtest-{}", Uuid::new_v4());

                let account = repo
                    .insert(Account::new(login.clone()))
                    .await
                    .expect("Failed to insert account");

                // Duplicate login must be rejected
                assert!(repo.insert(Account::new(login.clone())).await.is_err());

                // Read back by login and by id
                let found = repo
                    .find_by_login(&login)
                    .await
                    .expect("Lookup failed")
                    .expect("Account missing");
                assert_eq!(found.id, account.id);
                assert_eq!(found.balance, dec!(0));

                // Update the balance and read it back
                repo.update_balance(account.id, dec!(123.45))
                    .await
                    .expect("Failed to update balance");
                let found = repo
                    .find_by_id(account.id)
                    .await
                    .expect("Lookup failed")
                    .expect("Account missing");
                assert_eq!(found.balance, dec!(123.45));
            })
        });
    }

    #[test]
    #[ignore = "Requires test database, run with RUST_TEST_THREADS=1 cargo test -- --ignored"]
    fn test_inventory_round_trip() {
        run_db_test(|pool| {
            Box::pin(async move {
                let repo = PostgresInventoryRepository::with_pool(pool);
                let name = format!("DBTEST-{}", Uuid::new_v4().simple());

                let instrument = common::model::instrument::Instrument::new(
                    name.clone(),
                    "NYSE".to_string(),
                    dec!(100),
                    dec!(5.00),
                );
                let instrument = repo
                    .insert(instrument)
                    .await
                    .expect("Failed to insert instrument");

                // Duplicate name must be rejected
                assert!(repo.insert(instrument.clone()).await.is_err());

                let mut found = repo
                    .find_by_name(&name)
                    .await
                    .expect("Lookup failed")
                    .expect("Instrument missing");
                assert_eq!(found.quantity, dec!(100));
                assert_eq!(found.price, dec!(5.00));

                // Persist an inventory change
                found.quantity = dec!(90);
                repo.update(found).await.expect("Failed to update instrument");
                let found = repo
                    .find_by_name(&name)
                    .await
                    .expect("Lookup failed")
                    .expect("Instrument missing");
                assert_eq!(found.quantity, dec!(90));
            })
        });
    }

    #[test]
    #[ignore = "Requires test database, run with RUST_TEST_THREADS=1 cargo test -- --ignored"]
    fn test_trade_journal_pending_states() {
        run_db_test(|pool| {
            Box::pin(async move {
                let journal = PostgresTradeJournal::with_pool(pool);
                let account_id = Uuid::new_v4();

                let record = TradeRecord::started(
                    account_id,
                    TradeSide::Buy,
                    "ACME".to_string(),
                    dec!(10),
                    dec!(5.00),
                );
                journal.record(&record).await.expect("Failed to journal trade");

                // A started trade shows up as pending
                let pending = journal.pending().await.expect("Pending query failed");
                assert!(pending.iter().any(|r| r.id == record.id));

                // A settled trade does not
                journal
                    .update_state(record.id, TradeState::RemoteCommitted)
                    .await
                    .expect("Failed to advance trade");
                let pending = journal.pending().await.expect("Pending query failed");
                assert!(!pending.iter().any(|r| r.id == record.id));
            })
        });
    }
}
