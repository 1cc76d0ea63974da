use common::decimal::dec;
use common::error::Error;
use common::model::trade::{BuyRequest, SellRequest};
use common::settlement::MarketSettlement;
use market_service::MarketService;

fn buy_request(name: &str, quantity: rust_decimal::Decimal, price: rust_decimal::Decimal) -> BuyRequest {
    BuyRequest {
        instrument_name: name.to_string(),
        quantity,
        quoted_price: price,
    }
}

fn sell_request(name: &str, quantity: rust_decimal::Decimal, price: rust_decimal::Decimal) -> SellRequest {
    SellRequest {
        account_login: "alice".to_string(),
        instrument_name: name.to_string(),
        quantity,
        quoted_price: price,
    }
}

#[tokio::test]
async fn test_add_instrument() {
    let service = MarketService::new();

    let instrument = service
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.00))
        .await
        .unwrap();

    assert_eq!(instrument.name, "ACME");
    assert_eq!(instrument.market, "NYSE");
    assert_eq!(instrument.quantity, dec!(100));
    assert_eq!(instrument.price, dec!(5.00));

    // Listing the same name twice is rejected with a typed outcome
    let duplicate = service
        .add_instrument("ACME", "NYSE", dec!(10), dec!(1))
        .await;
    assert!(matches!(duplicate, Err(Error::IllegalRequest(_))));
}

#[tokio::test]
async fn test_add_instrument_validation() {
    let service = MarketService::new();

    let bad_price = service.add_instrument("ACME", "NYSE", dec!(10), dec!(0)).await;
    assert!(matches!(bad_price, Err(Error::IllegalRequest(_))));

    let negative_price = service.add_instrument("ACME", "NYSE", dec!(10), dec!(-1)).await;
    assert!(matches!(negative_price, Err(Error::IllegalRequest(_))));

    let negative_quantity = service.add_instrument("ACME", "NYSE", dec!(-1), dec!(5)).await;
    assert!(matches!(negative_quantity, Err(Error::IllegalRequest(_))));
}

#[tokio::test]
async fn test_buy_leg_success() {
    let service = MarketService::new();
    service
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.00))
        .await
        .unwrap();

    let receipt = service
        .buy_leg(buy_request("ACME", dec!(10), dec!(5.00)))
        .await
        .unwrap();

    assert_eq!(receipt.quantity, dec!(10));
    assert_eq!(receipt.executed_amount, dec!(50.00));
    assert_eq!(receipt.quoted_price, dec!(5.00));

    // Inventory was decremented and persisted
    let instrument = service.get_instrument("ACME").await.unwrap().unwrap();
    assert_eq!(instrument.quantity, dec!(90));
}

#[tokio::test]
async fn test_buy_leg_unknown_instrument() {
    let service = MarketService::new();

    let result = service.buy_leg(buy_request("GHOST", dec!(1), dec!(1))).await;
    assert!(matches!(result, Err(Error::InstrumentNotFound(_))));
}

#[tokio::test]
async fn test_buy_leg_insufficient_inventory() {
    let service = MarketService::new();
    service
        .add_instrument("ACME", "NYSE", dec!(5), dec!(5.00))
        .await
        .unwrap();

    let result = service.buy_leg(buy_request("ACME", dec!(10), dec!(5.00))).await;
    assert!(matches!(result, Err(Error::InsufficientInventory(_))));

    // No mutation on failure
    let instrument = service.get_instrument("ACME").await.unwrap().unwrap();
    assert_eq!(instrument.quantity, dec!(5));
}

#[tokio::test]
async fn test_buy_leg_stale_price() {
    let service = MarketService::new();
    service
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.50))
        .await
        .unwrap();

    let result = service.buy_leg(buy_request("ACME", dec!(10), dec!(5.00))).await;
    assert!(matches!(result, Err(Error::PriceStale(_))));

    let instrument = service.get_instrument("ACME").await.unwrap().unwrap();
    assert_eq!(instrument.quantity, dec!(100));
}

#[tokio::test]
async fn test_buy_leg_price_within_epsilon() {
    let service = MarketService::new();
    service
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.00))
        .await
        .unwrap();

    // A deviation of exactly 1e-8 is still within tolerance
    let receipt = service
        .buy_leg(buy_request("ACME", dec!(1), dec!(5.00000001)))
        .await
        .unwrap();
    assert_eq!(receipt.quantity, dec!(1));
}

#[tokio::test]
async fn test_sell_leg_success_at_current_price() {
    let service = MarketService::new();
    service
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.00))
        .await
        .unwrap();

    // Selling at the current price succeeds; the report carries the
    // current price and the returned quantity
    let report = service
        .sell_leg(sell_request("ACME", dec!(10), dec!(5.00)))
        .await
        .unwrap();

    assert_eq!(report.account_login, "alice");
    assert_eq!(report.sold_price, dec!(5.00));
    assert_eq!(report.sold_count, dec!(10));

    let instrument = service.get_instrument("ACME").await.unwrap().unwrap();
    assert_eq!(instrument.quantity, dec!(110));
}

#[tokio::test]
async fn test_sell_leg_stale_price() {
    let service = MarketService::new();
    service
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.50))
        .await
        .unwrap();

    let result = service.sell_leg(sell_request("ACME", dec!(10), dec!(5.00))).await;
    assert!(matches!(result, Err(Error::PriceStale(_))));

    let instrument = service.get_instrument("ACME").await.unwrap().unwrap();
    assert_eq!(instrument.quantity, dec!(100));
}

#[tokio::test]
async fn test_update_inventory_count() {
    let service = MarketService::new();
    service
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.00))
        .await
        .unwrap();

    let updated = service.update_inventory_count("ACME", dec!(25)).await.unwrap();
    assert_eq!(updated.quantity, dec!(125));

    let negative = service.update_inventory_count("ACME", dec!(-1)).await;
    assert!(matches!(negative, Err(Error::IllegalRequest(_))));

    let missing = service.update_inventory_count("GHOST", dec!(1)).await;
    assert!(matches!(missing, Err(Error::InstrumentNotFound(_))));
}

#[tokio::test]
async fn test_update_price() {
    let service = MarketService::new();
    service
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.00))
        .await
        .unwrap();

    let updated = service.update_price("ACME", dec!(6.25)).await.unwrap();
    assert_eq!(updated.price, dec!(6.25));

    // The old quote is now stale, the new one executes
    let stale = service.buy_leg(buy_request("ACME", dec!(1), dec!(5.00))).await;
    assert!(matches!(stale, Err(Error::PriceStale(_))));

    let receipt = service
        .buy_leg(buy_request("ACME", dec!(1), dec!(6.25)))
        .await
        .unwrap();
    assert_eq!(receipt.executed_amount, dec!(6.25));

    let zero = service.update_price("ACME", dec!(0)).await;
    assert!(matches!(zero, Err(Error::IllegalRequest(_))));
}

#[tokio::test]
async fn test_catalog_listing() {
    let service = MarketService::new();
    service
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.00))
        .await
        .unwrap();
    service
        .add_instrument("GLOBEX", "NASDAQ", dec!(50), dec!(12.00))
        .await
        .unwrap();

    let catalog = service.catalog().await.unwrap();
    assert_eq!(catalog.len(), 2);
    assert!(catalog.iter().any(|i| i.instrument_name == "ACME" && i.quantity == dec!(100)));
    assert!(catalog.iter().any(|i| i.instrument_name == "GLOBEX" && i.price == dec!(12.00)));
}

#[tokio::test]
async fn test_return_inventory() {
    let service = MarketService::new();
    service
        .add_instrument("ACME", "NYSE", dec!(100), dec!(5.00))
        .await
        .unwrap();

    service
        .buy_leg(buy_request("ACME", dec!(10), dec!(5.00)))
        .await
        .unwrap();
    service.return_inventory("ACME", dec!(10)).await.unwrap();

    let instrument = service.get_instrument("ACME").await.unwrap().unwrap();
    assert_eq!(instrument.quantity, dec!(100));
}
