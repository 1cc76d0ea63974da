// api-gateway/src/lib.rs
pub mod api;
pub mod error;
pub mod config;

use std::sync::Arc;

use account_service::AccountService;
use axum::routing::{get, post};
use axum::Router;
use market_service::MarketService;

use crate::api::account::{buy, deposit, get_holdings, register, sell};
use crate::api::market::{add_instrument, get_instruments, update_count, update_price};

/// App state shared across handlers
pub struct AppState {
    /// Account settlement service
    pub account_service: Arc<AccountService>,
    /// Market settlement service
    pub market_service: Arc<MarketService>,
}

/// Build the versioned API router over the shared state
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Account routes
        .route("/accounts/register", post(register))
        .route("/accounts/deposit", post(deposit))
        .route("/accounts/:login/holdings", get(get_holdings))
        // Trade routes
        .route("/trades/buy", post(buy))
        .route("/trades/sell", post(sell))
        // Market routes
        .route("/market/instruments", get(get_instruments).post(add_instrument))
        .route("/market/instruments/count", post(update_count))
        .route("/market/instruments/price", post(update_price))
}
