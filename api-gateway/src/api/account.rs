//! Account API handlers
//!
//! Handles endpoints related to account management and trading:
//! - Register account
//! - Deposit funds
//! - Buy and sell instruments
//! - Get account holdings

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use account_service::SellOutcome;
use common::decimal::{Amount, Price, Quantity};
use common::model::account::AccountInfo;
use common::model::holding::{Holding, HoldingView};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::response::{ApiListResponse, ApiResponse};
use crate::error::ApiError;
use crate::AppState;

/// Register account request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Account login
    pub login: String,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/accounts/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account successfully registered"),
        (status = 400, description = "Bad request"),
        (status = 409, description = "Login already registered"),
        (status = 500, description = "Internal server error")
    ),
    tag = "account"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<ApiResponse<AccountInfo>, ApiError> {
    let info = state
        .account_service
        .register(&request.login)
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiResponse::new(info))
}

/// Deposit request
#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Account login
    pub login: String,
    /// Amount to credit
    pub amount: Amount,
}

/// Updated balance after a deposit
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Account login
    pub login: String,
    /// Current balance
    pub balance: Amount,
}

/// Deposit funds into an account
#[utoipa::path(
    post,
    path = "/api/v1/accounts/deposit",
    request_body = DepositRequest,
    responses(
        (status = 200, description = "Funds deposited successfully"),
        (status = 400, description = "Invalid deposit amount"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "account"
)]
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DepositRequest>,
) -> Result<ApiResponse<BalanceResponse>, ApiError> {
    let balance = state
        .account_service
        .add_funds(&request.login, request.amount)
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiResponse::new(BalanceResponse {
        login: request.login,
        balance,
    }))
}

/// Get all holdings for an account
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{login}/holdings",
    params(
        ("login" = String, Path, description = "Account login")
    ),
    responses(
        (status = 200, description = "Account holdings retrieved successfully"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "account"
)]
pub async fn get_holdings(
    State(state): State<Arc<AppState>>,
    Path(login): Path<String>,
) -> Result<ApiListResponse<HoldingView>, ApiError> {
    // Resolve the account first so an unknown login maps to 404
    let account = state
        .account_service
        .get_account(&login)
        .await
        .map_err(ApiError::Common)?
        .ok_or_else(|| ApiError::NotFound(format!("Account not found: {}", login)))?;

    let holdings = state
        .account_service
        .get_holdings(account.id)
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiListResponse::new(holdings))
}

/// Trade request (buy or sell)
#[derive(Debug, Deserialize, ToSchema)]
pub struct TradeRequest {
    /// Account login
    pub login: String,
    /// Instrument name
    pub instrument_name: String,
    /// Number of units to trade
    pub quantity: Quantity,
    /// Price the client observed when placing the order
    pub quoted_price: Price,
}

/// Buy instruments for an account
#[utoipa::path(
    post,
    path = "/api/v1/trades/buy",
    request_body = TradeRequest,
    responses(
        (status = 200, description = "Trade settled on both sides"),
        (status = 400, description = "Invalid trade request or insufficient funds"),
        (status = 404, description = "Account or instrument not found"),
        (status = 409, description = "Settlement rejected (stale price or inventory)"),
        (status = 504, description = "Market settlement timed out"),
        (status = 500, description = "Internal server error")
    ),
    tag = "trade"
)]
pub async fn buy(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TradeRequest>,
) -> Result<ApiResponse<Holding>, ApiError> {
    let holding = state
        .account_service
        .buy(
            &request.login,
            &request.instrument_name,
            request.quantity,
            request.quoted_price,
        )
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiResponse::new(holding))
}

/// Sell instruments from an account
#[utoipa::path(
    post,
    path = "/api/v1/trades/sell",
    request_body = TradeRequest,
    responses(
        (status = 200, description = "Trade settled on both sides"),
        (status = 400, description = "Invalid trade request or insufficient holdings"),
        (status = 404, description = "Account or instrument not found"),
        (status = 409, description = "Settlement rejected (stale price)"),
        (status = 504, description = "Market settlement timed out"),
        (status = 500, description = "Internal server error")
    ),
    tag = "trade"
)]
pub async fn sell(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TradeRequest>,
) -> Result<ApiResponse<SellOutcome>, ApiError> {
    let outcome = state
        .account_service
        .sell(
            &request.login,
            &request.instrument_name,
            request.quantity,
            request.quoted_price,
        )
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiResponse::new(outcome))
}
