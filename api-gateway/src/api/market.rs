//! Market API handlers
//!
//! Handles endpoints related to the instrument catalog:
//! - List instruments
//! - Add an instrument
//! - Replenish inventory
//! - Update the unit price

use std::sync::Arc;

use axum::{extract::State, Json};
use common::decimal::{Price, Quantity};
use common::model::instrument::{Instrument, InstrumentView};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::response::{ApiListResponse, ApiResponse};
use crate::error::ApiError;
use crate::AppState;

/// List all instruments available for trading
#[utoipa::path(
    get,
    path = "/api/v1/market/instruments",
    responses(
        (status = 200, description = "Instrument catalog retrieved successfully"),
        (status = 500, description = "Internal server error")
    ),
    tag = "market"
)]
pub async fn get_instruments(
    State(state): State<Arc<AppState>>,
) -> Result<ApiListResponse<InstrumentView>, ApiError> {
    let instruments = state
        .market_service
        .list_instruments()
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiListResponse::new(instruments))
}

/// Add instrument request
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddInstrumentRequest {
    /// Instrument name, unique within the catalog
    pub name: String,
    /// Market identifier (e.g. exchange code)
    pub market: String,
    /// Initial inventory
    pub quantity: Quantity,
    /// Initial unit price
    pub price: Price,
}

/// Add a new instrument to the catalog
#[utoipa::path(
    post,
    path = "/api/v1/market/instruments",
    request_body = AddInstrumentRequest,
    responses(
        (status = 200, description = "Instrument added successfully"),
        (status = 400, description = "Invalid instrument or duplicate name"),
        (status = 500, description = "Internal server error")
    ),
    tag = "market"
)]
pub async fn add_instrument(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddInstrumentRequest>,
) -> Result<ApiResponse<Instrument>, ApiError> {
    let instrument = state
        .market_service
        .add_instrument(&request.name, &request.market, request.quantity, request.price)
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiResponse::new(instrument))
}

/// Inventory replenishment request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCountRequest {
    /// Instrument name
    pub name: String,
    /// Units to add to inventory (non-negative)
    pub delta: Quantity,
}

/// Add inventory to an existing instrument
#[utoipa::path(
    post,
    path = "/api/v1/market/instruments/count",
    request_body = UpdateCountRequest,
    responses(
        (status = 200, description = "Inventory updated successfully"),
        (status = 400, description = "Negative delta"),
        (status = 404, description = "Instrument not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "market"
)]
pub async fn update_count(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateCountRequest>,
) -> Result<ApiResponse<Instrument>, ApiError> {
    let instrument = state
        .market_service
        .update_inventory_count(&request.name, request.delta)
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiResponse::new(instrument))
}

/// Price update request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePriceRequest {
    /// Instrument name
    pub name: String,
    /// New unit price (positive)
    pub price: Price,
}

/// Set a new unit price for an instrument
#[utoipa::path(
    post,
    path = "/api/v1/market/instruments/price",
    request_body = UpdatePriceRequest,
    responses(
        (status = 200, description = "Price updated successfully"),
        (status = 400, description = "Non-positive price"),
        (status = 404, description = "Instrument not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "market"
)]
pub async fn update_price(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdatePriceRequest>,
) -> Result<ApiResponse<Instrument>, ApiError> {
    let instrument = state
        .market_service
        .update_price(&request.name, request.price)
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiResponse::new(instrument))
}
