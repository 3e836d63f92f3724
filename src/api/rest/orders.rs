use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::auth::require_role;
use crate::engine::fees::delivery_fee;
use crate::error::AppError;
use crate::models::order::{DeliveryAddress, Order, PaymentMethod, ShopOrder, ShopOrderStatus};
use crate::models::principal::{Principal, Role};
use crate::state::AppState;
use crate::store::{self, CartLine};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(place_order).get(list_my_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/shops/:shop_id/status", patch(transition_status))
        .route("/payments/:provider_ref/confirm", post(confirm_payment))
        .route("/fees/preview", get(fee_preview))
}

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub lines: Vec<CartLine>,
    pub address: DeliveryAddress,
    pub payment_method: PaymentMethod,
}

async fn place_order(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = store::place_order(
        &state,
        principal,
        payload.lines,
        payload.address,
        payload.payment_method,
    )
    .await?;
    Ok(Json(order))
}

async fn list_my_orders(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<Order>>, AppError> {
    let principal = require_role(principal, Role::Customer)?;
    Ok(Json(store::orders_for_customer(&state, principal.id)))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(store::order_for(&state, id, principal)?))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(store::cancel_order(&state, id, principal)?))
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: ShopOrderStatus,
}

async fn transition_status(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path((id, shop_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<ShopOrder>, AppError> {
    let shop_order = store::transition_status(&state, id, shop_id, principal, payload.status)?;
    Ok(Json(shop_order))
}

#[derive(Deserialize)]
pub struct ConfirmPaymentRequest {
    pub proof: String,
}

async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Path(provider_ref): Path<String>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<Json<Order>, AppError> {
    let order = store::confirm_payment(&state, &provider_ref, &payload.proof).await?;
    Ok(Json(order))
}

#[derive(Deserialize)]
pub struct FeePreviewParams {
    pub subtotal: u64,
}

#[derive(Serialize)]
pub struct FeePreview {
    pub subtotal: u64,
    pub delivery_fee: u64,
}

/// Client-side preview of the slab table; the fee actually charged is
/// frozen into the shop order at placement.
async fn fee_preview(Query(params): Query<FeePreviewParams>) -> Json<FeePreview> {
    Json(FeePreview {
        subtotal: params.subtotal,
        delivery_fee: delivery_fee(params.subtotal),
    })
}
