use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use uuid::Uuid;

use crate::api::rest::auth::require_role;
use crate::engine::{arbiter, dispatch};
use crate::error::AppError;
use crate::models::assignment::DeliveryAssignment;
use crate::models::order::ShopOrderSummary;
use crate::models::principal::{Principal, Role};
use crate::state::AppState;
use crate::store;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assignments/open", get(list_open))
        .route("/assignments/:id/accept", post(accept_assignment))
        .route("/couriers/me/assignment", get(current_assignment))
        .route("/couriers/me/deliveries", get(my_deliveries))
        .route("/couriers/me/deliveries/today", get(today_histogram))
}

async fn list_open(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<DeliveryAssignment>>, AppError> {
    require_role(principal, Role::Courier)?;
    Ok(Json(dispatch::list_open_assignments(&state)))
}

async fn accept_assignment(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<ShopOrderSummary>, AppError> {
    Ok(Json(arbiter::accept(&state, id, principal)?))
}

async fn current_assignment(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Option<ShopOrderSummary>>, AppError> {
    let principal = require_role(principal, Role::Courier)?;
    Ok(Json(arbiter::current_assignment(&state, principal.id)))
}

async fn my_deliveries(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<ShopOrderSummary>>, AppError> {
    let principal = require_role(principal, Role::Courier)?;
    Ok(Json(store::shop_orders_for_courier(&state, principal.id)))
}

async fn today_histogram(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<[u32; 24]>, AppError> {
    let principal = require_role(principal, Role::Courier)?;
    Ok(Json(arbiter::today_deliveries(&state, principal.id)))
}
