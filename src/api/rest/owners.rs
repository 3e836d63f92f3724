use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;

use crate::api::rest::auth::require_role;
use crate::error::AppError;
use crate::models::order::ShopOrderSummary;
use crate::models::principal::{Principal, Role};
use crate::state::AppState;
use crate::stats::{self, OwnerStats};
use crate::store;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/owners/me/orders", get(my_shop_orders))
        .route("/owners/me/stats", get(my_stats))
}

async fn my_shop_orders(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<ShopOrderSummary>>, AppError> {
    let principal = require_role(principal, Role::Owner)?;
    Ok(Json(store::shop_orders_for_owner(&state, principal.id)))
}

async fn my_stats(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<OwnerStats>, AppError> {
    let principal = require_role(principal, Role::Owner)?;
    Ok(Json(stats::owner_stats(&state, principal.id)))
}
