use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use serde::Deserialize;
use uuid::Uuid;

use crate::catalog::{Catalog, CatalogItem, Shop};
use crate::error::AppError;
use crate::models::courier::GeoPoint;
use crate::state::AppState;

/// Seeding seam for the in-memory stand-in of the external catalog
/// service. A deployment backed by the real catalog would not mount
/// these routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/catalog/shops", post(create_shop))
        .route("/catalog/items", post(create_item))
}

#[derive(Deserialize)]
pub struct CreateShopRequest {
    pub owner_id: Uuid,
    pub name: String,
    pub location: GeoPoint,
}

async fn create_shop(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateShopRequest>,
) -> Result<Json<Shop>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("shop name cannot be empty".to_string()));
    }

    let shop = Shop {
        id: Uuid::new_v4(),
        owner_id: payload.owner_id,
        name: payload.name,
        location: payload.location,
    };
    state.catalog.insert_shop(shop.clone());
    Ok(Json(shop))
}

#[derive(Deserialize)]
pub struct CreateItemRequest {
    pub shop_id: Uuid,
    pub name: String,
    pub price: u64,
}

async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<Json<CatalogItem>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("item name cannot be empty".to_string()));
    }
    if payload.price == 0 {
        return Err(AppError::Validation("item price must be positive".to_string()));
    }
    if state.catalog.shop(payload.shop_id).is_none() {
        return Err(AppError::NotFound(format!(
            "shop {} not found",
            payload.shop_id
        )));
    }

    let item = CatalogItem {
        id: Uuid::new_v4(),
        shop_id: payload.shop_id,
        name: payload.name,
        price: payload.price,
    };
    state.catalog.insert_item(item.clone());
    Ok(Json(item))
}
