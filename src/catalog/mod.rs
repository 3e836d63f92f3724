use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub price: u64,
}

/// Read-only view of the external shop/item catalog. The core resolves
/// prices, name snapshots and shop ownership through this seam and never
/// mutates catalog data.
pub trait Catalog: Send + Sync {
    fn item(&self, id: Uuid) -> Option<CatalogItem>;
    fn shop(&self, id: Uuid) -> Option<Shop>;
    /// An owner principal resolves to zero-or-one owned shop.
    fn shop_owned_by(&self, owner_id: Uuid) -> Option<Shop>;
}

#[derive(Default)]
pub struct InMemoryCatalog {
    shops: DashMap<Uuid, Shop>,
    items: DashMap<Uuid, CatalogItem>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_shop(&self, shop: Shop) {
        self.shops.insert(shop.id, shop);
    }

    pub fn insert_item(&self, item: CatalogItem) {
        self.items.insert(item.id, item);
    }
}

impl Catalog for InMemoryCatalog {
    fn item(&self, id: Uuid) -> Option<CatalogItem> {
        self.items.get(&id).map(|entry| entry.value().clone())
    }

    fn shop(&self, id: Uuid) -> Option<Shop> {
        self.shops.get(&id).map(|entry| entry.value().clone())
    }

    fn shop_owned_by(&self, owner_id: Uuid) -> Option<Shop> {
        self.shops
            .iter()
            .find(|entry| entry.value().owner_id == owner_id)
            .map(|entry| entry.value().clone())
    }
}
