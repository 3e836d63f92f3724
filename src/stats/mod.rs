use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;

/// Owner dashboard counters. `total` counts every shop order for the
/// owner regardless of status; the time windows are anchored on the
/// delivered-at stamp, so undelivered orders only show up in `total`.
#[derive(Debug, Default, Clone, Serialize)]
pub struct OwnerStats {
    pub today: u64,
    pub week: u64,
    pub total: u64,
}

pub fn owner_stats(state: &AppState, owner_id: Uuid) -> OwnerStats {
    let now = Utc::now();
    let today = now.date_naive();
    let week_start = now - Duration::days(7);

    let mut stats = OwnerStats::default();
    for entry in state.orders.iter() {
        for shop_order in &entry.value().shop_orders {
            if shop_order.owner_id != owner_id {
                continue;
            }
            stats.total += 1;
            let Some(delivered_at) = shop_order.delivered_at else {
                continue;
            };
            if delivered_at >= week_start {
                stats.week += 1;
            }
            if delivered_at.date_naive() == today {
                stats.today += 1;
            }
        }
    }

    stats
}
