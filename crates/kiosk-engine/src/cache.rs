//! # Status Cache
//!
//! Process-local read-through cache for order status polls.
//!
//! ```text
//! get_status(id)
//!     │
//!     ├── fresh entry (age < ttl) ──► return cached view
//!     │
//!     └── miss / expired ──► store ──► insert ──► return
//!
//! Every status write made by this process drops the entry, so the next
//! poll reads the committed row. Writers never insert their own view;
//! writes can finish out of commit order.
//! ```
//!
//! The store stays the source of truth: an entry only ever shortens the
//! path to a value the store held at most `ttl` ago.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use kiosk_core::OrderStatusView;

#[derive(Debug, Clone)]
struct CacheEntry {
    view: OrderStatusView,
    stored_at: Instant,
}

/// TTL cache of order status views keyed by gateway order id.
#[derive(Debug)]
pub struct StatusCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl StatusCache {
    pub fn new(ttl: Duration) -> Self {
        StatusCache {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a fresh entry, if any.
    pub async fn get(&self, gateway_order_id: &str) -> Option<OrderStatusView> {
        let entries = self.entries.read().await;
        entries
            .get(gateway_order_id)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.view.clone())
    }

    /// Stores or refreshes an entry.
    pub async fn put(&self, view: OrderStatusView) {
        let mut entries = self.entries.write().await;
        // Opportunistic sweep keeps the map bounded by recent activity.
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        entries.insert(
            view.gateway_order_id.clone(),
            CacheEntry {
                view,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops an entry after the order's row changed.
    pub async fn invalidate(&self, gateway_order_id: &str) {
        self.entries.write().await.remove(gateway_order_id);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kiosk_core::OrderStatus;

    fn view(id: &str, status: OrderStatus) -> OrderStatusView {
        OrderStatusView {
            gateway_order_id: id.to_string(),
            status,
            created_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = StatusCache::new(Duration::from_secs(5));
        cache.put(view("mp-1", OrderStatus::Pending)).await;

        assert_eq!(
            cache.get("mp-1").await.map(|v| v.status),
            Some(OrderStatus::Pending)
        );

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.get("mp-1").await.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_and_invalidate_removes() {
        let cache = StatusCache::new(Duration::from_secs(5));
        cache.put(view("mp-1", OrderStatus::Pending)).await;
        cache.put(view("mp-1", OrderStatus::Processed)).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(
            cache.get("mp-1").await.map(|v| v.status),
            Some(OrderStatus::Processed)
        );

        cache.invalidate("mp-1").await;
        assert!(cache.get("mp-1").await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let cache = StatusCache::new(Duration::ZERO);
        cache.put(view("mp-1", OrderStatus::Pending)).await;
        assert!(cache.get("mp-1").await.is_none());
    }
}
