//! In-process mirrors of the `items` and `inventories` tables.
//!
//! Both caches are authoritative for reads once hydrated: nothing expires
//! and nothing is evicted. They are backed by [`DashMap`] so a shared
//! `&ShopManager` can mutate them, with last-write-wins semantics between
//! overlapping calls. Values are cloned out; no shard guard is ever held
//! across an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::model::{Inventory, Item};

// ── cache stats ──────────────────────────────────────────────────────

/// Lookup counters for a cache.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit rate between 0.0 and 1.0, 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            return 0.0;
        }
        self.hits() as f64 / total as f64
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} rate={:.2}%",
            self.hits(),
            self.misses(),
            self.hit_rate() * 100.0,
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Item cache
// ═══════════════════════════════════════════════════════════════════════

/// Item id → item, across all guilds.
#[derive(Debug, Default)]
pub struct ItemCache {
    items: DashMap<i64, Item>,
    stats: CacheStats,
}

impl ItemCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Option<Item> {
        match self.items.get(&id) {
            Some(item) => {
                self.stats.record_hit();
                Some(item.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Insert or replace the item stored under `id`.
    pub fn set(&self, id: i64, item: Item) {
        debug!(item_id = id, "item cache set");
        self.items.insert(id, item);
    }

    /// Every item belonging to `guild_id`, in no particular order.
    pub fn filter(&self, guild_id: &str) -> Vec<Item> {
        self.items
            .iter()
            .filter(|entry| entry.guild_id == guild_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// `id` only if it belongs to `guild_id`.
    pub fn get_in_guild(&self, guild_id: &str, id: i64) -> Option<Item> {
        self.get(id).filter(|item| item.guild_id == guild_id)
    }

    pub fn delete(&self, id: i64) -> Option<Item> {
        debug!(item_id = id, "item cache delete");
        self.items.remove(&id).map(|(_, item)| item)
    }

    /// Replace the whole contents with `items`.
    pub fn replace_all(&self, items: impl IntoIterator<Item = Item>) {
        self.items.clear();
        for item in items {
            self.items.insert(item.id, item);
        }
        debug!(entries = self.items.len(), "item cache replaced");
    }

    pub fn all(&self) -> Vec<Item> {
        self.items.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Inventory cache
// ═══════════════════════════════════════════════════════════════════════

/// Guild id → user id → inventory.
#[derive(Debug, Default)]
pub struct InventoryCache {
    guilds: DashMap<String, HashMap<String, Inventory>>,
    stats: CacheStats,
}

impl InventoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached inventory, or a fresh empty one which is cached (but not
    /// persisted) on first access.
    pub fn get(&self, guild_id: &str, user_id: &str) -> Inventory {
        let mut users = self.guilds.entry(guild_id.to_owned()).or_default();
        if let Some(inventory) = users.get(user_id) {
            self.stats.record_hit();
            return inventory.clone();
        }

        self.stats.record_miss();
        debug!(guild_id, user_id, "inventory cache miss, creating empty inventory");
        let inventory = Inventory::empty(guild_id, user_id);
        users.insert(user_id.to_owned(), inventory.clone());
        inventory
    }

    /// Insert or replace the inventory of `user_id` in `guild_id`.
    pub fn set(&self, guild_id: &str, user_id: &str, inventory: Inventory) {
        debug!(guild_id, user_id, lines = inventory.items.len(), "inventory cache set");
        self.guilds
            .entry(guild_id.to_owned())
            .or_default()
            .insert(user_id.to_owned(), inventory);
    }

    /// Every cached inventory of `guild_id`.
    pub fn guild(&self, guild_id: &str) -> Vec<Inventory> {
        self.guilds
            .get(guild_id)
            .map(|users| users.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Replace the whole contents with `inventories`.
    pub fn replace_all(&self, inventories: impl IntoIterator<Item = Inventory>) {
        self.guilds.clear();
        let mut count = 0usize;
        for inventory in inventories {
            self.guilds
                .entry(inventory.guild_id.clone())
                .or_default()
                .insert(inventory.user_id.clone(), inventory);
            count += 1;
        }
        debug!(entries = count, "inventory cache replaced");
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemType, LineItem};

    fn item(id: i64, guild_id: &str) -> Item {
        Item {
            id,
            guild_id: guild_id.into(),
            kind: ItemType::String,
            name: format!("item-{id}"),
            content: String::new(),
            price: 1,
            quantity: 0,
            remaining: 0,
        }
    }

    #[test]
    fn item_set_get_delete() {
        let cache = ItemCache::new();
        cache.set(1, item(1, "g1"));

        assert_eq!(cache.get(1).unwrap().name, "item-1");
        assert_eq!(cache.delete(1).unwrap().id, 1);
        assert!(cache.get(1).is_none());
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn filter_is_guild_scoped() {
        let cache = ItemCache::new();
        cache.replace_all([item(1, "g1"), item(2, "g2"), item(3, "g1")]);

        let mut ids: Vec<i64> = cache.filter("g1").into_iter().map(|i| i.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
        assert!(cache.get_in_guild("g2", 1).is_none());
        assert!(cache.get_in_guild("g1", 1).is_some());
    }

    #[test]
    fn replace_all_discards_previous_contents() {
        let cache = ItemCache::new();
        cache.set(9, item(9, "g1"));
        cache.replace_all([item(1, "g1")]);

        assert_eq!(cache.all().len(), 1);
        assert!(cache.get(9).is_none());
    }

    #[test]
    fn inventory_get_synthesizes_and_caches() {
        let cache = InventoryCache::new();
        assert!(cache.guild("g1").is_empty());

        let inventory = cache.get("g1", "u1");
        assert!(inventory.items.is_empty());
        assert_eq!(inventory.guild_id, "g1");
        assert_eq!(cache.guild("g1"), vec![inventory.clone()]);

        cache.get("g1", "u1");
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn inventory_set_upserts() {
        let cache = InventoryCache::new();
        let mut inventory = Inventory::empty("g1", "u1");
        inventory.items.push(LineItem {
            name: "a".into(),
            content: "b".into(),
            price: 1,
            quantity: 2,
            id: 1,
        });
        cache.set("g1", "u1", inventory.clone());
        assert_eq!(cache.get("g1", "u1"), inventory);

        cache.set("g1", "u1", Inventory::empty("g1", "u1"));
        assert!(cache.get("g1", "u1").items.is_empty());
        assert_eq!(cache.guild("g1").len(), 1);
        assert!(cache.guild("g2").is_empty());
    }

    #[test]
    fn stats_display() {
        let stats = CacheStats::default();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.to_string(), "hits=1 misses=1 rate=50.00%");
    }
}
