//! The shop manager: cached catalog and inventories plus the operations
//! that mutate them.
//!
//! Every mutation is applied to the cache first, synchronously, and then
//! persisted through the [`ShopStore`]. A failed store write is returned to
//! the caller but the cache mutation stands, so cache and store can diverge
//! after an infrastructure failure. There is no rollback and no retry.
//!
//! Business-rule rejections are returned as [`Outcome`] values, never as
//! errors.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStats, InventoryCache, ItemCache};
use crate::db::Database;
use crate::error::{ShopError, ShopResult};
use crate::gateway::{ShopStore, SqliteStore};
use crate::model::{Inventory, Item, NewItem};
use crate::resolver::{GuildRef, UserRef, resolve_guild, resolve_user};

// ═══════════════════════════════════════════════════════════════════════
//  Outcomes
// ═══════════════════════════════════════════════════════════════════════

/// Result of a mutation that passed or failed a business rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The mutation was applied and persisted.
    Done,
    /// No item with that id (in that guild, where scoped).
    NoItem,
    /// Stock edits are rejected on infinite items.
    ItemIsInfinite,
    /// Leaving infinite mode requires a non-zero quantity.
    MissingFiniteValue,
    /// The item has no remaining stock.
    NothingBuyable,
}

impl Outcome {
    pub fn is_done(self) -> bool {
        self == Self::Done
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::NoItem => "no item",
            Self::ItemIsInfinite => "item is infinite",
            Self::MissingFiniteValue => "set as not infinite, but no value",
            Self::NothingBuyable => "nothing buyable",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`ShopManager::add_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddItemOutcome {
    Created(Item),
    /// The store accepted the insert but returned no row id.
    NoReply,
}

impl AddItemOutcome {
    pub fn item(&self) -> Option<&Item> {
        match self {
            Self::Created(item) => Some(item),
            Self::NoReply => None,
        }
    }
}

impl fmt::Display for AddItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(item) => write!(f, "created item {}", item.id),
            Self::NoReply => f.write_str("no reply from database"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  ShopManager
// ═══════════════════════════════════════════════════════════════════════

/// Owner of the item and inventory caches.
///
/// Not usable until [`ShopManager::hydrate`] has completed; every public
/// operation fails with [`ShopError::NotReady`] before that.
/// [`ShopManager::start`] does both steps.
pub struct ShopManager {
    store: Arc<dyn ShopStore>,
    items: ItemCache,
    inventories: InventoryCache,
    ready: AtomicBool,
}

impl ShopManager {
    /// A manager with empty, unhydrated caches.
    pub fn new(store: Arc<dyn ShopStore>) -> Self {
        Self {
            store,
            items: ItemCache::new(),
            inventories: InventoryCache::new(),
            ready: AtomicBool::new(false),
        }
    }

    /// Create the manager, ensure the schema exists and hydrate the caches.
    pub async fn start(store: Arc<dyn ShopStore>) -> ShopResult<Self> {
        let shop = Self::new(store);
        shop.hydrate().await?;
        Ok(shop)
    }

    /// Open the SQLite database at `path` and start a manager on it.
    pub async fn open(path: impl AsRef<Path> + Send + 'static) -> ShopResult<Self> {
        let db = Database::open_and_migrate(path).await?;
        Self::start(Arc::new(SqliteStore::new(db))).await
    }

    /// Ensure the schema, then replace both caches from full table scans
    /// issued concurrently. Marks the manager ready on success only.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> ShopResult<()> {
        self.ready.store(false, Ordering::Release);
        self.store.ensure_schema().await?;

        let (items, inventories) = tokio::try_join!(
            async {
                self.store
                    .load_items()
                    .await
                    .map_err(|e| e.hydrating("items"))
            },
            async {
                self.store
                    .load_inventories()
                    .await
                    .map_err(|e| e.hydrating("inventories"))
            },
        )?;

        let (item_count, inventory_count) = (items.len(), inventories.len());
        self.items.replace_all(items);
        self.inventories.replace_all(inventories);
        self.ready.store(true, Ordering::Release);

        info!(
            items = item_count,
            inventories = inventory_count,
            "shop caches hydrated"
        );
        Ok(())
    }

    /// Whether hydration has completed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn ensure_ready(&self) -> ShopResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ShopError::NotReady)
        }
    }

    /// Lookup counters of the item and inventory caches.
    pub fn cache_stats(&self) -> (&CacheStats, &CacheStats) {
        (self.items.stats(), self.inventories.stats())
    }

    // ── reads ────────────────────────────────────────────────────────

    /// Every cached item, across guilds.
    pub fn items(&self) -> ShopResult<Vec<Item>> {
        self.ensure_ready()?;
        Ok(self.items.all())
    }

    /// A single item by id, regardless of guild.
    pub fn item(&self, id: i64) -> ShopResult<Option<Item>> {
        self.ensure_ready()?;
        Ok(self.items.get(id))
    }

    /// Every item of one guild's shop.
    pub fn guild_items<'a>(&self, guild: impl Into<GuildRef<'a>>) -> ShopResult<Vec<Item>> {
        self.ensure_ready()?;
        Ok(self.items.filter(&resolve_guild(guild)))
    }

    /// A user's inventory in a guild. An empty one is cached on first
    /// access; it is only persisted by a later mutation.
    pub fn get_inventory<'g, 'u>(
        &self,
        guild: impl Into<GuildRef<'g>>,
        user: impl Into<UserRef<'u>>,
    ) -> ShopResult<Inventory> {
        self.ensure_ready()?;
        Ok(self
            .inventories
            .get(&resolve_guild(guild), &resolve_user(user)))
    }

    /// Every cached inventory of a guild.
    pub fn inventories<'a>(&self, guild: impl Into<GuildRef<'a>>) -> ShopResult<Vec<Inventory>> {
        self.ensure_ready()?;
        Ok(self.inventories.guild(&resolve_guild(guild)))
    }

    // ── catalog mutations ────────────────────────────────────────────

    /// Insert a new item. `remaining` starts equal to `quantity`.
    #[instrument(skip(self, new), fields(guild_id = %new.guild_id, name = %new.name))]
    pub async fn add_item(&self, new: NewItem) -> ShopResult<AddItemOutcome> {
        self.ensure_ready()?;

        let Some(id) = self.store.insert_item(&new).await? else {
            warn!("store returned no id for inserted item");
            return Ok(AddItemOutcome::NoReply);
        };

        let item = new.into_item(id);
        self.items.set(id, item.clone());
        info!(item_id = id, "item added");
        Ok(AddItemOutcome::Created(item))
    }

    /// Remove an item from the catalog. The cache entry is dropped before
    /// the delete is sent, and stays dropped if the delete fails.
    /// Inventory lines acquired from the item are untouched.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, id: i64) -> ShopResult<()> {
        self.ensure_ready()?;

        if self.items.delete(id).is_none() {
            debug!(item_id = id, "removing item absent from cache");
        }
        self.store.delete_item(id).await
    }

    /// Set the stock size of a finite item to `|quantity|`, clamping
    /// `remaining` down to it.
    #[instrument(skip(self, guild))]
    pub async fn update_quantity<'a>(
        &self,
        guild: impl Into<GuildRef<'a>>,
        item_id: i64,
        quantity: i64,
    ) -> ShopResult<Outcome> {
        self.ensure_ready()?;

        let mut item = match self.finite_item(guild, item_id) {
            Ok(item) => item,
            Err(outcome) => return Ok(outcome),
        };
        item.quantity = quantity.unsigned_abs();
        item.remaining = item.remaining.min(item.quantity);
        self.persist_stock(item).await
    }

    /// Set the remaining units of a finite item to `|quantity|`, raising
    /// `quantity` if the new remaining exceeds it.
    #[instrument(skip(self, guild))]
    pub async fn update_remaining<'a>(
        &self,
        guild: impl Into<GuildRef<'a>>,
        item_id: i64,
        quantity: i64,
    ) -> ShopResult<Outcome> {
        self.ensure_ready()?;

        let mut item = match self.finite_item(guild, item_id) {
            Ok(item) => item,
            Err(outcome) => return Ok(outcome),
        };
        item.remaining = quantity.unsigned_abs();
        item.quantity = item.quantity.max(item.remaining);
        self.persist_stock(item).await
    }

    /// Switch an item into or out of infinite mode.
    ///
    /// Entering zeroes both stock fields. Leaving requires a non-zero
    /// `value`, which becomes the new quantity; remaining is bounded into
    /// `[min(remaining, value), value]`, which leaves the item fully
    /// stocked.
    #[instrument(skip(self, guild))]
    pub async fn set_infinite<'a>(
        &self,
        guild: impl Into<GuildRef<'a>>,
        item_id: i64,
        infinite: bool,
        value: Option<u64>,
    ) -> ShopResult<Outcome> {
        self.ensure_ready()?;

        let Some(mut item) = self.items.get_in_guild(&resolve_guild(guild), item_id) else {
            return Ok(Outcome::NoItem);
        };

        if infinite {
            item.quantity = 0;
            item.remaining = 0;
        } else {
            let Some(value) = value.filter(|v| *v != 0) else {
                return Ok(Outcome::MissingFiniteValue);
            };
            item.remaining = value.clamp(item.remaining.min(value), value);
            item.quantity = value;
        }
        self.persist_stock(item).await
    }

    // ── inventory mutations ──────────────────────────────────────────

    /// Credit `quantity` units of `item` to a user's inventory, merging
    /// into the line with the same name, content and price.
    #[instrument(skip(self, guild, user, item), fields(item_id = item.id))]
    pub async fn add_inventory<'g, 'u>(
        &self,
        guild: impl Into<GuildRef<'g>>,
        user: impl Into<UserRef<'u>>,
        item: &Item,
        quantity: u64,
    ) -> ShopResult<Outcome> {
        self.ensure_ready()?;
        self.credit(&resolve_guild(guild), &resolve_user(user), item, quantity)
            .await?;
        Ok(Outcome::Done)
    }

    /// Take up to `quantity` units of `item` from a user's inventory. A
    /// missing line is a no-op; the inventory is persisted either way.
    #[instrument(skip(self, guild, user, item), fields(item_id = item.id))]
    pub async fn remove_inventory<'g, 'u>(
        &self,
        guild: impl Into<GuildRef<'g>>,
        user: impl Into<UserRef<'u>>,
        item: &Item,
        quantity: u64,
    ) -> ShopResult<Outcome> {
        self.ensure_ready()?;

        let (guild_id, user_id) = (resolve_guild(guild), resolve_user(user));
        let mut inventory = self.inventories.get(&guild_id, &user_id);
        let taken = inventory.debit(item, quantity);
        debug!(%guild_id, %user_id, taken, "inventory debited");

        self.inventories.set(&guild_id, &user_id, inventory.clone());
        self.store.upsert_inventory(&inventory).await?;
        Ok(Outcome::Done)
    }

    /// Move up to `quantity` units of item `item_id` from the shop into a
    /// user's inventory.
    ///
    /// The item is looked up by id alone, not within `guild`. The inventory
    /// is credited and persisted first, then the stock is debited and
    /// persisted. If the second write fails the inventory keeps the units
    /// while the persisted `remaining` does not reflect the sale.
    #[instrument(skip(self, guild, user))]
    pub async fn buy_item<'g, 'u>(
        &self,
        guild: impl Into<GuildRef<'g>>,
        user: impl Into<UserRef<'u>>,
        item_id: i64,
        quantity: u64,
    ) -> ShopResult<Outcome> {
        self.ensure_ready()?;

        let Some(item) = self.items.get(item_id) else {
            return Ok(Outcome::NoItem);
        };

        let (guild_id, user_id) = (resolve_guild(guild), resolve_user(user));
        if item.guild_id != guild_id {
            warn!(
                item_id,
                item_guild = %item.guild_id,
                buyer_guild = %guild_id,
                "buying an item listed in another guild"
            );
        }

        let buyable = item.buyable(quantity);
        if buyable == 0 {
            return Ok(Outcome::NothingBuyable);
        }

        self.credit(&guild_id, &user_id, &item, buyable).await?;

        if item.is_infinite() {
            return Ok(Outcome::Done);
        }

        // Re-read: the entry may have changed while the credit was persisted.
        let Some(mut current) = self.items.get(item_id) else {
            warn!(item_id, "item removed during purchase, stock not debited");
            return Ok(Outcome::Done);
        };
        current.remaining = current.remaining.saturating_sub(buyable);
        let remaining = current.remaining;
        self.items.set(item_id, current);
        self.store.update_remaining(item_id, remaining).await?;

        info!(item_id, %user_id, bought = buyable, remaining, "item bought");
        Ok(Outcome::Done)
    }

    // ── internals ────────────────────────────────────────────────────

    /// The item `item_id` of `guild`, or the outcome rejecting a stock edit.
    fn finite_item<'a>(
        &self,
        guild: impl Into<GuildRef<'a>>,
        item_id: i64,
    ) -> Result<Item, Outcome> {
        let item = self
            .items
            .get_in_guild(&resolve_guild(guild), item_id)
            .ok_or(Outcome::NoItem)?;
        if item.is_infinite() {
            return Err(Outcome::ItemIsInfinite);
        }
        Ok(item)
    }

    async fn persist_stock(&self, item: Item) -> ShopResult<Outcome> {
        let (id, quantity, remaining) = (item.id, item.quantity, item.remaining);
        self.items.set(id, item);
        self.store.update_stock(id, quantity, remaining).await?;
        debug!(item_id = id, quantity, remaining, "stock updated");
        Ok(Outcome::Done)
    }

    async fn credit(
        &self,
        guild_id: &str,
        user_id: &str,
        item: &Item,
        quantity: u64,
    ) -> ShopResult<()> {
        let mut inventory = self.inventories.get(guild_id, user_id);
        inventory.credit(item, quantity);
        debug!(guild_id, user_id, item_id = item.id, quantity, "inventory credited");

        self.inventories.set(guild_id, user_id, inventory.clone());
        self.store.upsert_inventory(&inventory).await
    }
}

// ── tests ────────────────────────────────────────────────────────────
