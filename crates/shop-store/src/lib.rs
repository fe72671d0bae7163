//! # shop-store
//!
//! Per-guild shop catalog and user inventories for a chat bot, held in
//! memory and mirrored to SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ShopManager   (mutations, business rules)   │
//! ├──────────────────────┬───────────────────────┤
//! │  ItemCache           │  InventoryCache       │
//! │  id -> Item          │  guild -> user -> Inv │
//! ├──────────────────────┴───────────────────────┤
//! │  ShopStore gateway   (SqliteStore)           │
//! │  Database (rusqlite WAL) + migrations        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Writes hit the cache first and are then persisted; a failed write is
//! reported but not rolled back.
//!
//! ## Quick start
//!
//! ```ignore
//! use shop_store::{NewItem, Outcome, ShopManager};
//!
//! let shop = ShopManager::open("data/shop.db").await?;
//! let created = shop.add_item(NewItem::new("guild-1", "Sword", "sharp", 50).quantity(3)).await?;
//! if let Some(item) = created.item() {
//!     assert_eq!(shop.buy_item("guild-1", "user-1", item.id, 1).await?, Outcome::Done);
//! }
//! ```

pub mod cache;
pub mod db;
pub mod error;
pub mod gateway;
pub mod migration;
pub mod model;
pub mod resolver;
pub mod shop;

// ── re-exports ───────────────────────────────────────────────────────

pub use cache::{CacheStats, InventoryCache, ItemCache};
pub use db::Database;
pub use error::{ShopError, ShopResult};
pub use gateway::{ShopStore, SqliteStore};
pub use model::{Inventory, Item, ItemType, LineItem, NewItem};
pub use resolver::{
    Guild, GuildRef, Interaction, Member, Message, User, UserRef, resolve_guild, resolve_user,
};
pub use shop::{AddItemOutcome, Outcome, ShopManager};
