//! Persistent store gateway.
//!
//! [`ShopStore`] is the narrow capability the [`crate::ShopManager`] uses to
//! reach the relational store: one method per statement it issues. It holds
//! no cache state. [`SqliteStore`] implements it over [`Database`], binding
//! every value as a parameter so quotes in names or contents persist
//! verbatim.
//!
//! Value columns of `items` are stored as text and decoded here.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{ShopError, ShopResult};
use crate::model::{Inventory, Item, LineItem, NewItem};

/// Statements the shop issues against its backing store.
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Create the `items` and `inventories` tables if absent.
    async fn ensure_schema(&self) -> ShopResult<()>;

    /// Full scan of `items`.
    async fn load_items(&self) -> ShopResult<Vec<Item>>;

    /// Full scan of `inventories`, with items blobs decoded.
    async fn load_inventories(&self) -> ShopResult<Vec<Inventory>>;

    /// Insert a new item. Returns the assigned id, or `None` when the store
    /// acknowledged the statement without producing a row.
    async fn insert_item(&self, item: &NewItem) -> ShopResult<Option<i64>>;

    /// Persist both stock fields of an item.
    async fn update_stock(&self, id: i64, quantity: u64, remaining: u64) -> ShopResult<()>;

    /// Persist only the `remaining` field of an item.
    async fn update_remaining(&self, id: i64, remaining: u64) -> ShopResult<()>;

    async fn delete_item(&self, id: i64) -> ShopResult<()>;

    /// Insert the inventory, or replace its items blob if the
    /// `(guild_id, user_id)` pair already exists.
    async fn upsert_inventory(&self, inventory: &Inventory) -> ShopResult<()>;
}

/// [`ShopStore`] over a SQLite [`Database`].
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl ShopStore for SqliteStore {
    async fn ensure_schema(&self) -> ShopResult<()> {
        self.db.run_migrations().await
    }

    #[instrument(skip(self))]
    async fn load_items(&self) -> ShopResult<Vec<Item>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, guild_id, type, name, content, price, quantity, remaining FROM items",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(ItemRow {
                            id: row.get(0)?,
                            guild_id: row.get(1)?,
                            kind: row.get(2)?,
                            name: row.get(3)?,
                            content: row.get(4)?,
                            price: row.get(5)?,
                            quantity: row.get(6)?,
                            remaining: row.get(7)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                debug!(rows = rows.len(), "items loaded");
                rows.into_iter().map(ItemRow::into_item).collect()
            })
            .await
    }

    #[instrument(skip(self))]
    async fn load_inventories(&self) -> ShopResult<Vec<Inventory>> {
        self.db
            .execute(|conn| {
                let mut stmt =
                    conn.prepare("SELECT guild_id, user_id, items FROM inventories")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(InventoryRow {
                            guild_id: row.get(0)?,
                            user_id: row.get(1)?,
                            items: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                debug!(rows = rows.len(), "inventories loaded");
                rows.into_iter().map(InventoryRow::into_inventory).collect()
            })
            .await
    }

    #[instrument(skip(self, item), fields(guild_id = %item.guild_id, name = %item.name))]
    async fn insert_item(&self, item: &NewItem) -> ShopResult<Option<i64>> {
        let item = item.clone();
        self.db
            .execute(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO items (guild_id, type, name, content, price, quantity, remaining) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                    rusqlite::params![
                        item.guild_id,
                        item.kind.as_str(),
                        item.name,
                        item.content,
                        item.price.to_string(),
                        item.quantity.to_string(),
                    ],
                )?;
                if inserted == 0 {
                    return Ok(None);
                }
                Ok(Some(conn.last_insert_rowid()))
            })
            .await
    }

    #[instrument(skip(self))]
    async fn update_stock(&self, id: i64, quantity: u64, remaining: u64) -> ShopResult<()> {
        self.db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE items SET remaining = ?2, quantity = ?3 WHERE id = ?1",
                    rusqlite::params![id, remaining.to_string(), quantity.to_string()],
                )?;
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    async fn update_remaining(&self, id: i64, remaining: u64) -> ShopResult<()> {
        self.db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE items SET remaining = ?2 WHERE id = ?1",
                    rusqlite::params![id, remaining.to_string()],
                )?;
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, id: i64) -> ShopResult<()> {
        self.db
            .execute(move |conn| {
                let deleted = conn.execute("DELETE FROM items WHERE id = ?1", rusqlite::params![id])?;
                debug!(deleted, "item row deleted");
                Ok(())
            })
            .await
    }

    #[instrument(skip(self, inventory), fields(guild_id = %inventory.guild_id, user_id = %inventory.user_id))]
    async fn upsert_inventory(&self, inventory: &Inventory) -> ShopResult<()> {
        let blob = serde_json::to_string(&inventory.items)?;
        let guild_id = inventory.guild_id.clone();
        let user_id = inventory.user_id.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO inventories (guild_id, user_id, items) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(guild_id, user_id) DO UPDATE SET items = excluded.items",
                    rusqlite::params![guild_id, user_id, blob],
                )?;
                Ok(())
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Internal row mapping
// ═══════════════════════════════════════════════════════════════════════

/// Raw `items` row, value columns still text.
struct ItemRow {
    id: i64,
    guild_id: Option<String>,
    kind: String,
    name: Option<String>,
    content: Option<String>,
    price: Option<String>,
    quantity: String,
    remaining: Option<String>,
}

impl ItemRow {
    fn into_item(self) -> ShopResult<Item> {
        Ok(Item {
            id: self.id,
            guild_id: self.guild_id.unwrap_or_default(),
            kind: self.kind.parse().map_err(|_| ShopError::Decode {
                table: "items",
                column: "type",
                value: self.kind.clone(),
            })?,
            name: self.name.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            price: parse_count("price", self.price.as_deref())?,
            quantity: parse_count("quantity", Some(&self.quantity))?,
            remaining: parse_count("remaining", self.remaining.as_deref())?,
        })
    }
}

/// Parse a numeric-as-text `items` column. SQL `NULL` reads as 0.
fn parse_count(column: &'static str, value: Option<&str>) -> ShopResult<u64> {
    let Some(value) = value else {
        return Ok(0);
    };
    value.trim().parse().map_err(|_| ShopError::Decode {
        table: "items",
        column,
        value: value.to_owned(),
    })
}

/// Raw `inventories` row, items still a JSON blob.
struct InventoryRow {
    guild_id: String,
    user_id: String,
    items: Option<String>,
}

impl InventoryRow {
    fn into_inventory(self) -> ShopResult<Inventory> {
        let items: Vec<LineItem> = match self.items.as_deref() {
            None | Some("") => Vec::new(),
            Some(blob) => serde_json::from_str(blob)?,
        };
        Ok(Inventory {
            guild_id: self.guild_id,
            user_id: self.user_id,
            items,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemType;

    async fn setup_store() -> SqliteStore {
        let store = SqliteStore::new(Database::open_in_memory().unwrap());
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn insert_and_load_item() {
        let store = setup_store().await;
        let new = NewItem::new("g1", "Badge", "shiny", 12)
            .kind(ItemType::Role)
            .quantity(4);

        let id = store.insert_item(&new).await.unwrap().unwrap();
        let items = store.load_items().await.unwrap();

        assert_eq!(items, vec![new.into_item(id)]);
    }

    #[tokio::test]
    async fn values_are_stored_as_text() {
        let store = setup_store().await;
        let id = store
            .insert_item(&NewItem::new("g1", "a", "b", 3).quantity(2))
            .await
            .unwrap()
            .unwrap();
        store.update_stock(id, 9, 1).await.unwrap();

        let (quantity, remaining): (String, String) = store
            .database()
            .execute(move |conn| {
                Ok(conn.query_row(
                    "SELECT quantity, remaining FROM items WHERE id = ?1",
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(quantity, "9");
        assert_eq!(remaining, "1");
    }

    #[tokio::test]
    async fn update_remaining_leaves_quantity() {
        let store = setup_store().await;
        let id = store
            .insert_item(&NewItem::new("g1", "a", "b", 3).quantity(5))
            .await
            .unwrap()
            .unwrap();
        store.update_remaining(id, 2).await.unwrap();

        let item = store.load_items().await.unwrap().remove(0);
        assert_eq!(item.quantity, 5);
        assert_eq!(item.remaining, 2);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let store = setup_store().await;
        let id = store
            .insert_item(&NewItem::new("g1", "a", "b", 3))
            .await
            .unwrap()
            .unwrap();
        store.delete_item(id).await.unwrap();
        assert!(store.load_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_inventory_replaces_blob() {
        let store = setup_store().await;
        let mut inventory = Inventory::empty("g1", "u1");
        store.upsert_inventory(&inventory).await.unwrap();

        inventory.items.push(LineItem {
            name: "a".into(),
            content: "b".into(),
            price: 1,
            quantity: 3,
            id: 1,
        });
        store.upsert_inventory(&inventory).await.unwrap();

        let loaded = store.load_inventories().await.unwrap();
        assert_eq!(loaded, vec![inventory]);
    }

    #[tokio::test]
    async fn malformed_numeric_column_is_a_decode_error() {
        let store = setup_store().await;
        store
            .database()
            .execute(|conn| {
                conn.execute(
                    "INSERT INTO items (guild_id, name, content, price, quantity, remaining) \
                     VALUES ('g1', 'a', 'b', 'lots', '0', '0')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.load_items().await.unwrap_err();
        assert!(matches!(
            err,
            ShopError::Decode {
                column: "price",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn null_items_blob_loads_empty() {
        let store = setup_store().await;
        store
            .database()
            .execute(|conn| {
                conn.execute(
                    "INSERT INTO inventories (guild_id, user_id, items) VALUES ('g1', 'u1', NULL)",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let loaded = store.load_inventories().await.unwrap();
        assert!(loaded[0].items.is_empty());
    }

    #[test]
    fn parse_count_trims_and_defaults() {
        assert_eq!(parse_count("price", Some(" 42 ")).unwrap(), 42);
        assert_eq!(parse_count("price", None).unwrap(), 0);
        assert!(parse_count("price", Some("-1")).is_err());
    }
}
