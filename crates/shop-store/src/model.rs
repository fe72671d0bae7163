//! Records held in the caches and mirrored in the `items` and
//! `inventories` tables.

use serde::{Deserialize, Serialize};

use crate::error::{ShopError, ShopResult};
use crate::resolver::{GuildRef, resolve_guild};

// ═══════════════════════════════════════════════════════════════════════
//  Items
// ═══════════════════════════════════════════════════════════════════════

/// What a purchased item grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Free-form text content.
    #[default]
    String,
    /// A guild role, `content` holding the role id.
    Role,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Role => "role",
        }
    }
}

impl std::str::FromStr for ItemType {
    type Err = ShopError;

    fn from_str(s: &str) -> ShopResult<Self> {
        match s {
            "string" => Ok(Self::String),
            "role" => Ok(Self::Role),
            other => Err(ShopError::InvalidArgument(format!(
                "unknown item type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One sellable entry of one guild's shop.
///
/// A `quantity` of 0 means infinite stock; `remaining` is then ignored and
/// kept at 0. Otherwise `remaining <= quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Assigned by the store on insert, unique across guilds.
    pub id: i64,
    pub guild_id: String,
    #[serde(rename = "type")]
    pub kind: ItemType,
    pub name: String,
    pub content: String,
    pub price: u64,
    pub quantity: u64,
    pub remaining: u64,
}

impl Item {
    /// Whether stock tracking is disabled for this item.
    pub fn is_infinite(&self) -> bool {
        self.quantity == 0
    }

    /// Units a buyer asking for `wanted` would actually get.
    pub fn buyable(&self, wanted: u64) -> u64 {
        if self.is_infinite() {
            wanted
        } else {
            self.remaining.min(wanted)
        }
    }
}

/// Input for [`crate::ShopManager::add_item`].
///
/// ```ignore
/// let item = NewItem::new("guild-1", "Sword", "a sharp sword", 50).quantity(10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub guild_id: String,
    pub name: String,
    pub content: String,
    pub kind: ItemType,
    pub price: u64,
    /// Initial stock, also used as the initial `remaining`. 0 is infinite.
    pub quantity: u64,
}

impl NewItem {
    /// A string item with infinite stock.
    pub fn new<'a>(
        guild: impl Into<GuildRef<'a>>,
        name: impl Into<String>,
        content: impl Into<String>,
        price: u64,
    ) -> Self {
        Self {
            guild_id: resolve_guild(guild),
            name: name.into(),
            content: content.into(),
            kind: ItemType::default(),
            price,
            quantity: 0,
        }
    }

    pub fn kind(mut self, kind: ItemType) -> Self {
        self.kind = kind;
        self
    }

    pub fn quantity(mut self, quantity: u64) -> Self {
        self.quantity = quantity;
        self
    }

    /// The cached record once the store has assigned `id`.
    pub(crate) fn into_item(self, id: i64) -> Item {
        Item {
            id,
            guild_id: self.guild_id,
            kind: self.kind,
            name: self.name,
            content: self.content,
            price: self.price,
            quantity: self.quantity,
            remaining: self.quantity,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Inventories
// ═══════════════════════════════════════════════════════════════════════

/// Snapshot of an item's attributes at acquisition time plus the owned
/// quantity. Outlives the item if it is removed from the shop.
///
/// Field order matches the persisted JSON blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub content: String,
    pub price: u64,
    pub quantity: u64,
    /// Id of the item this line was first acquired from.
    pub id: i64,
}

impl LineItem {
    /// Lines are merged on name, content and price, not on id.
    fn represents(&self, item: &Item) -> bool {
        self.name == item.name && self.content == item.content && self.price == item.price
    }
}

/// Everything one user owns within one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub guild_id: String,
    pub user_id: String,
    pub items: Vec<LineItem>,
}

impl Inventory {
    pub fn empty(guild_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            user_id: user_id.into(),
            items: Vec::new(),
        }
    }

    /// Add `quantity` units of `item`, merging into an existing line. The
    /// owned quantity saturates at `u64::MAX`.
    pub fn credit(&mut self, item: &Item, quantity: u64) {
        match self.items.iter_mut().find(|line| line.represents(item)) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.items.push(LineItem {
                name: item.name.clone(),
                content: item.content.clone(),
                price: item.price,
                quantity,
                id: item.id,
            }),
        }
    }

    /// Take up to `quantity` units of `item` away. Lines that reach zero
    /// are kept. Returns the number of units actually removed.
    pub fn debit(&mut self, item: &Item, quantity: u64) -> u64 {
        match self.items.iter_mut().find(|line| line.represents(item)) {
            Some(line) => {
                let taken = quantity.min(line.quantity);
                line.quantity -= taken;
                taken
            }
            None => 0,
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
