//! CLI entry point for the shop.
//!
//! Each invocation opens the database, hydrates a [`ShopManager`] and runs a
//! single listing or mutation against it. Business-rule rejections are
//! printed; infrastructure errors exit non-zero.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shop_store::{Inventory, Item, ItemType, NewItem, Outcome, ShopManager};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::ShopConfig;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Manage guild shops and user inventories.
#[derive(Parser)]
#[command(name = "shop", version, about = "Guild shop and inventory manager")]
struct Cli {
    /// Configuration file (defaults to config/shop.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding config and SHOP_DATABASE.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a guild's items.
    Items {
        #[arg(long)]
        guild: String,
    },

    /// Add an item to a guild's shop.
    AddItem {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long, value_enum, default_value_t = KindArg::Text)]
        kind: KindArg,
        #[arg(long)]
        price: u64,
        /// Stock size; 0 for infinite.
        #[arg(long, default_value_t = 0)]
        quantity: u64,
    },

    /// Remove an item from the shops.
    RemoveItem {
        #[arg(long)]
        id: i64,
    },

    /// Set the stock size of a finite item.
    SetQuantity {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        id: i64,
        #[arg(long, allow_hyphen_values = true)]
        quantity: i64,
    },

    /// Set the remaining units of a finite item.
    SetRemaining {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        id: i64,
        #[arg(long, allow_hyphen_values = true)]
        quantity: i64,
    },

    /// Make an item infinite, or finite again with --off --value N.
    SetInfinite {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        off: bool,
        #[arg(long)]
        value: Option<u64>,
    },

    /// Buy an item for a user.
    Buy {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        id: i64,
        #[arg(long, default_value_t = 1)]
        quantity: u64,
    },

    /// Show a user's inventory.
    Inventory {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
    },

    /// Credit units of an item to a user's inventory.
    Give {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        id: i64,
        #[arg(long, default_value_t = 1)]
        quantity: u64,
    },

    /// Take units of an item from a user's inventory.
    Take {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        id: i64,
        #[arg(long, default_value_t = 1)]
        quantity: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    #[value(name = "string")]
    Text,
    Role,
}

impl From<KindArg> for ItemType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Text => ItemType::String,
            KindArg::Role => ItemType::Role,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = ShopConfig::load(cli.config.as_deref())?;
    config.apply_env();
    if let Some(database) = cli.database {
        config.database.path = database;
    }

    init_tracing(&config.log.level);
    debug!(database = %config.database.path.display(), "configuration resolved");

    let shop = ShopManager::open(config.database.path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to start shop on {}",
                config.database.path.display()
            )
        })?;

    run(&shop, cli.command).await?;

    let (items, inventories) = shop.cache_stats();
    debug!(%items, %inventories, "cache stats");
    Ok(())
}

async fn run(shop: &ShopManager, command: Commands) -> Result<()> {
    match command {
        Commands::Items { guild } => {
            let mut items = shop.guild_items(&guild)?;
            items.sort_by_key(|item| item.id);
            if items.is_empty() {
                println!("No items in guild {guild}.");
            }
            for item in &items {
                print_item(item);
            }
        }
        Commands::AddItem {
            guild,
            name,
            content,
            kind,
            price,
            quantity,
        } => {
            let new = NewItem::new(&guild, name, content, price)
                .kind(kind.into())
                .quantity(quantity);
            let outcome = shop.add_item(new).await?;
            match outcome.item() {
                Some(item) => print_item(item),
                None => println!("{outcome}"),
            }
        }
        Commands::RemoveItem { id } => {
            shop.remove_item(id).await?;
            println!("removed item {id}");
        }
        Commands::SetQuantity {
            guild,
            id,
            quantity,
        } => {
            let outcome = shop.update_quantity(&guild, id, quantity).await?;
            report(shop, outcome, id)?;
        }
        Commands::SetRemaining {
            guild,
            id,
            quantity,
        } => {
            let outcome = shop.update_remaining(&guild, id, quantity).await?;
            report(shop, outcome, id)?;
        }
        Commands::SetInfinite {
            guild,
            id,
            off,
            value,
        } => {
            let outcome = shop.set_infinite(&guild, id, !off, value).await?;
            report(shop, outcome, id)?;
        }
        Commands::Buy {
            guild,
            user,
            id,
            quantity,
        } => {
            let outcome = shop.buy_item(&guild, &user, id, quantity).await?;
            println!("{outcome}");
            if outcome.is_done() {
                print_inventory(&shop.get_inventory(&guild, &user)?);
            }
        }
        Commands::Inventory { guild, user } => {
            print_inventory(&shop.get_inventory(&guild, &user)?);
        }
        Commands::Give {
            guild,
            user,
            id,
            quantity,
        } => {
            let Some(item) = shop.item(id)? else {
                println!("{}", Outcome::NoItem);
                return Ok(());
            };
            shop.add_inventory(&guild, &user, &item, quantity).await?;
            print_inventory(&shop.get_inventory(&guild, &user)?);
        }
        Commands::Take {
            guild,
            user,
            id,
            quantity,
        } => {
            let Some(item) = shop.item(id)? else {
                println!("{}", Outcome::NoItem);
                return Ok(());
            };
            shop.remove_inventory(&guild, &user, &item, quantity).await?;
            print_inventory(&shop.get_inventory(&guild, &user)?);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Print the outcome of a stock edit, and the item when it was applied.
fn report(shop: &ShopManager, outcome: Outcome, id: i64) -> Result<()> {
    println!("{outcome}");
    if outcome.is_done()
        && let Some(item) = shop.item(id)?
    {
        print_item(&item);
    }
    Ok(())
}

fn print_item(item: &Item) {
    let stock = if item.is_infinite() {
        "infinite".to_string()
    } else {
        format!("{}/{}", item.remaining, item.quantity)
    };
    println!(
        "  #{:<5} {:<24} {:>8}  {:<6} stock {:<10} {}",
        item.id, item.name, item.price, item.kind, stock, item.content
    );
}

fn print_inventory(inventory: &Inventory) {
    println!(
        "Inventory of {} in {}:",
        inventory.user_id, inventory.guild_id
    );
    if inventory.items.is_empty() {
        println!("  (empty)");
    }
    for line in &inventory.items {
        println!(
            "  {:>4} x {:<24} {:>8}  from #{}",
            line.quantity, line.name, line.price, line.id
        );
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber; `RUST_LOG` wins over `default_level`.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_negative_quantity() {
        let cli = Cli::try_parse_from([
            "shop",
            "set-quantity",
            "--guild",
            "g1",
            "--id",
            "3",
            "--quantity",
            "-4",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::SetQuantity { quantity: -4, .. }
        ));
    }

    #[test]
    fn global_database_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shop",
            "items",
            "--guild",
            "g1",
            "--database",
            "/tmp/x.db",
        ])
        .unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn add_item_defaults() {
        let cli = Cli::try_parse_from([
            "shop", "add-item", "--guild", "g1", "--name", "Sword", "--price", "5",
        ])
        .unwrap();
        let Commands::AddItem {
            quantity, kind, ..
        } = cli.command
        else {
            panic!("expected add-item");
        };
        assert_eq!(quantity, 0);
        assert_eq!(ItemType::from(kind), ItemType::String);
    }

    #[tokio::test]
    async fn run_buy_against_temp_database() {
        let dir = tempfile::tempdir().unwrap();
        let shop = ShopManager::open(dir.path().join("shop.db")).await.unwrap();
        let item = shop
            .add_item(NewItem::new("g1", "Sword", "sharp", 5).quantity(2))
            .await
            .unwrap();
        let id = item.item().unwrap().id;

        run(
            &shop,
            Commands::Buy {
                guild: "g1".into(),
                user: "u1".into(),
                id,
                quantity: 5,
            },
        )
        .await
        .unwrap();

        assert_eq!(shop.item(id).unwrap().unwrap().remaining, 0);
        assert_eq!(shop.get_inventory("g1", "u1").unwrap().items[0].quantity, 2);
    }
}
