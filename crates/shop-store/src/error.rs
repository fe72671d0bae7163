//! Error types for the shop-store crate.
//!
//! Infrastructure failures surface as [`ShopError`] via [`ShopResult`].
//! Business-rule rejections are not errors; see [`crate::shop::Outcome`].

use thiserror::Error;

/// Alias for `Result<T, ShopError>`.
pub type ShopResult<T> = Result<T, ShopError>;

/// Errors that can occur in the store gateway or the mutation engine.
#[derive(Debug, Error)]
pub enum ShopError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization of an items blob failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// A persisted column could not be decoded into its in-memory type.
    #[error("malformed {table}.{column} value: {value:?}")]
    Decode {
        table: &'static str,
        column: &'static str,
        value: String,
    },

    /// Loading a table into the cache failed; the manager is not usable.
    #[error("failed to hydrate {table} cache: {source}")]
    Hydration {
        table: &'static str,
        #[source]
        source: Box<ShopError>,
    },

    /// An operation was invoked before the caches finished hydrating.
    #[error("shop manager is not ready, caches have not been hydrated")]
    NotReady,

    /// An invalid argument was provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for ShopError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

impl ShopError {
    /// Wrap `self` as a hydration failure of `table`.
    pub(crate) fn hydrating(self, table: &'static str) -> Self {
        Self::Hydration {
            table,
            source: Box::new(self),
        }
    }
}
