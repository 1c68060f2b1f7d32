// Store Interface - transactional relational access used by the record service
// Table and column names come from the schema registry; values are always bound.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppResult;

/// Runtime record: field name to scalar value
pub type Record = serde_json::Map<String, Value>;

/// Validated ordering for list reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub column: String,
    pub descending: bool,
}

impl SortOrder {
    pub fn ascending(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: false,
        }
    }

    pub fn descending(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }
}

/// Store handle; each logical operation runs in its own transaction
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;
}

/// One open transaction. Dropping it without `commit` rolls back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert `rows`, reading `columns` from each; returns the new ids
    async fn insert(&mut self, table: &str, columns: &[String], rows: &[Record])
        -> AppResult<Vec<i64>>;

    /// Apply `values` to the row `id`; returns the ids of updated rows
    async fn update(&mut self, table: &str, values: &Record, id: i64) -> AppResult<Vec<i64>>;

    /// Delete the row `id`; returns `returning` of every deleted row
    async fn delete(&mut self, table: &str, id: i64, returning: &str) -> AppResult<Vec<Value>>;

    /// Select `columns` (all when empty) of rows equal to `condition` on every key
    async fn select(
        &mut self,
        table: &str,
        columns: &[String],
        condition: Option<&Record>,
        order: Option<&SortOrder>,
    ) -> AppResult<Vec<Record>>;

    async fn commit(&mut self) -> AppResult<()>;
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
