use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{
    Sqlite, SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, QueryBuilder, Row, Transaction, TypeInfo, ValueRef};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::infrastructure::store::{quote_ident, Record, RecordStore, SortOrder, StoreTransaction};
use crate::record_schema::PRIMARY_KEY;

/// SQLite implementation of the record store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a database file, creating it (and its directory) if missing
    pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                AppError::ConfigurationError(format!(
                    "Invalid database url '{}': {}",
                    database_url, e
                ))
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        if let Some(parent) = database_file(database_url).and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::DatabaseError(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to {}: {}", database_url, e))
            })?;

        info!("Connected to SQLite database at {}", database_url);
        Ok(Self { pool })
    }

    /// Single-connection in-memory database with tables created
    pub async fn new_in_memory() -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // The database lives as long as its only connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e))
            })?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create the record tables if they do not exist
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(70) NOT NULL,
                photo_path VARCHAR(250) NOT NULL,
                gender TEXT NOT NULL CHECK (gender IN ('male', 'female')),
                born_at TEXT NOT NULL,
                address VARCHAR(150) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create users table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS phones (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                type TEXT NOT NULL CHECK (type IN ('mobile', 'city')),
                number VARCHAR(20) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create phones table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                type TEXT NOT NULL CHECK (type IN ('personal', 'work')),
                email VARCHAR(255)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create emails table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_phones_user_id ON phones(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create phones index: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_emails_user_id ON emails(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create emails index: {}", e)))?;

        debug!("Record tables initialized");
        Ok(())
    }

    /// Health check to verify database connectivity
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;
        Ok(Box::new(SqliteTransaction { tx: Some(tx) }))
    }
}

/// Open SQLite transaction; rolled back on drop unless committed
pub struct SqliteTransaction {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteTransaction {
    fn connection(&mut self) -> AppResult<&mut SqliteConnection> {
        self.tx
            .as_mut()
            .map(|tx| &mut **tx)
            .ok_or_else(|| AppError::DatabaseError("Transaction already committed".to_string()))
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn insert(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Record],
    ) -> AppResult<Vec<i64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        if columns.is_empty() {
            return Err(AppError::DatabaseError(format!(
                "No columns given for insert into {}",
                table
            )));
        }

        let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ");
        qb.push(quote_ident(table))
            .push(" (")
            .push(column_list(columns))
            .push(") VALUES ");
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push("(");
            for (j, column) in columns.iter().enumerate() {
                if j > 0 {
                    qb.push(", ");
                }
                push_value(&mut qb, row.get(column).unwrap_or(&Value::Null));
            }
            qb.push(")");
        }
        qb.push(" RETURNING ").push(quote_ident(PRIMARY_KEY));

        let inserted = qb
            .build()
            .fetch_all(self.connection()?)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to insert into {}: {}", table, e))
            })?;

        debug!("Inserted {} rows into {}", inserted.len(), table);
        inserted
            .iter()
            .map(|row| row.try_get::<i64, _>(0).map_err(AppError::from))
            .collect()
    }

    async fn update(&mut self, table: &str, values: &Record, id: i64) -> AppResult<Vec<i64>> {
        if values.is_empty() {
            return Err(AppError::DatabaseError(format!(
                "No columns given for update of {} {}",
                table, id
            )));
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE ");
        qb.push(quote_ident(table)).push(" SET ");
        for (i, (column, value)) in values.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(quote_ident(column)).push(" = ");
            push_value(&mut qb, value);
        }
        qb.push(" WHERE ").push(quote_ident(PRIMARY_KEY)).push(" = ");
        qb.push_bind(id);
        qb.push(" RETURNING ").push(quote_ident(PRIMARY_KEY));

        let updated = qb
            .build()
            .fetch_all(self.connection()?)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to update {} {}: {}", table, id, e))
            })?;

        updated
            .iter()
            .map(|row| row.try_get::<i64, _>(0).map_err(AppError::from))
            .collect()
    }

    async fn delete(&mut self, table: &str, id: i64, returning: &str) -> AppResult<Vec<Value>> {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        qb.push(quote_ident(table))
            .push(" WHERE ")
            .push(quote_ident(PRIMARY_KEY))
            .push(" = ");
        qb.push_bind(id);
        qb.push(" RETURNING ").push(quote_ident(returning));

        let deleted = qb
            .build()
            .fetch_all(self.connection()?)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to delete {} {}: {}", table, id, e))
            })?;

        deleted.iter().map(|row| decode_value(row, 0)).collect()
    }

    async fn select(
        &mut self,
        table: &str,
        columns: &[String],
        condition: Option<&Record>,
        order: Option<&SortOrder>,
    ) -> AppResult<Vec<Record>> {
        let projection = if columns.is_empty() {
            "*".to_string()
        } else {
            column_list(columns)
        };

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        qb.push(projection).push(" FROM ").push(quote_ident(table));

        if let Some(condition) = condition {
            for (i, (column, value)) in condition.iter().enumerate() {
                qb.push(if i == 0 { " WHERE " } else { " AND " });
                qb.push(quote_ident(column)).push(" = ");
                push_value(&mut qb, value);
            }
        }

        match order {
            Some(order) => {
                qb.push(" ORDER BY ")
                    .push(quote_ident(&order.column))
                    .push(if order.descending { " DESC" } else { " ASC" });
            }
            None => {
                qb.push(" ORDER BY ").push(quote_ident(PRIMARY_KEY));
            }
        }

        let rows = qb
            .build()
            .fetch_all(self.connection()?)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to select from {}: {}", table, e))
            })?;

        rows.iter().map(decode_row).collect()
    }

    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::DatabaseError("Transaction already committed".to_string()))?;
        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))
    }
}

/// File path of a `sqlite:` url; `None` for in-memory databases
fn database_file(url: &str) -> Option<&Path> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next()?;
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(Path::new(path))
    }
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => {
            qb.push_bind(None::<String>);
        }
        Value::Bool(b) => {
            qb.push_bind(*b);
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                qb.push_bind(i);
            }
            None => {
                qb.push_bind(n.as_f64().unwrap_or_default());
            }
        },
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        other => {
            qb.push_bind(other.to_string());
        }
    }
}

fn decode_row(row: &SqliteRow) -> AppResult<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        record.insert(column.name().to_string(), decode_value(row, column.ordinal())?);
    }
    Ok(record)
}

/// Decode by the runtime storage class of the value
fn decode_value(row: &SqliteRow, index: usize) -> AppResult<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage_class = raw.type_info().name().to_string();

    let value = match storage_class.as_str() {
        "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
        "REAL" => Value::from(row.try_get::<f64, _>(index)?),
        "BLOB" => Value::from(hex::encode(row.try_get::<Vec<u8>, _>(index)?)),
        _ => Value::from(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}
