// Core infrastructure modules
pub mod blob_store; // Photo blob storage
pub mod sqlite_store; // SQLite record store
pub mod store; // Store interface and record types

pub use blob_store::{BlobStore, Cleanup, LocalBlobStore, MemoryBlobStore};
pub use sqlite_store::SqliteStore;
pub use store::{Record, RecordStore, SortOrder, StoreTransaction};
