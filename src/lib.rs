// User Records - schema-driven validation and storage for users, emails and phones

// Record schema framework and validation engine
pub mod record_schema;
pub mod validation;

// Schema Definitions - one per record type
pub mod schemas;

// Infrastructure - record store and blob store
pub mod infrastructure;

// Services and HTTP interface
pub mod services;
pub mod record_interface;

// Application wiring
pub mod app_state;
pub mod config;

// Common utilities
pub mod error;
pub mod data_seeder;

// Re-exports for convenience
pub use error::{AppError, AppResult};
