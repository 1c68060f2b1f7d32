// Fill the configured database with generated users, emails and phones

use anyhow::Context;
use std::env;
use tracing_subscriber::EnvFilter;

use user_records::{
    config::Config, data_seeder::seed_sample_data, infrastructure::SqliteStore,
    schemas::create_schema_registry,
};

const DEFAULT_ROWS: usize = 500;
const SEED: u64 = 42;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let rows = match env::var("SAMPLE_ROWS") {
        Ok(value) => value.parse().context("SAMPLE_ROWS must be a number")?,
        Err(_) => DEFAULT_ROWS,
    };

    let registry = create_schema_registry()?;
    let store = SqliteStore::connect(&config.database.url, config.database.max_connections).await?;
    store.initialize().await?;

    let inserted = seed_sample_data(&registry, &store, rows, SEED).await?;
    println!("✅ Inserted {} users into {}", inserted, config.database.url);

    Ok(())
}
