use std::sync::Arc;
use crate::{
    config::Config,
    infrastructure::{LocalBlobStore, SqliteStore},
    schemas::create_schema_registry,
    services::RecordService,
};

#[derive(Clone)]
pub struct AppState {
    pub record_service: Arc<RecordService>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Schemas are fixed for the lifetime of the process
        let registry = Arc::new(create_schema_registry()?);

        // Initialize database
        let store =
            SqliteStore::connect(&config.database.url, config.database.max_connections).await?;
        store.initialize().await?;
        store.health_check().await?;

        let record_service = RecordService::new(
            registry,
            Arc::new(store),
            Arc::new(LocalBlobStore::new()),
            config.photo_settings(),
        );

        Ok(Self {
            record_service: Arc::new(record_service),
            config,
        })
    }
}
