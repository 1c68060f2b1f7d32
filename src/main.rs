// User Records Server - validated CRUD over users, emails and phones

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use user_records::{
    app_state::AppState,
    config::Config,
    record_interface::create_record_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    let record_router = create_record_router(app_state.record_service.clone());

    // Build main application router
    let app = Router::new()
        .nest("/api", record_router)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = config.server_address();
    info!("User records server starting on http://{}", addr);
    for record_type in app_state.record_service.registry().record_types() {
        info!(
            "  PUT /api/{0}  GET|POST /api/{0}  GET|POST|PATCH|DELETE /api/{0}/{{id}}",
            record_type
        );
    }

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
