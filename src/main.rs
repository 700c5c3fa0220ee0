use superbox::{config::RegistryConfig, handlers, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "superbox=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RegistryConfig::from_env()?;

    if config.bucket.is_empty() {
        tracing::warn!(
            "REGISTRY_BUCKET is not set; registry requests will fail until it is configured"
        );
    }

    tracing::info!(
        store = config.store.kind(),
        bucket = %config.bucket,
        "Initializing registry"
    );

    let registry_service = config.build_registry_service().await?;
    let app = handlers::router(AppState::new(registry_service), config.request_timeout);

    // Start server
    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
