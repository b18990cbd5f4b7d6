//! Main entry point for the Prompt Image Gateway

use prompt_image_gateway::{api, config::Settings, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Local overrides first, then the conventional file; neither is required
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let settings = Settings::load()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().pretty()).init();
    }

    info!("Starting Prompt Image Gateway");

    settings.validate()?;
    settings.log_credentials_choice();
    info!(
        host = %settings.server.host,
        port = settings.server.port,
        bucket = %settings.storage.bucket,
        emulator = ?settings.storage.emulator(),
        persist_generated = settings.storage.persist_generated,
        "Loaded configuration"
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    let app_state = Arc::new(AppState::from_settings(settings)?);
    let app = api::routes::create_router(app_state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
