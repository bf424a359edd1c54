use std::sync::Arc;

use formfill_core::{ChatCompletionsClient, Config, FieldExtractor, config_file};
use tracing_subscriber::EnvFilter;

mod app;
mod handlers;
mod models;
mod state;
mod upload;

use app::ServerSettings;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let file_config = config_file::load_config();
    let config = Config::from_file_and_env(&file_config)?;
    let server = ServerSettings::resolve(&file_config, |key| std::env::var(key).ok());

    let client = ChatCompletionsClient::from_config(&config)?;
    if !client.has_api_key() {
        tracing::warn!("no API key configured; /process will fail until one is set");
    }
    tracing::info!(
        base_url = %config.base_url,
        model = %config.model,
        api_key_configured = client.has_api_key(),
        decode_failure_policy = ?config.decode_failure_policy,
        "oracle configured"
    );

    let state = Arc::new(AppState {
        extractor: FieldExtractor::new(Arc::new(client), config.extraction_settings()),
        decode_failure_policy: config.decode_failure_policy,
    });

    let app = app::build_router(state, &server);

    let listener = tokio::net::TcpListener::bind(&server.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutting down");
    }
}
