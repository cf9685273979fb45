use anyhow::Context;

use propdesk_api::app::{self, AppServices};
use propdesk_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments use the environment.
    let _ = dotenvy::dotenv();

    let config = ApiConfig::load().context("failed to load configuration")?;
    propdesk_observability::init(config.log.format);

    let services = AppServices::from_config(&config)
        .await
        .context("failed to initialize services")?;
    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    tracing::info!(addr = %listener.local_addr()?, backend = ?config.storage.backend, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
