use std::sync::Arc;

use anyhow::Context;

use clusterview_api::app::{AppServices, build_app};
use clusterview_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clusterview_observability::init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    tracing::info!(
        upstream = %config.upstream_url,
        settings = %config.settings_path.display(),
        "configuration loaded"
    );

    let services = Arc::new(AppServices::from_config(&config));
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
