use anyhow::Context;

use cellarbook_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cellarbook_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let services = cellarbook_api::app::services::build_services(&config);
    let app = cellarbook_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
