use anyhow::Result;
use erp_gateway::config::GatewayConfig;
use erp_gateway::server::ServerBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::load()?;
    tracing::info!(
        upstream = %config.upstream.endpoint(),
        timeout_ms = config.upstream.timeout_ms,
        declared_resources = config.resources.len(),
        "configuration loaded"
    );

    ServerBuilder::new()
        .with_config(config)
        .with_builtin_resources()
        .serve()
        .await
}
