use std::env;
use std::net::SocketAddr;

use anyhow::Context;
use common_token::TokenConfig;
use token_service::{router, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = TokenConfig::from_env().context("failed to load token configuration")?;
    info!(
        algorithm = ?config.algorithm,
        issuer = %config.issuer,
        audience = %config.audience,
        ttl_seconds = config.ttl.num_seconds(),
        "token configuration loaded"
    );
    let app = router(AppState::new(config));

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8090);
    let ip: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));

    info!(%addr, "starting token-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
