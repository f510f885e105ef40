use anyhow::Context;
use meshlink_ca::{app, AppState, Config};
use meshlink_core::logging;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_from_env();

    let config = Config::from_env()?;
    let state = Arc::new(AppState::generate()?);
    info!(
        fingerprint = %state.ca.read().await.fingerprint(),
        "CA root key generated"
    );

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!("Meshlink CA listening on {}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
