use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use site_backend::{AppState, models::load_site_config, router, spawn_ticker};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let site = load_site_config();
    let tick = Duration::from_secs(site.tick_secs.max(1));
    tracing::info!(
        "loaded site: name={} pv_capacity_kwp={} vpp_nodes={} tick_secs={}",
        site.site.name,
        site.site.pv_capacity_kwp,
        site.vpp_nodes,
        tick.as_secs()
    );

    let state = AppState::new(site);
    let ticker = spawn_ticker(state.clone(), tick);

    let addr: SocketAddr = std::env::var("BACKEND_HTTP_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8000".to_string())
        .parse()
        .context("parse BACKEND_HTTP_ADDR")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("site backend listening on http://{}", addr);

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    ticker.abort();
    served.context("serve http")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn init_tracing() {
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer());
    subscriber.init();
}
