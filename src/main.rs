use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use site_core::WavePlaceholder;
use site_dashboard::{
    AppState, build_router,
    client::BackendClient,
    config::load_dashboard_config,
    export::{CommandCapture, RenderState, ReportExporter},
    self_url,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = load_dashboard_config();
    tracing::info!(
        "dashboard config: backend_url={} poll_interval_secs={} layout={:?} capture_cmd={}",
        cfg.backend_url,
        cfg.poll_interval_secs,
        cfg.layout,
        cfg.report.capture_cmd
    );

    let client = BackendClient::new(
        &cfg.backend_url,
        Duration::from_secs(cfg.request_timeout_secs.max(1)),
    )
    .context("build backend client")?;

    let mut capture = CommandCapture::new(
        cfg.report.capture_cmd.clone(),
        Duration::from_secs(cfg.report.capture_timeout_secs.max(1)),
    );
    if let Some(dir) = &cfg.report.scratch_dir {
        capture = capture.with_scratch_dir(dir);
    }
    let exporter = ReportExporter::new(
        RenderState::default(),
        Arc::new(capture),
        Duration::from_millis(cfg.report.settle_ms),
    );

    let addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .with_context(|| format!("parse listen_addr {}", cfg.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    let local = listener.local_addr().context("listener address")?;

    let poll_every = Duration::from_secs(cfg.poll_interval_secs.max(1));
    let state = AppState::new(
        cfg,
        client,
        exporter,
        Arc::new(WavePlaceholder::new()),
        self_url(local),
    );
    let poller = state.poller.clone().spawn(poll_every);

    tracing::info!("dashboard listening on http://{}", local);
    let served = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    poller.shutdown();
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
