//! Mock site backend for the monitoring dashboard.
//! - Loads the site description (PV capacity, curtailment forecast, ESS/VPP defaults) from YAML.
//! - Ticks a simulator on an interval to evolve PV, ESS, VPP and market values.
//! - Serves `GET /api/status` plus ESS/VPP config CRUD and "apply to simulator" triggers.
//! - Env vars: SITE_CONFIG_PATH, BACKEND_HTTP_ADDR, RUST_LOG.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use chrono::Local;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use site_core::{EssConfig, VppConfig};

pub mod http;
pub mod models;
pub mod sim;

use crate::models::{ApplyRecord, SiteFile};
use crate::sim::SiteSimulator;

#[derive(Clone)]
pub struct AppState {
    // Simulator behind an async RwLock so many readers / single writer.
    pub sim: Arc<RwLock<SiteSimulator>>,
    // Saved configs. They only reach the simulator through an explicit apply.
    pub ess_config: Arc<RwLock<EssConfig>>,
    pub vpp_config: Arc<RwLock<VppConfig>>,
    // Apply receipts, newest last.
    pub applied: Arc<RwLock<Vec<ApplyRecord>>>,
}

impl AppState {
    pub fn new(site: SiteFile) -> Self {
        let ess = site.ess.sanitized();
        let vpp = site.vpp.sanitized();
        Self {
            sim: Arc::new(RwLock::new(SiteSimulator::new(site))),
            ess_config: Arc::new(RwLock::new(ess)),
            vpp_config: Arc::new(RwLock::new(vpp)),
            applied: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::root))
        .route("/api/status", get(http::get_status))
        .route(
            "/api/ess/config",
            get(http::get_ess_config).put(http::put_ess_config),
        )
        .route("/api/ess/apply", post(http::apply_ess))
        .route(
            "/api/vpp/config",
            get(http::get_vpp_config).put(http::put_vpp_config),
        )
        .route("/api/vpp/apply", post(http::apply_vpp))
        .route("/api/applies", get(http::list_applies))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        path = %req.uri().path(),
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, _span: &tracing::Span| {
                        tracing::debug!(
                            "response status={} latency_ms={}",
                            res.status(),
                            latency.as_millis()
                        );
                    },
                ),
        )
}

/// Advance the simulator every `tick` until the returned handle is aborted.
pub fn spawn_ticker(state: AppState, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let mut sim = state.sim.write().await;
            sim.tick(tick.as_secs_f64(), Local::now());
        }
    })
}
