//! Solar + ESS + VPP site monitoring dashboard.
//! - Polls the site backend's `GET /api/status` on an interval into a shared cache.
//! - Serves server-rendered tabs (Home, PV, PCS, BMS, ESS, VPP, report, alarm, settings).
//! - ESS/VPP forms validate locally, then pass through to the backend config endpoints.
//! - Exports the report to PDF through a headless browser.
//! - Env vars: BACKEND_URL, DASHBOARD_HTTP_ADDR, POLL_INTERVAL_SECS, REPORT_CAPTURE_CMD, RUST_LOG.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use site_core::PlaceholderData;

pub mod client;
pub mod config;
pub mod export;
pub mod http;
pub mod pages;
pub mod poller;

use crate::client::BackendClient;
use crate::config::DashboardConfig;
use crate::export::ReportExporter;
use crate::poller::{Poller, StatusCache};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub client: BackendClient,
    pub poller: Poller,
    pub exporter: ReportExporter,
    // Only consulted before the first snapshot arrives.
    pub placeholder: Arc<dyn PlaceholderData>,
    // Where a capture browser on this host can reach the dashboard.
    pub self_url: String,
}

impl AppState {
    pub fn new(
        config: DashboardConfig,
        client: BackendClient,
        exporter: ReportExporter,
        placeholder: Arc<dyn PlaceholderData>,
        self_url: String,
    ) -> Self {
        let poller = Poller::new(client.clone(), StatusCache::new());
        Self {
            config: Arc::new(config),
            client,
            poller,
            exporter,
            placeholder,
            self_url,
        }
    }

    pub fn cache(&self) -> &StatusCache {
        self.poller.cache()
    }
}

/// Loopback URL for a listener; wildcard binds are reached through 127.0.0.1.
pub fn self_url(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        format!("http://{}:{}", Ipv4Addr::LOCALHOST, addr.port())
    } else {
        format!("http://{addr}")
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::home))
        .route("/pv", get(http::pv))
        .route("/pcs", get(http::pcs))
        .route("/bms", get(http::bms))
        .route("/ess", get(http::ess_page).post(http::ess_submit))
        .route("/vpp", get(http::vpp_page).post(http::vpp_submit))
        .route("/report", get(http::report_page))
        .route("/report/export", post(http::report_export))
        .route("/alarm", get(http::alarm))
        .route("/settings", get(http::settings))
        .route("/api/dashboard", get(http::api_dashboard))
        .route("/refresh", post(http::refresh))
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
