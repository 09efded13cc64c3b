use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::Local;
use serde_json::Value;
use tokio::net::TcpListener;

use site_backend::{AppState as BackendState, models::SiteFile, router as backend_router};
use site_core::WavePlaceholder;
use site_dashboard::{
    AppState, build_router,
    client::BackendClient,
    config::DashboardConfig,
    export::{ExportError, PageCapture, RenderState, ReportExporter},
    poller::Poller,
    self_url,
};

/// Fetches the page it is asked to print and returns the HTML as the "pdf".
struct FetchPage {
    http: reqwest::Client,
    delay: Duration,
}

#[async_trait]
impl PageCapture for FetchPage {
    async fn capture_pdf(&self, url: &str) -> Result<Vec<u8>, ExportError> {
        tokio::time::sleep(self.delay).await;
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ExportError::Capture(e.to_string()))?;
        let html = res
            .text()
            .await
            .map_err(|e| ExportError::Capture(e.to_string()))?;
        Ok(html.into_bytes())
    }
}

struct Harness {
    backend: BackendState,
    dashboard: AppState,
    base: String,
    http: reqwest::Client,
}

async fn bind() -> TcpListener {
    TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener")
}

fn serve(listener: TcpListener, app: Router) -> SocketAddr {
    let addr = listener.local_addr().expect("No local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server error");
    });
    addr
}

impl Harness {
    async fn start(capture_delay: Duration) -> Self {
        let backend = BackendState::new(SiteFile::demo());
        backend.sim.write().await.tick(4.0, Local::now());
        let backend_addr = serve(bind().await, backend_router(backend.clone()));

        let client = BackendClient::new(&format!("http://{backend_addr}"), Duration::from_secs(5))
            .expect("client");
        let capture = FetchPage {
            http: reqwest::Client::new(),
            delay: capture_delay,
        };
        let exporter = ReportExporter::new(
            RenderState::default(),
            Arc::new(capture),
            Duration::from_millis(5),
        );

        let listener = bind().await;
        let addr = listener.local_addr().expect("No local addr");
        let dashboard = AppState::new(
            DashboardConfig::default(),
            client,
            exporter,
            Arc::new(WavePlaceholder::new()),
            self_url(addr),
        );
        serve(listener, build_router(dashboard.clone()));

        Self {
            backend,
            dashboard,
            base: format!("http://{addr}"),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn text(&self, path: &str) -> String {
        let res = self.http.get(self.url(path)).send().await.expect("request");
        assert_eq!(res.status(), 200, "GET {path}");
        res.text().await.expect("body")
    }
}

#[tokio::test]
async fn poll_fills_cache_and_pages_render() {
    let h = Harness::start(Duration::ZERO).await;
    assert!(h.dashboard.poller.poll_once().await);

    let home = h.text("/").await;
    assert!(home.contains("솔라파크 1호"));
    assert!(home.contains("실시간 그래프 (ESS 충·방전)"));
    assert!(!home.contains("데이터 갱신 실패"));

    for path in ["/pv", "/pcs", "/bms", "/alarm", "/settings"] {
        h.text(path).await;
    }

    let report = h.text("/report").await;
    assert!(!report.contains("샘플 데이터로 작성되었습니다"));
    assert!(report.contains(r#"data-section="log""#));

    let body: Value = h
        .http
        .get(h.url("/api/dashboard"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["snapshot"]["vpp"]["total_nodes"], 20);
    assert_eq!(body["stale"], false);
    assert!(body["derived"]["donuts"].as_array().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn backend_outage_keeps_last_snapshot() {
    let h = Harness::start(Duration::ZERO).await;
    assert!(h.dashboard.poller.poll_once().await);

    let dead = BackendClient::new("http://127.0.0.1:9", Duration::from_millis(500)).expect("client");
    let failing = Poller::new(dead, h.dashboard.cache().clone());
    assert!(!failing.poll_once().await);

    let cached = h.dashboard.cache().current().await;
    assert!(cached.stale);
    assert!(cached.snapshot.is_some());

    let home = h.text("/").await;
    assert!(home.contains("데이터 갱신 실패"));
    assert!(home.contains("솔라파크 1호"));
}

#[tokio::test]
async fn ess_apply_saves_then_applies() {
    let h = Harness::start(Duration::ZERO).await;
    let res = h
        .http
        .post(h.url("/ess"))
        .form(&[
            ("action", "apply"),
            ("name", "ESS #1"),
            ("mode", "simulate"),
            ("mqtt_topic", "essvpp/ess1"),
            ("auto", "on"),
            ("capacity_kwh", "900"),
            ("rated_kw", "300"),
            ("soc_min", "10"),
            ("soc_max", "95"),
            ("c_rate_chg", "0.5"),
            ("c_rate_dis", "0.5"),
            ("eff_chg", "95"),
            ("eff_dis", "95"),
            ("temp_min_c", "0"),
            ("temp_max_c", "45"),
            ("forbid_hours", "12-13"),
        ])
        .send()
        .await
        .expect("request");
    assert_eq!(res.status(), 200);
    let html = res.text().await.expect("body");
    assert!(html.contains("설정이 적용/반영되었습니다."), "{html}");

    assert_eq!(h.backend.ess_config.read().await.capacity_kwh, 900.0);
    assert_eq!(h.backend.sim.read().await.ess_config().capacity_kwh, 900.0);
    assert_eq!(h.backend.applied.read().await.len(), 1);

    let page = h.text("/ess").await;
    assert!(page.contains(r#"name="capacity_kwh" value="900""#));
}

#[tokio::test]
async fn vpp_save_reaches_backend() {
    let h = Harness::start(Duration::ZERO).await;
    let res = h
        .http
        .post(h.url("/vpp"))
        .form(&[
            ("action", "save"),
            ("site_name", "산업단지 B"),
            ("auto", "on"),
            ("control_horizon_min", "45"),
            ("ramp_limit_kw_per_min", "80"),
            ("res.0.id", "LOAD1"),
            ("res.0.name", "칠러 #1"),
            ("res.0.type", "CHILLER"),
            ("res.0.enabled", "on"),
            ("res.0.shed_kw", "150"),
            ("res.0.min_on_min", "10"),
            ("res.0.min_off_min", "10"),
            ("res.0.ramp_kw_per_min", "30"),
            ("res.0.forbidden_hours", ""),
            ("res.0.penalty_won_per_kwh", "0"),
            ("res.0.priority", "70"),
            ("res.0.mode", "auto"),
        ])
        .send()
        .await
        .expect("request");
    assert_eq!(res.status(), 200);
    assert!(res.text().await.expect("body").contains("VPP 설정이 저장되었습니다."));

    let stored = h.backend.vpp_config.read().await.clone();
    assert_eq!(stored.site_name, "산업단지 B");
    assert_eq!(stored.resources.len(), 1);
    assert_eq!(stored.resources[0].shed_kw, 150.0);
    assert!(h.backend.applied.read().await.is_empty());
}

#[tokio::test]
async fn export_prints_the_toggled_report_in_print_mode() {
    let h = Harness::start(Duration::ZERO).await;
    assert!(h.dashboard.poller.poll_once().await);

    let res = h
        .http
        .post(h.url("/report/export"))
        .form(&[
            ("kpi", "on"),
            ("graph", "off"),
            ("economics", "on"),
            ("summary", "on"),
            ("log", "on"),
        ])
        .send()
        .await
        .expect("request");
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/pdf");
    let printed = res.text().await.expect("body");
    assert!(printed.contains(r#"data-theme="light""#));
    assert!(printed.contains(r#"data-animate="false""#));
    assert!(!printed.contains(r#"data-section="graph""#));
    assert!(printed.contains("<h2>2. SMP · REC 시세 현황</h2>"));

    // Screen rendering is back to normal afterwards.
    let screen = h.text("/report").await;
    assert!(screen.contains(r#"data-theme="dark""#));
}

#[tokio::test]
async fn second_export_while_busy_is_rejected() {
    let h = Harness::start(Duration::from_millis(400)).await;

    let first = {
        let http = h.http.clone();
        let url = h.url("/report/export");
        tokio::spawn(async move { http.post(url).form(&[("kpi", "on")]).send().await })
    };

    let mut waited = Duration::ZERO;
    while !h.dashboard.exporter.is_busy() && waited < Duration::from_secs(3) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert!(h.dashboard.exporter.is_busy());

    let second = h
        .http
        .post(h.url("/report/export"))
        .form(&[("kpi", "on")])
        .send()
        .await
        .expect("request");
    assert_eq!(second.status(), 409);

    let first = first.await.expect("join").expect("request");
    assert_eq!(first.status(), 200);
    assert!(!h.dashboard.exporter.is_busy());
}

#[tokio::test]
async fn poller_stops_after_shutdown() {
    let h = Harness::start(Duration::ZERO).await;
    let handle = h.dashboard.poller.clone().spawn(Duration::from_millis(50));

    let mut waited = Duration::ZERO;
    while h.dashboard.cache().current().await.last_ok.is_none() && waited < Duration::from_secs(3) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert!(handle.is_running());
    handle.shutdown();

    let frozen = h.dashboard.cache().current().await.last_ok;
    assert!(frozen.is_some());
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(h.dashboard.cache().current().await.last_ok, frozen);
}
