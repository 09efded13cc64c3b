use axum::{
    Form, Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Local;
use serde::Serialize;
use thiserror::Error;

use site_core::metrics::{self, BarRow, Donut, FlowReadings, GaugeReading, Kpi, PriceBoard, Tile};
use site_core::report::assemble;
use site_core::{EssConfig, SectionToggles, StatusSnapshot, VppConfig};

use crate::AppState;
use crate::export::ExportError;
use crate::pages::forms::{self, FormAction, Notice};
use crate::pages::report::ReportView;
use crate::pages::{self, Header, Tab};
use crate::poller::CachedStatus;

type FormPairs = Vec<(String, String)>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("bad form: {0}")]
    BadForm(String),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self {
            HttpError::BadForm(_) => StatusCode::BAD_REQUEST,
            HttpError::Export(ExportError::Busy) => StatusCode::CONFLICT,
            HttpError::Export(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

async fn page<F>(state: &AppState, tab: Tab, body: F) -> Html<String>
where
    F: FnOnce(&CachedStatus) -> String,
{
    let cached = state.cache().current().await;
    let mut header = Header::from_cache(&cached, Local::now());
    if tab.live() {
        header.refresh_secs = Some(state.config.poll_interval_secs.max(1));
    }
    Html(pages::shell(tab, &header, &body(&cached)))
}

pub(crate) async fn home(State(state): State<AppState>) -> Html<String> {
    let layout = state.config.layout();
    page(&state, Tab::Home, |cached| {
        pages::home::render(cached, layout, state.placeholder.as_ref())
    })
    .await
}

pub(crate) async fn pv(State(state): State<AppState>) -> Html<String> {
    page(&state, Tab::Pv, |cached| {
        pages::pv::render(cached.snapshot.as_ref(), state.config.stage_width_px)
    })
    .await
}

pub(crate) async fn pcs(State(state): State<AppState>) -> Html<String> {
    page(&state, Tab::Pcs, |cached| pages::status::pcs(cached.snapshot.as_ref())).await
}

pub(crate) async fn bms(State(state): State<AppState>) -> Html<String> {
    page(&state, Tab::Bms, |cached| pages::status::bms(cached.snapshot.as_ref())).await
}

pub(crate) async fn alarm(State(state): State<AppState>) -> Html<String> {
    page(&state, Tab::Alarm, |cached| pages::status::alarm(cached.snapshot.as_ref())).await
}

pub(crate) async fn settings(State(state): State<AppState>) -> Html<String> {
    page(&state, Tab::Settings, |cached| {
        pages::status::settings(&state.config, cached)
    })
    .await
}

pub(crate) async fn ess_page(State(state): State<AppState>) -> Html<String> {
    let (cfg, notice) = match state.client.ess_config().await {
        Ok(cfg) => (cfg, None),
        Err(err) => {
            tracing::warn!("ess config fetch failed, showing defaults: {}", err);
            let notice = Notice::Error(format!("설정을 불러오지 못했습니다: {}", err.reason()));
            (EssConfig::default(), Some(notice))
        }
    };
    page(&state, Tab::Ess, |_| forms::render_ess(&cfg, notice.as_ref())).await
}

pub(crate) async fn ess_submit(
    State(state): State<AppState>,
    Form(pairs): Form<FormPairs>,
) -> Result<Html<String>, HttpError> {
    let cfg = forms::ess_from_form(&pairs);
    let (cfg, notice) = match FormAction::from_pairs(&pairs) {
        Some(FormAction::Save) => save_ess(&state, cfg).await,
        Some(FormAction::Apply) => apply_ess(&state, cfg).await,
        _ => return Err(HttpError::BadForm("unknown ess form action".to_string())),
    };
    Ok(page(&state, Tab::Ess, |_| forms::render_ess(&cfg, Some(&notice))).await)
}

/// Validate, then store. On any failure the user's input comes back unchanged.
async fn save_ess(state: &AppState, cfg: EssConfig) -> (EssConfig, Notice) {
    if let Err(err) = cfg.validate() {
        return (cfg, Notice::Error(err.to_string()));
    }
    match state.client.save_ess_config(&cfg.sanitized()).await {
        Ok(saved) => {
            tracing::info!("ess config saved name={} capacity_kwh={}", saved.name, saved.capacity_kwh);
            (saved, Notice::Ok("설정이 저장되었습니다.".to_string()))
        }
        Err(err) => {
            tracing::warn!("ess config save failed: {}", err);
            (cfg, Notice::Error(format!("저장 실패: {}", err.reason())))
        }
    }
}

/// Store what is on screen, then ask the backend to apply it.
async fn apply_ess(state: &AppState, cfg: EssConfig) -> (EssConfig, Notice) {
    let (cfg, saved) = save_ess(state, cfg).await;
    if matches!(saved, Notice::Error(_)) {
        return (cfg, saved);
    }
    match state.client.apply_ess().await {
        Ok(receipt) => {
            tracing::info!("ess config applied id={} status={}", receipt.id, receipt.status);
            (cfg, Notice::Ok("설정이 적용/반영되었습니다.".to_string()))
        }
        Err(err) => {
            tracing::warn!("ess apply failed: {}", err);
            (cfg, Notice::Error(format!("적용 실패: {}", err.reason())))
        }
    }
}

pub(crate) async fn vpp_page(State(state): State<AppState>) -> Html<String> {
    let (cfg, notice) = match state.client.vpp_config().await {
        Ok(cfg) => (cfg, None),
        Err(err) => {
            tracing::warn!("vpp config fetch failed, showing defaults: {}", err);
            let notice = Notice::Error(format!("설정을 불러오지 못했습니다: {}", err.reason()));
            (VppConfig::default(), Some(notice))
        }
    };
    page(&state, Tab::Vpp, |_| forms::render_vpp(&cfg, notice.as_ref())).await
}

pub(crate) async fn vpp_submit(
    State(state): State<AppState>,
    Form(pairs): Form<FormPairs>,
) -> Result<Html<String>, HttpError> {
    let mut cfg = forms::vpp_from_form(&pairs);
    let notice = match FormAction::from_pairs(&pairs) {
        Some(FormAction::AddResource) => {
            cfg.add_resource();
            None
        }
        Some(FormAction::RemoveResource(idx)) => {
            if cfg.remove_resource(idx).is_none() {
                return Err(HttpError::BadForm(format!("no resource at index {idx}")));
            }
            None
        }
        Some(FormAction::Save) => {
            let (saved, notice) = save_vpp(&state, cfg).await;
            cfg = saved;
            Some(notice)
        }
        Some(FormAction::Apply) => {
            let (applied, notice) = apply_vpp(&state, cfg).await;
            cfg = applied;
            Some(notice)
        }
        None => return Err(HttpError::BadForm("unknown vpp form action".to_string())),
    };
    Ok(page(&state, Tab::Vpp, |_| forms::render_vpp(&cfg, notice.as_ref())).await)
}

async fn save_vpp(state: &AppState, cfg: VppConfig) -> (VppConfig, Notice) {
    if let Err(err) = cfg.validate() {
        return (cfg, Notice::Error(err.to_string()));
    }
    match state.client.save_vpp_config(&cfg.sanitized()).await {
        Ok(saved) => {
            tracing::info!(
                "vpp config saved site={} resources={}",
                saved.site_name,
                saved.resources.len()
            );
            (saved, Notice::Ok("VPP 설정이 저장되었습니다.".to_string()))
        }
        Err(err) => {
            tracing::warn!("vpp config save failed: {}", err);
            (cfg, Notice::Error(format!("저장 실패: {}", err.reason())))
        }
    }
}

async fn apply_vpp(state: &AppState, cfg: VppConfig) -> (VppConfig, Notice) {
    let (cfg, saved) = save_vpp(state, cfg).await;
    if matches!(saved, Notice::Error(_)) {
        return (cfg, saved);
    }
    match state.client.apply_vpp().await {
        Ok(receipt) => {
            tracing::info!("vpp config applied id={} status={}", receipt.id, receipt.status);
            (cfg, Notice::Ok("VPP 설정이 적용/반영되었습니다.".to_string()))
        }
        Err(err) => {
            tracing::warn!("vpp apply failed: {}", err);
            (cfg, Notice::Error(format!("적용 실패: {}", err.reason())))
        }
    }
}

fn toggles_from(pairs: &[(String, String)]) -> SectionToggles {
    SectionToggles::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

pub(crate) async fn report_page(
    State(state): State<AppState>,
    Query(pairs): Query<FormPairs>,
) -> Html<String> {
    let toggles = toggles_from(&pairs);
    let cached = state.cache().current().await;
    let (snapshot, placeholder) = match &cached.snapshot {
        Some(snapshot) => (snapshot.clone(), false),
        None => (state.placeholder.report_snapshot(), true),
    };
    let now = Local::now();
    let report = assemble(&snapshot, &toggles, &now);
    let body = pages::report::render(&ReportView {
        report: &report,
        toggles: &toggles,
        mode: state.exporter.render_state().get(),
        placeholder,
        exporting: state.exporter.is_busy(),
    });
    let header = Header::from_cache(&cached, now);
    Html(pages::shell(Tab::Report, &header, &body))
}

pub(crate) async fn report_export(
    State(state): State<AppState>,
    Form(pairs): Form<FormPairs>,
) -> Result<Response, HttpError> {
    let toggles = toggles_from(&pairs);
    let url = format!("{}/report?{}", state.self_url, toggles.to_query());
    let report = state.exporter.export(&url).await?;
    let disposition = format!("attachment; filename=\"{}\"", report.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.pdf,
    )
        .into_response())
}

/// Values derived from a real snapshot, as drawn on the dashboard.
#[derive(Serialize)]
struct Derived {
    donuts: Vec<Donut>,
    accumulated: Vec<BarRow>,
    prices: PriceBoard,
    flow: FlowReadings,
    pv_gauges: Vec<GaugeReading>,
    pv_tiles: Vec<Tile>,
    kpi: Kpi,
    peak_window: String,
}

impl Derived {
    fn from_snapshot(snap: &StatusSnapshot) -> Self {
        Self {
            donuts: metrics::donuts(snap),
            accumulated: metrics::accumulated_rows(snap),
            prices: metrics::price_board(snap),
            flow: metrics::flow_readings(snap),
            pv_gauges: metrics::pv_gauges(snap),
            pv_tiles: metrics::pv_tiles(snap),
            kpi: metrics::kpi(snap),
            peak_window: metrics::format_peak_window(snap),
        }
    }
}

#[derive(Serialize)]
struct DashboardView {
    #[serde(flatten)]
    status: CachedStatus,
    derived: Option<Derived>,
}

pub(crate) async fn api_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.cache().current().await;
    let derived = status.snapshot.as_ref().map(Derived::from_snapshot);
    Json(DashboardView { status, derived })
}

pub(crate) async fn refresh(State(state): State<AppState>) -> Redirect {
    let fresh = state.poller.poll_once().await;
    tracing::info!("manual refresh fresh={}", fresh);
    Redirect::to("/")
}
