use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Local;

use site_core::{EssConfig, ValidationError, VppConfig};

use crate::AppState;
use crate::models::{ApplyRecord, ApplyTarget, IssueBody};

pub(crate) async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "site backend OK" }))
}

pub(crate) async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let sim = state.sim.read().await;
    Json(sim.status())
}

pub(crate) async fn get_ess_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ess_config.read().await.clone())
}

pub(crate) async fn put_ess_config(
    State(state): State<AppState>,
    Json(cfg): Json<EssConfig>,
) -> Response {
    if let Err(err) = cfg.validate() {
        return rejected(err);
    }
    let clean = cfg.sanitized();
    *state.ess_config.write().await = clean.clone();
    tracing::info!(
        "stored ess config: name={} capacity_kwh={} rated_kw={} soc={}..{}",
        clean.name,
        clean.capacity_kwh,
        clean.rated_kw,
        clean.soc_min,
        clean.soc_max
    );
    Json(clean).into_response()
}

pub(crate) async fn apply_ess(State(state): State<AppState>) -> Response {
    let cfg = state.ess_config.read().await.clone();
    state.sim.write().await.apply_ess(cfg, Local::now());
    record(&state, ApplyTarget::Ess).await
}

pub(crate) async fn get_vpp_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.vpp_config.read().await.clone())
}

pub(crate) async fn put_vpp_config(
    State(state): State<AppState>,
    Json(cfg): Json<VppConfig>,
) -> Response {
    if let Err(err) = cfg.validate() {
        return rejected(err);
    }
    let clean = cfg.sanitized();
    *state.vpp_config.write().await = clean.clone();
    tracing::info!(
        "stored vpp config: site={} resources={} horizon_min={}",
        clean.site_name,
        clean.resources.len(),
        clean.control_horizon_min
    );
    Json(clean).into_response()
}

pub(crate) async fn apply_vpp(State(state): State<AppState>) -> Response {
    let cfg = state.vpp_config.read().await.clone();
    state.sim.write().await.apply_vpp(cfg, Local::now());
    record(&state, ApplyTarget::Vpp).await
}

pub(crate) async fn list_applies(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.applied.read().await.clone())
}

async fn record(state: &AppState, target: ApplyTarget) -> Response {
    let receipt = ApplyRecord::accepted(target);
    tracing::info!("applied config: target={:?} id={}", target, receipt.id);
    state.applied.write().await.push(receipt.clone());
    (StatusCode::ACCEPTED, Json(receipt)).into_response()
}

fn rejected(err: ValidationError) -> Response {
    tracing::warn!("rejected config: {}", err);
    let body = IssueBody {
        error: err.to_string(),
        issues: err.messages(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}
