//! PCS, BMS, alarm and settings tabs.

use site_core::StatusSnapshot;
use site_core::metrics::{self, Tile};
use site_core::snapshot::Severity;

use crate::config::DashboardConfig;
use crate::poller::CachedStatus;

use super::{card, escape, widgets};

pub fn pcs(snapshot: Option<&StatusSnapshot>) -> String {
    let empty = StatusSnapshot::default();
    let snap = snapshot.unwrap_or(&empty);
    let flow = metrics::flow_readings(snap);
    let tile = |label, value, unit| Tile { label, value, unit };
    let figures = [
        tile("현재 전력", format!("{:.1}", snap.ess.power_kw), "kW"),
        tile("충전", format!("{:.1}", flow.charge_kw), "kW"),
        tile("방전", format!("{:.1}", flow.discharge_kw), "kW"),
        tile("금일 처리량", format!("{:.1}", snap.ess.today_throughput_kwh), "kWh"),
        tile("상태", flow.pcs_state.chip().to_string(), ""),
    ];
    format!(
        "{}{}",
        card("PCS 운전 상태", &widgets::pcs_tiles(flow.pcs_state)),
        card("PCS 계측", &widgets::tiles(&figures)),
    )
}

pub fn bms(snapshot: Option<&StatusSnapshot>) -> String {
    let empty = StatusSnapshot::default();
    let snap = snapshot.unwrap_or(&empty);
    let tile = |label, value, unit| Tile { label, value, unit };
    let figures = [
        tile("SOC", metrics::clamp_pct(snap.ess.soc).to_string(), "%"),
        tile("SOH", metrics::clamp_pct(snap.ess.soh).to_string(), "%"),
        tile("온도", format!("{:.1}", snap.ess.temperature_c), "℃"),
        tile("사이클", format!("{:.0}", snap.ess.cycles), "회"),
        tile("ESS 용량", format!("{:.1}", snap.site.ess_capacity_kwh), "kWh"),
    ];
    let bms_logs: Vec<_> = snap
        .logs
        .iter()
        .filter(|l| l.scope.starts_with("BMS"))
        .cloned()
        .collect();
    format!(
        "{}{}",
        card("BMS 상태", &widgets::tiles(&figures)),
        card("BMS 이벤트", &widgets::log_table(&bms_logs)),
    )
}

pub fn alarm(snapshot: Option<&StatusSnapshot>) -> String {
    let empty = StatusSnapshot::default();
    let snap = snapshot.unwrap_or(&empty);
    let counts = [
        (Severity::Error, "오류", snap.alarms.error),
        (Severity::Warn, "경고", snap.alarms.warn),
        (Severity::Info, "정보", snap.alarms.info),
    ];
    let summary: String = counts
        .iter()
        .map(|(level, label, n)| {
            format!(
                r#"<div class="tile"><div class="label">{label}</div><div class="value lv-{}">{n}</div></div>"#,
                level.as_str()
            )
        })
        .collect();
    format!(
        "{}{}",
        card("알람 현황", &format!("<div class=\"tiles\">{summary}</div>")),
        card("시스템 로그", &widgets::log_table(&snap.logs)),
    )
}

pub fn settings(cfg: &DashboardConfig, cached: &CachedStatus) -> String {
    let last_ok = cached
        .last_ok
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let state = if cached.stale { "갱신 실패" } else { "정상" };
    let layout = match cfg.layout {
        crate::config::LayoutPreset::Full => "full",
        crate::config::LayoutPreset::Compact => "compact",
    };
    let rows = [
        ("백엔드 주소", cfg.backend_url.clone()),
        ("수신 주기", format!("{}초", cfg.poll_interval_secs)),
        ("요청 제한 시간", format!("{}초", cfg.request_timeout_secs)),
        ("화면 구성", layout.to_string()),
        ("PDF 변환기", cfg.report.capture_cmd.clone()),
        ("마지막 정상 수신", last_ok),
        ("수신 상태", state.to_string()),
    ];
    let body: String = rows
        .iter()
        .map(|(k, v)| format!("<tr><th>{k}</th><td>{}</td></tr>", escape(v)))
        .collect();
    card("대시보드 설정", &format!("<table>{body}</table>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pcs_lights_state_from_power_sign() {
        let snap = StatusSnapshot::normalize(&json!({"ess": {"power_kw": -120}}));
        let html = pcs(Some(&snap));
        assert!(html.contains(r#"<div class="tile on">충전</div>"#));
        assert!(html.contains("120.0"));
    }

    #[test]
    fn alarm_counts_and_logs() {
        let snap = StatusSnapshot::normalize(&json!({
            "alarms": {"error": 2, "warn": 1},
            "logs": [{"time": "t", "scope": "PCS", "msg": "INV FAULT", "level": "error"}],
        }));
        let html = alarm(Some(&snap));
        assert!(html.contains(r#"<div class="value lv-error">2</div>"#));
        assert!(html.contains("INV FAULT"));
    }

    #[test]
    fn bms_shows_only_bms_events() {
        let snap = StatusSnapshot::normalize(&json!({
            "logs": [
                {"time": "t1", "scope": "BMS[BMS]", "msg": "SOC LOW", "level": "warn"},
                {"time": "t2", "scope": "PCS", "msg": "INV RUN"},
            ],
        }));
        let html = bms(Some(&snap));
        assert!(html.contains("SOC LOW"));
        assert!(!html.contains("INV RUN"));
    }

    #[test]
    fn settings_show_effective_config() {
        let html = settings(&DashboardConfig::default(), &CachedStatus::default());
        assert!(html.contains("http://127.0.0.1:8000"));
        assert!(html.contains("60초"));
        assert!(html.contains("<td>-</td>"));
    }
}
