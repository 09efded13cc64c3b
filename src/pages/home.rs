use site_core::metrics::{self, HOURS_PER_DAY};
use site_core::stage::HOME_FLOW;
use site_core::{PlaceholderData, StatusSnapshot};

use crate::config::DashboardLayout;
use crate::poller::CachedStatus;

use super::{card, widgets};

/// Log rows on the Home panel.
const HOME_LOG_LIMIT: usize = 6;

/// Home body. One renderer for every layout preset; panels switch on `layout`.
pub fn render(
    cached: &CachedStatus,
    layout: DashboardLayout,
    placeholder: &dyn PlaceholderData,
) -> String {
    let empty = StatusSnapshot::default();
    let snap = cached.snapshot.as_ref().unwrap_or(&empty);
    let mut out = String::new();

    if layout.donuts {
        let donuts: String = metrics::donuts(snap)
            .iter()
            .map(widgets::donut_tile)
            .collect();
        out.push_str(&format!("<div class=\"donuts\">{donuts}</div>"));
    }

    let mut left = String::new();
    if layout.accumulated {
        left.push_str(&card(
            "누적 에너지",
            &widgets::accumulated_chart(&metrics::accumulated_rows(snap)),
        ));
    }
    if layout.prices {
        left.push_str(&card(
            "SMP · REC",
            &widgets::price_panel(&metrics::price_board(snap)),
        ));
    }

    let mut right = String::new();
    if layout.flow {
        right.push_str(&widgets::flow_stage(
            "home-flow",
            &HOME_FLOW,
            &metrics::flow_readings(snap),
            layout.stage_width,
        ));
    }
    let mut lower = String::new();
    if layout.realtime {
        lower.push_str(&realtime_panel(cached.snapshot.as_ref(), placeholder));
    }
    if layout.logs {
        lower.push_str(&card(
            "알람 : 시스템 로그",
            &widgets::log_table(&metrics::recent_logs(snap, HOME_LOG_LIMIT)),
        ));
    }
    if !lower.is_empty() {
        right.push_str(&format!("<div class=\"row\">{lower}</div>"));
    }

    out.push_str(&format!(
        "<div class=\"grid\"><div>{left}</div><div>{right}</div></div>"
    ));
    out
}

/// ESS charge/discharge by hour. Before the first snapshot the panel shows a
/// labelled placeholder trace instead.
fn realtime_panel(snapshot: Option<&StatusSnapshot>, placeholder: &dyn PlaceholderData) -> String {
    match snapshot {
        Some(snap) => {
            let charge = metrics::hourly(&snap.ess.charge_kw_series);
            let discharge = metrics::hourly(&snap.ess.discharge_kw_series);
            card(
                "실시간 그래프 (ESS 충·방전)",
                &widgets::line_chart(
                    &[("#63d8ff", charge.as_slice()), ("#f1a256", discharge.as_slice())],
                    0.0,
                    "kW",
                ),
            )
        }
        None => {
            let trace = placeholder.realtime_trace(HOURS_PER_DAY);
            card(
                "실시간 그래프 (샘플)",
                &widgets::line_chart(&[("#69e3ff", trace.as_slice())], 100.0, "샘플 데이터"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutPreset;
    use serde_json::json;
    use site_core::WavePlaceholder;

    fn cached(raw: serde_json::Value) -> CachedStatus {
        CachedStatus {
            snapshot: Some(StatusSnapshot::normalize(&raw)),
            ..CachedStatus::default()
        }
    }

    #[test]
    fn renders_headline_values() {
        let c = cached(json!({
            "curtailment": {"pred_today": 3.2, "actual_cum_today": 4.8,
                            "peak_windows": [{"start": "13:00", "end": "15:00"}]},
            "ess": {"soc": 78},
            "vpp": {"active_nodes": 19, "total_nodes": 20},
        }));
        let html = render(&c, LayoutPreset::Full.layout(), &WavePlaceholder::new());
        assert!(html.contains(r#"<span class="value">3.2</span>"#));
        assert!(html.contains(r#"<span class="value">4.8</span>"#));
        assert!(html.contains("13:00~15:00"));
        assert!(html.contains("19/20"));
        assert!(html.contains("실시간 그래프 (ESS 충·방전)"));
    }

    #[test]
    fn no_snapshot_renders_zeros_and_sample_trace() {
        let html = render(
            &CachedStatus::default(),
            LayoutPreset::Full.layout(),
            &WavePlaceholder::new(),
        );
        assert!(html.contains(r#"<span class="value">0.0</span>"#));
        assert!(html.contains(r#"<span class="value">-</span>"#));
        assert!(html.contains("실시간 그래프 (샘플)"));
    }

    #[test]
    fn compact_layout_drops_optional_panels() {
        let c = cached(json!({}));
        let html = render(&c, LayoutPreset::Compact.layout(), &WavePlaceholder::new());
        assert!(!html.contains("실시간 그래프"));
        assert!(!html.contains("시스템 로그"));
        assert!(html.contains("누적 에너지"));
        assert!(html.contains("home-flow"));
    }
}
