use site_core::StatusSnapshot;
use site_core::geometry::GaugeFrame;
use site_core::metrics;
use site_core::stage::PV_FLOW;

use super::{card, widgets};

pub fn render(snapshot: Option<&StatusSnapshot>, stage_width: Option<f64>) -> String {
    let empty = StatusSnapshot::default();
    let snap = snapshot.unwrap_or(&empty);

    let frame = GaugeFrame::pv();
    let gauges: String = metrics::pv_gauges(snap)
        .iter()
        .map(|g| widgets::gauge(g, frame))
        .collect();

    format!(
        "{}{}{}",
        widgets::tiles(&metrics::pv_tiles(snap)),
        card("PV 상태", &format!("<div class=\"row\">{gauges}</div>")),
        widgets::flow_stage("pv-flow", &PV_FLOW, &metrics::flow_readings(snap), stage_width),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gauges_use_site_capacity() {
        let snap = StatusSnapshot::normalize(&json!({
            "site": {"pv_capacity_kwp": 500},
            "pv": {"output_kw": 250, "inverter_efficiency_pct": 97.5, "today_kwh": 1200},
        }));
        let html = render(Some(&snap), None);
        assert_eq!(html.matches("<figure class=\"gauge\">").count(), 3);
        assert!(html.contains("250.0"));
        assert!(html.contains("1200.0"));
        // Half of the 500 kW domain lands at the top of the arc.
        let arcs = GaugeFrame::pv().arcs(250.0, 0.0, 500.0);
        assert!(html.contains(&arcs.value));
        assert!(html.contains("height:820px"));
    }

    #[test]
    fn renders_without_snapshot() {
        let html = render(None, None);
        assert!(html.contains("현재 출력"));
        assert!(html.contains("pv-flow"));
    }
}
