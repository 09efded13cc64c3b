//! SVG/HTML fragments shared by the pages.

use site_core::geometry::{
    self, GaugeFrame, PlotBox, BAR_HEIGHT_PX, row_bars, row_pitch, tick_positions,
};
use site_core::metrics::{
    ACCUM_DOMAIN_MAX_KWH, ACCUM_TICKS_KWH, BarRow, Donut, FlowReadings, GaugeReading, PcsState,
    PriceBoard, Tile,
};
use site_core::snapshot::LogEntry;
use site_core::stage::FlowLayout;

use super::escape;

const DONUT_RADIUS: f64 = 38.0;

pub fn donut_tile(donut: &Donut) -> String {
    let (filled, rest) = geometry::donut_dash(f64::from(donut.pct), DONUT_RADIUS);
    let unit = if donut.unit.is_empty() {
        String::new()
    } else {
        format!("<span class=\"unit\">{}</span>", donut.unit)
    };
    format!(
        r##"<div class="donut" data-key="{key}">
  <svg width="88" height="88" viewBox="0 0 88 88">
    <circle cx="44" cy="44" r="{r}" fill="none" stroke="#2e4150" stroke-width="12"/>
    <circle cx="44" cy="44" r="{r}" fill="none" stroke="{color}" stroke-width="12"
      stroke-dasharray="{filled:.2} {rest:.2}" transform="rotate(-90 44 44)"/>
    <text x="44" y="49" text-anchor="middle" font-size="13" font-weight="700" fill="#f1f5f9">{pct}%</text>
  </svg>
  <div>
    <div class="title" style="color:{color}">{label}</div>
    <div><span class="value">{value}</span>{unit}</div>
  </div>
</div>"##,
        key = donut.key,
        r = DONUT_RADIUS,
        color = donut.color,
        filled = filled,
        rest = rest,
        pct = donut.pct,
        label = donut.label,
        value = escape(&donut.value),
        unit = unit,
    )
}

/// Accumulated energy chart: yesterday (faint) over today, shared kWh axis.
pub fn accumulated_chart(rows: &[BarRow]) -> String {
    let plot = PlotBox {
        left: 92.0,
        width: 300.0,
    };
    let pitch = row_pitch(14.0);
    let top = 28.0;
    let height = top + pitch * rows.len() as f64 + 8.0;

    let mut svg = String::new();
    for (x, tick) in tick_positions(&ACCUM_TICKS_KWH, ACCUM_DOMAIN_MAX_KWH, plot)
        .into_iter()
        .zip(ACCUM_TICKS_KWH)
    {
        svg.push_str(&format!(
            r##"<line x1="{x:.1}" y1="{y0}" x2="{x:.1}" y2="{y1:.1}" stroke="#2a3f50"/><text x="{x:.1}" y="16" font-size="10" text-anchor="middle" fill="#a8c7d6">{tick}</text>"##,
            y0 = top - 6.0,
            y1 = height - 4.0,
        ));
    }
    for (i, row) in rows.iter().enumerate() {
        let row_top = top + pitch * i as f64;
        svg.push_str(&format!(
            r##"<text x="0" y="{y:.1}" font-size="12" fill="#cfe7f6">{name}</text>"##,
            y = row_top + BAR_HEIGHT_PX + 4.0,
            name = row.name,
        ));
        for bar in row_bars(row, plot, row_top) {
            svg.push_str(&format!(
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" opacity="{}"/>"#,
                bar.x, bar.y, bar.width, bar.height, row.color, bar.opacity
            ));
        }
    }

    format!(
        r#"<svg class="accum" width="100%" viewBox="0 0 {w} {h:.1}">{svg}</svg><div class="legend"><small>전일 / 금일 (kWh)</small></div>"#,
        w = plot.left + plot.width + 20.0,
        h = height,
    )
}

pub fn price_panel(board: &PriceBoard) -> String {
    format!(
        r#"<table class="prices">
  <thead><tr><th></th><th>현재</th><th>평균</th><th>변동률</th></tr></thead>
  <tbody>
    <tr><td>SMP</td><td>{:.1}</td><td>{:.1}</td><td>{}</td></tr>
    <tr><td>REC</td><td>{:.1}</td><td>{:.1}</td><td>{}</td></tr>
    <tr><td>SMP+REC</td><td colspan="3">{:.1} 원/kWh</td></tr>
  </tbody>
</table>
<small>업데이트 {}</small>"#,
        board.smp_now,
        board.smp_avg,
        board.smp_change,
        board.rec_now,
        board.rec_avg,
        board.rec_change,
        board.combined_now,
        escape(&board.updated_at),
    )
}

pub fn gauge(reading: &GaugeReading, frame: GaugeFrame) -> String {
    let arcs = frame.arcs(reading.value, reading.min, reading.max);
    format!(
        r##"<figure class="gauge">
  <svg width="100%" viewBox="0 0 {w} {h}">
    <path d="{track}" fill="none" stroke="#2e4150" stroke-width="{stroke}"/>
    <path d="{value_arc}" fill="none" stroke="{color}" stroke-width="{stroke}"/>
    <text x="{cx}" y="{ty:.1}" text-anchor="middle" font-size="30" font-weight="800" fill="#f1f5f9">{value:.1}<tspan font-size="14" fill="#63d8ff"> {unit}</tspan></text>
  </svg>
  <figcaption>{label}</figcaption>
</figure>"##,
        w = frame.width,
        h = frame.height,
        track = arcs.track,
        value_arc = arcs.value,
        stroke = frame.stroke,
        color = reading.color,
        cx = frame.cx,
        ty = frame.cy - 8.0,
        value = reading.value,
        unit = reading.unit,
        label = reading.label,
    )
}

pub fn tiles(tiles: &[Tile]) -> String {
    let inner: String = tiles
        .iter()
        .map(|t| {
            format!(
                r#"<div class="tile"><div class="label">{}</div><div class="value">{} <small>{}</small></div></div>"#,
                t.label,
                escape(&t.value),
                t.unit
            )
        })
        .collect();
    format!("<div class=\"tiles\">{inner}</div>")
}

/// One tile per PCS state with the current one lit.
pub fn pcs_tiles(current: PcsState) -> String {
    let inner: String = PcsState::ALL
        .iter()
        .map(|state| {
            let class = if *state == current { "tile on" } else { "tile" };
            format!(r#"<div class="{class}">{}</div>"#, state.label())
        })
        .collect();
    format!("<div class=\"tiles pcs\">{inner}</div>")
}

/// Flow diagram on a fixed design canvas, scaled to its host by `StageScaler`
/// semantics: `min(1, width / design)`, re-run on every resize. `first_paint_width`
/// seeds the server-side scale until the browser measures the host.
pub fn flow_stage(
    id: &str,
    layout: &FlowLayout,
    readings: &FlowReadings,
    first_paint_width: Option<f64>,
) -> String {
    let mut scaler = layout.scaler();
    if let Some(width) = first_paint_width {
        scaler.observe(width);
    }
    let geometry = scaler.geometry();
    let node = |rect: site_core::stage::DesignRect, class: &str, inner: String| {
        let height = rect
            .h
            .map(|h| format!("height:{h}px;"))
            .unwrap_or_default();
        format!(
            r#"<div class="{class}" style="left:{}px;top:{}px;width:{}px;{height}">{inner}</div>"#,
            rect.x, rect.y, rect.w
        )
    };

    let mut nodes = String::new();
    nodes.push_str(&node(layout.pipe, "pipe", String::new()));
    nodes.push_str(&node(
        layout.pv,
        "node",
        format!(
            "PV<br><b>{:.1}</b> kW<br><small>경사 {:.0} W/m² · 수평 {:.0} W/m²</small><br><small>모듈 {:.1}℃ · 외기 {:.1}℃</small>",
            readings.pv_kw,
            readings.irradiance_tilt_wm2,
            readings.irradiance_horizontal_wm2,
            readings.module_temp_c,
            readings.ambient_temp_c
        ),
    ));
    nodes.push_str(&node(
        layout.pcs,
        "node",
        format!(
            "PCS <span class=\"chip\">{}</span>",
            readings.pcs_state.chip()
        ),
    ));
    nodes.push_str(&node(
        layout.tower,
        "node",
        format!(
            "계통<br><small>충전</small> <b>{:.1}</b> kW<br><small>방전</small> <b>{:.1}</b> kW",
            readings.charge_kw, readings.discharge_kw
        ),
    ));
    nodes.push_str(&node(
        layout.battery,
        "node",
        format!(
            "BATTERY<br>SOC <b>{}</b>% · SOH <b>{}</b>%<br><small>{:.1}℃</small>",
            readings.soc_pct, readings.soh_pct, readings.battery_temp_c
        ),
    ));

    format!(
        r#"<div class="stage-host" id="{id}" style="height:{reserved}px">
  <div class="stage" data-design-w="{w}" data-design-h="{h}" style="width:{w}px;height:{h}px;transform:scale({scale})">{nodes}</div>
</div>
<script>
(function () {{
  var host = document.getElementById("{id}");
  var stage = host.firstElementChild;
  var dw = {w}, dh = {h};
  function fit(width) {{
    var s = width > 0 ? Math.min(1, width / dw) : 1;
    stage.style.transform = "scale(" + s + ")";
    host.style.height = (dh * s) + "px";
  }}
  new ResizeObserver(function (entries) {{
    fit(entries[0].contentRect.width);
  }}).observe(host);
}})();
</script>"#,
        id = id,
        reserved = geometry.reserved_height(),
        w = geometry.design_width,
        h = geometry.design_height,
        scale = geometry.scale,
        nodes = nodes,
    )
}

/// Line chart over 24 hourly points.
pub fn line_chart(series: &[(&str, &[f64])], max: f64, unit: &str) -> String {
    const W: f64 = 520.0;
    const H: f64 = 126.0;
    let mut paths = String::new();
    for (color, values) in series {
        paths.push_str(&format!(
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            geometry::polyline(values, W, H, max),
            color
        ));
    }
    let grid: String = [0.0, 0.25, 0.5, 0.75, 1.0]
        .iter()
        .map(|t| {
            format!(
                r##"<line x1="0" y1="{y:.1}" x2="{W}" y2="{y:.1}" stroke="#2a3f50" opacity="0.3"/>"##,
                y = H * t
            )
        })
        .collect();
    format!(
        r#"<svg class="line" width="100%" height="{H}" viewBox="0 0 {W} {H}" preserveAspectRatio="none">{grid}{paths}</svg><small>단위: {unit}</small>"#,
        unit = escape(unit),
    )
}

pub fn log_table(entries: &[LogEntry]) -> String {
    if entries.is_empty() {
        return "<p class=\"empty\">표시할 로그가 없습니다.</p>".to_string();
    }
    let rows: String = entries
        .iter()
        .map(|e| {
            format!(
                r#"<tr><td>{}</td><td>{}</td><td class="lv-{}">{}</td></tr>"#,
                escape(&e.scope),
                escape(&e.time),
                e.level.as_str(),
                escape(&e.msg)
            )
        })
        .collect();
    format!("<table class=\"logs\"><thead><tr><th>구분</th><th>시간</th><th>내용</th></tr></thead><tbody>{rows}</tbody></table>")
}
