//! Pixel and angle geometry for bars, ticks, gauges, donuts and line traces.
//! All functions are deterministic; SVG coordinates have y growing downward.

use serde::Serialize;

use crate::metrics::BarRow;

/// Normalized position of `value` inside `[min, max]`, clamped to `[0, 1]`.
/// A degenerate domain maps everything to 0.
pub fn unit_fraction(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if !(span.is_finite() && span > 0.0) || !value.is_finite() {
        return 0.0;
    }
    ((value - min) / span).clamp(0.0, 1.0)
}

/// Width of a linear bar inside a box of `box_width_px`.
pub fn bar_width(value: f64, min: f64, max: f64, box_width_px: f64) -> f64 {
    unit_fraction(value, min, max) * box_width_px.max(0.0)
}

/// Horizontal extent of a plot area.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PlotBox {
    pub left: f64,
    pub width: f64,
}

/// `plot_left + t/max * plot_width` for each tick.
pub fn tick_positions(ticks: &[f64], domain_max: f64, plot: PlotBox) -> Vec<f64> {
    ticks
        .iter()
        .map(|t| plot.left + bar_width(*t, 0.0, domain_max, plot.width))
        .collect()
}

/// Row metrics of the accumulated chart.
pub const BAR_HEIGHT_PX: f64 = 20.0;
pub const BAR_GAP_PX: f64 = 8.0;
pub const PREVIOUS_OPACITY: f64 = 0.35;
pub const CURRENT_OPACITY: f64 = 0.95;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BarRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub opacity: f64,
}

/// Two bars for one row: previous period on top, current period below, one gap apart.
pub fn row_bars(row: &BarRow, plot: PlotBox, row_top: f64) -> [BarRect; 2] {
    let bar = |value: f64, y: f64, opacity: f64| BarRect {
        x: plot.left,
        y,
        width: bar_width(value, 0.0, row.domain_max, plot.width),
        height: BAR_HEIGHT_PX,
        opacity,
    };
    [
        bar(row.previous, row_top, PREVIOUS_OPACITY),
        bar(row.current, row_top + BAR_HEIGHT_PX + BAR_GAP_PX, CURRENT_OPACITY),
    ]
}

/// Vertical pitch of one chart row including the spacing under it.
pub fn row_pitch(row_spacing: f64) -> f64 {
    BAR_HEIGHT_PX * 2.0 + BAR_GAP_PX + row_spacing
}

pub const GAUGE_START_DEG: f64 = 180.0;
pub const GAUGE_END_DEG: f64 = 360.0;

/// Semicircular gauge frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GaugeFrame {
    pub width: f64,
    pub height: f64,
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
    pub stroke: f64,
}

impl GaugeFrame {
    /// Layout used by the PV page gauges.
    pub fn pv() -> Self {
        Self::new(332.0, 206.0, 38.0)
    }

    pub fn new(width: f64, height: f64, stroke: f64) -> Self {
        Self {
            width,
            height,
            cx: width / 2.0,
            cy: height * 0.8,
            radius: width.min(height) * 0.48,
            stroke,
        }
    }

    pub fn point(&self, deg: f64) -> (f64, f64) {
        let rad = deg.to_radians();
        (self.cx + self.radius * rad.cos(), self.cy + self.radius * rad.sin())
    }

    /// SVG arc from `start_deg` to `end_deg`, swept clockwise.
    pub fn arc_path(&self, start_deg: f64, end_deg: f64) -> String {
        let (sx, sy) = self.point(start_deg);
        let (ex, ey) = self.point(end_deg);
        let large = large_arc_flag(start_deg, end_deg);
        format!(
            "M {sx:.3} {sy:.3} A {r:.3} {r:.3} 0 {large} 1 {ex:.3} {ey:.3}",
            r = self.radius
        )
    }

    /// Background track and value arc for one reading.
    pub fn arcs(&self, value: f64, min: f64, max: f64) -> GaugeArcs {
        let value_deg = gauge_angle(value, min, max);
        GaugeArcs {
            track: self.arc_path(GAUGE_START_DEG, GAUGE_END_DEG),
            value: self.arc_path(GAUGE_START_DEG, value_deg),
            value_deg,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GaugeArcs {
    pub track: String,
    pub value: String,
    pub value_deg: f64,
}

/// End angle of the value arc: 180 at `min`, 360 at `max`.
pub fn gauge_angle(value: f64, min: f64, max: f64) -> f64 {
    GAUGE_START_DEG + unit_fraction(value, min, max) * (GAUGE_END_DEG - GAUGE_START_DEG)
}

/// 0 for sweeps up to half a turn, 1 beyond.
pub fn large_arc_flag(start_deg: f64, end_deg: f64) -> u8 {
    if end_deg - start_deg <= 180.0 { 0 } else { 1 }
}

/// Full-circle donut sweep for a percentage.
pub fn donut_sweep_deg(pct: f64) -> f64 {
    if !pct.is_finite() {
        return 0.0;
    }
    pct.clamp(0.0, 100.0) * 3.6
}

/// `stroke-dasharray` pair for a donut ring of `radius`.
pub fn donut_dash(pct: f64, radius: f64) -> (f64, f64) {
    let circumference = 2.0 * std::f64::consts::PI * radius;
    let filled = circumference * donut_sweep_deg(pct) / 360.0;
    (filled, circumference - filled)
}

/// Polyline points for a series stretched across a `width` x `height` box.
/// `max` is the value mapped to the top edge; non-positive `max` falls back to the series max.
pub fn polyline(values: &[f64], width: f64, height: f64, max: f64) -> String {
    if values.is_empty() {
        return String::new();
    }
    let top = if max > 0.0 {
        max
    } else {
        values.iter().copied().fold(0.0_f64, f64::max).max(1.0)
    };
    let step = if values.len() > 1 {
        width / (values.len() - 1) as f64
    } else {
        0.0
    };
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let x = step * i as f64;
            let y = height - unit_fraction(*v, 0.0, top) * height;
            format!("{x:.1},{y:.1}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_width_saturates_and_is_monotonic() {
        let mut last = -1.0;
        for v in (0..=80).map(|i| f64::from(i) * 100.0) {
            let w = bar_width(v, 0.0, 6000.0, 600.0);
            assert!(w >= last);
            last = w;
        }
        assert_eq!(bar_width(6000.0, 0.0, 6000.0, 600.0), 600.0);
        assert_eq!(bar_width(9000.0, 0.0, 6000.0, 600.0), 600.0);
        assert_eq!(bar_width(-5.0, 0.0, 6000.0, 600.0), 0.0);
        assert_eq!(bar_width(3000.0, 0.0, 6000.0, 600.0), 300.0);
    }

    #[test]
    fn degenerate_domain_is_empty() {
        assert_eq!(bar_width(5.0, 3.0, 3.0, 100.0), 0.0);
        assert_eq!(bar_width(f64::NAN, 0.0, 10.0, 100.0), 0.0);
    }

    #[test]
    fn ticks_follow_plot_box() {
        let plot = PlotBox { left: 120.0, width: 600.0 };
        let xs = tick_positions(&[0.0, 2000.0, 4000.0, 6000.0], 6000.0, plot);
        for (x, expected) in xs.iter().zip([120.0, 320.0, 520.0, 720.0]) {
            assert!((x - expected).abs() < 1e-9, "{x} != {expected}");
        }
    }

    #[test]
    fn row_bars_stack_with_gap() {
        let row = BarRow {
            name: "발전량",
            previous: 1500.0,
            current: 3000.0,
            domain_max: 6000.0,
            color: "#c5ff46",
        };
        let plot = PlotBox { left: 10.0, width: 400.0 };
        let [prev, cur] = row_bars(&row, plot, 50.0);
        assert_eq!(prev.y, 50.0);
        assert_eq!(cur.y, 50.0 + BAR_HEIGHT_PX + BAR_GAP_PX);
        assert_eq!(prev.width, 100.0);
        assert_eq!(cur.width, 200.0);
        assert_eq!(prev.opacity, PREVIOUS_OPACITY);
        assert_eq!(cur.opacity, CURRENT_OPACITY);
    }

    #[test]
    fn gauge_angle_spans_bottom_half() {
        assert_eq!(gauge_angle(0.0, 0.0, 100.0), 180.0);
        assert_eq!(gauge_angle(100.0, 0.0, 100.0), 360.0);
        assert_eq!(gauge_angle(50.0, 0.0, 100.0), 270.0);
        assert_eq!(gauge_angle(-20.0, 0.0, 100.0), 180.0);
        assert_eq!(gauge_angle(700.0, 0.0, 627.12), 360.0);
        let mut last = 0.0;
        for v in 0..=100 {
            let a = gauge_angle(f64::from(v), 0.0, 100.0);
            assert!(a >= last);
            last = a;
        }
    }

    #[test]
    fn large_arc_flag_flips_past_half_turn() {
        assert_eq!(large_arc_flag(180.0, 360.0), 0);
        assert_eq!(large_arc_flag(180.0, 250.0), 0);
        assert_eq!(large_arc_flag(0.0, 270.0), 1);
    }

    #[test]
    fn pv_frame_matches_layout() {
        let g = GaugeFrame::pv();
        assert_eq!(g.cx, 166.0);
        assert!((g.cy - 164.8).abs() < 1e-9);
        assert!((g.radius - 98.88).abs() < 1e-9);
        let (x, y) = g.point(180.0);
        assert!((x - (166.0 - 98.88)).abs() < 1e-9);
        assert!((y - 164.8).abs() < 1e-9);
    }

    #[test]
    fn arc_path_has_svg_shape() {
        let g = GaugeFrame::new(200.0, 200.0, 10.0);
        let path = g.arc_path(180.0, 360.0);
        assert!(path.starts_with("M 4.000 160.000 A 96.000 96.000 0 0 1 196.000"));
    }

    #[test]
    fn donut_sweep_clamps() {
        assert_eq!(donut_sweep_deg(50.0), 180.0);
        assert_eq!(donut_sweep_deg(140.0), 360.0);
        assert_eq!(donut_sweep_deg(-3.0), 0.0);
        let (filled, rest) = donut_dash(25.0, 10.0);
        assert!((filled * 4.0 - (filled + rest)).abs() < 1e-9);
    }

    #[test]
    fn polyline_maps_extremes() {
        let pts = polyline(&[0.0, 5.0, 10.0], 100.0, 50.0, 10.0);
        assert_eq!(pts, "0.0,50.0 50.0,25.0 100.0,0.0");
        assert!(polyline(&[], 100.0, 50.0, 10.0).is_empty());
    }
}
