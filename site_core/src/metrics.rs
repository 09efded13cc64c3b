//! Display values derived from a `StatusSnapshot`.
//! Everything here is a pure function of its inputs; the live pages and the report
//! both call into this module so the two never disagree.

use serde::Serialize;

use crate::snapshot::{LogEntry, StatusSnapshot};

/// Placeholder shown when a value has nothing to render.
pub const PLACEHOLDER: &str = "-";

/// Accumulated-energy chart domain, kWh.
pub const ACCUM_DOMAIN_MAX_KWH: f64 = 6000.0;
pub const ACCUM_TICKS_KWH: [f64; 4] = [0.0, 2000.0, 4000.0, 6000.0];

/// Fallback domain for the PV output gauge when the site has no capacity on record.
pub const DEFAULT_PV_CAPACITY_KW: f64 = 627.12;

pub const HOURS_PER_DAY: usize = 24;

/// `round(clamp(value/base, 0, 1) * 100)`. A zero base is treated as 1.
pub fn pct(value: f64, base: f64) -> u8 {
    let base = if base == 0.0 || !base.is_finite() { 1.0 } else { base };
    let ratio = value / base;
    if ratio.is_nan() {
        return 0;
    }
    (ratio.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// `round(active/total*100)`, or 0 with no nodes. Not clamped: more active than total reads above 100.
pub fn rate(active: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(active) / f64::from(total) * 100.0).round() as u32
}

/// Clamp an already-percent reading into 0..=100 and round it.
pub fn clamp_pct(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

pub fn mwh_to_kwh(mwh: f64) -> f64 {
    mwh * 1000.0
}

/// First window as `"start~end"`; an empty sequence renders the placeholder.
pub fn format_peak_window(snapshot: &StatusSnapshot) -> String {
    match snapshot.curtailment.peak_windows.first() {
        Some(w) => format!("{}~{}", w.start, w.end),
        None => PLACEHOLDER.to_string(),
    }
}

/// `(now - avg) / avg * 100`, `None` when there is no average to compare against.
pub fn change_rate(now: f64, avg: f64) -> Option<f64> {
    if avg == 0.0 {
        return None;
    }
    let r = (now - avg) / avg * 100.0;
    r.is_finite().then_some(r)
}

pub fn format_change_rate(now: f64, avg: f64) -> String {
    match change_rate(now, avg) {
        Some(r) => format!("{r:.1}%"),
        None => PLACEHOLDER.to_string(),
    }
}

/// One tenth of a unit, never negative.
pub fn round_tenth(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    ((value * 10.0).round() / 10.0).max(0.0)
}

/// Stretch or truncate a series to one value per hour; missing hours read 0.
pub fn hourly(values: &[f64]) -> Vec<f64> {
    (0..HOURS_PER_DAY)
        .map(|h| round_tenth(values.get(h).copied().unwrap_or(0.0)))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Donut {
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
    pub unit: &'static str,
    pub pct: u8,
    pub color: &'static str,
}

impl Donut {
    /// Sweep in degrees for a full-circle donut.
    pub fn sweep_deg(&self) -> f64 {
        crate::geometry::donut_sweep_deg(f64::from(self.pct))
    }
}

/// The five headline donuts, in display order.
pub fn donuts(snapshot: &StatusSnapshot) -> Vec<Donut> {
    let c = &snapshot.curtailment;
    let pred_base = c.pred_daily_max.unwrap_or(c.pred_today);
    vec![
        Donut {
            key: "pred",
            label: "예측 출력제어량",
            value: format!("{:.1}", c.pred_today),
            unit: "MWh",
            pct: pct(round_tenth(c.pred_today), pred_base),
            color: "#c5ff46",
        },
        Donut {
            key: "cum",
            label: "누적 출력제어량",
            value: format!("{:.1}", c.actual_cum_today),
            unit: "MWh",
            pct: pct(round_tenth(c.actual_cum_today), c.pred_today),
            color: "#63d8ff",
        },
        Donut {
            key: "peak",
            label: "피크 위험 시간대",
            value: format_peak_window(snapshot),
            unit: "",
            pct: clamp_pct(c.peak_risk_pct),
            color: "#f1a256",
        },
        Donut {
            key: "ess",
            label: "ESS 상태",
            value: format!("{}", snapshot.ess.power_kw.round() as i64),
            unit: "kW",
            pct: clamp_pct(snapshot.ess.soc),
            color: "#ae8bff",
        },
        Donut {
            key: "vpp",
            label: "VPP 가동률",
            value: format!("{}/{}", snapshot.vpp.active_nodes, snapshot.vpp.total_nodes),
            unit: "",
            pct: rate(snapshot.vpp.active_nodes, snapshot.vpp.total_nodes).min(100) as u8,
            color: "#ff9ab3",
        },
    ]
}

/// One row of the accumulated-energy chart, in kWh.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BarRow {
    pub name: &'static str,
    pub previous: f64,
    pub current: f64,
    pub domain_max: f64,
    pub color: &'static str,
}

pub fn accumulated_rows(snapshot: &StatusSnapshot) -> Vec<BarRow> {
    let e = &snapshot.energy;
    let row = |name, previous, current, color| BarRow {
        name,
        previous,
        current,
        domain_max: ACCUM_DOMAIN_MAX_KWH,
        color,
    };
    vec![
        row("발전량", e.generation_yday_kwh, e.generation_today_kwh, "#c5ff46"),
        row("ESS 충전량", e.ess_charge_yday_kwh, e.ess_charge_today_kwh, "#63d8ff"),
        row("ESS 방전량", e.ess_discharge_yday_kwh, e.ess_discharge_today_kwh, "#f1a256"),
        row("VPP 감축량", e.vpp_shed_yday_kwh, e.vpp_shed_today_kwh, "#ae8bff"),
        row(
            "출력제어 누적",
            mwh_to_kwh(snapshot.curtailment.actual_yday_total),
            mwh_to_kwh(snapshot.curtailment.actual_cum_today),
            "#ff9ab3",
        ),
    ]
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceBoard {
    pub smp_now: f64,
    pub smp_avg: f64,
    pub rec_now: f64,
    pub rec_avg: f64,
    /// SMP + REC, both already per kWh.
    pub combined_now: f64,
    pub smp_change: String,
    pub rec_change: String,
    pub updated_at: String,
}

pub fn price_board(snapshot: &StatusSnapshot) -> PriceBoard {
    let e = &snapshot.economics;
    PriceBoard {
        smp_now: e.smp_now,
        smp_avg: e.smp_avg,
        rec_now: e.rec_now,
        rec_avg: e.rec_avg,
        combined_now: e.smp_now + e.rec_now,
        smp_change: format_change_rate(e.smp_now, e.smp_avg),
        rec_change: format_change_rate(e.rec_now, e.rec_avg),
        updated_at: if e.updated_at.is_empty() {
            PLACEHOLDER.to_string()
        } else {
            e.updated_at.clone()
        },
    }
}

/// Operating state of the PCS as shown on the flow diagram.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PcsState {
    Charging,
    Discharging,
    Running,
    Stopped,
    Standby,
    CommLoss,
}

impl PcsState {
    pub const ALL: [PcsState; 6] = [
        PcsState::Charging,
        PcsState::Discharging,
        PcsState::Running,
        PcsState::Stopped,
        PcsState::Standby,
        PcsState::CommLoss,
    ];

    /// Unknown labels fall back to the sign of the ESS power.
    pub fn classify(label: &str, power_kw: f64) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "charging" | "charge" | "충전중" => PcsState::Charging,
            "discharging" | "discharge" | "방전중" => PcsState::Discharging,
            "stopped" | "stop" | "fault" => PcsState::Stopped,
            "offline" | "comm_loss" | "commloss" => PcsState::CommLoss,
            "running" | "run" => PcsState::Running,
            _ if power_kw > 0.1 => PcsState::Discharging,
            _ if power_kw < -0.1 => PcsState::Charging,
            _ => PcsState::Standby,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PcsState::Charging => "충전",
            PcsState::Discharging => "방전",
            PcsState::Running => "운전",
            PcsState::Stopped => "정지",
            PcsState::Standby => "대기",
            PcsState::CommLoss => "통신이상",
        }
    }

    pub fn chip(self) -> &'static str {
        match self {
            PcsState::Charging => "충전중",
            PcsState::Discharging => "방전중",
            PcsState::Running => "운전중",
            PcsState::Stopped => "정지",
            PcsState::Standby => "대기중",
            PcsState::CommLoss => "통신이상",
        }
    }
}

/// Values printed on the flow diagram.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowReadings {
    pub pv_kw: f64,
    pub charge_kw: f64,
    pub discharge_kw: f64,
    pub pcs_state: PcsState,
    pub soc_pct: u8,
    pub soh_pct: u8,
    pub battery_temp_c: f64,
    pub irradiance_tilt_wm2: f64,
    pub irradiance_horizontal_wm2: f64,
    pub module_temp_c: f64,
    pub ambient_temp_c: f64,
}

pub fn flow_readings(snapshot: &StatusSnapshot) -> FlowReadings {
    let power = snapshot.ess.power_kw;
    FlowReadings {
        pv_kw: snapshot.pv.output_kw,
        charge_kw: (-power).max(0.0),
        discharge_kw: power.max(0.0),
        pcs_state: PcsState::classify(&snapshot.ess.state, power),
        soc_pct: clamp_pct(snapshot.ess.soc),
        soh_pct: clamp_pct(snapshot.ess.soh),
        battery_temp_c: snapshot.ess.temperature_c,
        irradiance_tilt_wm2: snapshot.pv.irradiance_tilt_wm2,
        irradiance_horizontal_wm2: snapshot.pv.irradiance_horizontal_wm2,
        module_temp_c: snapshot.pv.module_temp_c,
        ambient_temp_c: snapshot.pv.ambient_temp_c,
    }
}

/// A PV gauge reading plus its domain.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GaugeReading {
    pub label: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub unit: &'static str,
    pub color: &'static str,
}

pub fn pv_gauges(snapshot: &StatusSnapshot) -> Vec<GaugeReading> {
    let capacity = if snapshot.site.pv_capacity_kwp > 0.0 {
        snapshot.site.pv_capacity_kwp
    } else {
        DEFAULT_PV_CAPACITY_KW
    };
    vec![
        GaugeReading {
            label: "인버터 효율",
            value: snapshot.pv.inverter_efficiency_pct,
            min: 0.0,
            max: 100.0,
            unit: "%",
            color: "#c5ff46",
        },
        GaugeReading {
            label: "현재 출력",
            value: snapshot.pv.output_kw,
            min: 0.0,
            max: capacity,
            unit: "kW",
            color: "#63d8ff",
        },
        GaugeReading {
            label: "발전 효율",
            value: snapshot.pv.generation_efficiency_pct,
            min: 0.0,
            max: 100.0,
            unit: "%",
            color: "#f1a256",
        },
    ]
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tile {
    pub label: &'static str,
    pub value: String,
    pub unit: &'static str,
}

pub fn pv_tiles(snapshot: &StatusSnapshot) -> Vec<Tile> {
    let pv = &snapshot.pv;
    let tile = |label, value, unit| Tile { label, value, unit };
    vec![
        tile("현재 출력", format!("{:.1}", pv.output_kw), "kW"),
        tile("금일 발전량", format!("{:.1}", pv.today_kwh), "kWh"),
        tile("발전 시간", format!("{:.1}", pv.generation_hours), "h"),
        tile("월간 발전량", format!("{:.2}", pv.month_mwh), "MWh"),
        tile("연간 발전량", format!("{:.2}", pv.year_mwh), "MWh"),
    ]
}

/// Headline figures shared by the KPI cards and the summary paragraph.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Kpi {
    pub pred_mwh: f64,
    pub cum_mwh: f64,
    pub soc_pct: i64,
    pub vpp_rate: u32,
}

pub fn kpi(snapshot: &StatusSnapshot) -> Kpi {
    Kpi {
        pred_mwh: snapshot.curtailment.pred_today,
        cum_mwh: snapshot.curtailment.actual_cum_today,
        soc_pct: snapshot.ess.soc.round() as i64,
        vpp_rate: rate(snapshot.vpp.active_nodes, snapshot.vpp.total_nodes),
    }
}

/// Newest entries first, capped at `limit`.
pub fn recent_logs(snapshot: &StatusSnapshot, limit: usize) -> Vec<LogEntry> {
    snapshot.logs.iter().take(limit).cloned().collect()
}
