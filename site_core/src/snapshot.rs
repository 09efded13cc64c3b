//! Normalized site status.
//! `StatusSnapshot::normalize` turns whatever the backend sent into a fully-populated,
//! finite-valued snapshot. It never fails; an unusable payload yields `StatusSnapshot::default()`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::{count, finite, lookup, num, series, text};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub energy: EnergyTotals,
    pub curtailment: Curtailment,
    pub ess: EssStatus,
    pub vpp: VppStatus,
    pub economics: Economics,
    pub site: SiteInfo,
    pub pv: PvStatus,
    pub alarms: AlarmCounts,
    pub logs: Vec<LogEntry>,
    /// Free-text alarm banner from flat legacy payloads.
    #[serde(rename = "alarm")]
    pub alarm_banner: String,
}

/// Daily totals in kWh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyTotals {
    pub generation_today_kwh: f64,
    pub generation_yday_kwh: f64,
    pub ess_charge_today_kwh: f64,
    pub ess_charge_yday_kwh: f64,
    pub ess_discharge_today_kwh: f64,
    pub ess_discharge_yday_kwh: f64,
    pub vpp_shed_today_kwh: f64,
    pub vpp_shed_yday_kwh: f64,
}

/// Curtailment figures in MWh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Curtailment {
    pub pred_today: f64,
    /// Only present when the backend publishes a daily ceiling.
    pub pred_daily_max: Option<f64>,
    pub actual_cum_today: f64,
    pub actual_yday_total: f64,
    /// Input order is kept; consumers take the first entry.
    pub peak_windows: Vec<PeakWindow>,
    pub peak_risk_pct: f64,
    pub hourly: Vec<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub start: String,
    pub end: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EssStatus {
    /// Positive = discharge, negative = charge.
    pub power_kw: f64,
    pub soc: f64,
    pub soh: f64,
    pub temperature_c: f64,
    pub state: String,
    pub today_throughput_kwh: f64,
    pub cycles: f64,
    pub charge_kw_series: Vec<f64>,
    pub discharge_kw_series: Vec<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VppStatus {
    pub active_nodes: u32,
    pub total_nodes: u32,
    pub availability_pct: f64,
}

/// Market prices in 원/kWh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Economics {
    pub smp_now: f64,
    pub smp_avg: f64,
    pub rec_now: f64,
    pub rec_avg: f64,
    pub updated_at: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub name: String,
    pub location: String,
    pub pv_capacity_kwp: f64,
    pub ess_capacity_kwh: f64,
    pub operator: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PvStatus {
    pub output_kw: f64,
    pub today_kwh: f64,
    pub generation_hours: f64,
    pub month_mwh: f64,
    pub year_mwh: f64,
    pub inverter_efficiency_pct: f64,
    pub generation_efficiency_pct: f64,
    pub irradiance_tilt_wm2: f64,
    pub irradiance_horizontal_wm2: f64,
    pub module_temp_c: f64,
    pub ambient_temp_c: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmCounts {
    pub error: u32,
    pub warn: u32,
    pub info: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "warn" | "warning" => Severity::Warn,
            "error" | "err" | "critical" => Severity::Error,
            _ => Severity::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: String,
    pub scope: String,
    pub msg: String,
    pub level: Severity,
}

impl StatusSnapshot {
    /// Build a snapshot from an arbitrary payload.
    pub fn normalize(raw: &Value) -> Self {
        let at = |path: &[&str]| lookup(raw, path);
        let f = |path: &[&str]| num(at(path), 0.0);

        let energy = EnergyTotals {
            generation_today_kwh: f(&["energy", "generation_today_kwh"]),
            generation_yday_kwh: f(&["energy", "generation_yday_kwh"]),
            ess_charge_today_kwh: f(&["energy", "ess_charge_today_kwh"]),
            ess_charge_yday_kwh: f(&["energy", "ess_charge_yday_kwh"]),
            ess_discharge_today_kwh: f(&["energy", "ess_discharge_today_kwh"]),
            ess_discharge_yday_kwh: f(&["energy", "ess_discharge_yday_kwh"]),
            vpp_shed_today_kwh: f(&["energy", "vpp_shed_today_kwh"]),
            vpp_shed_yday_kwh: f(&["energy", "vpp_shed_yday_kwh"]),
        };

        let curtailment = Curtailment {
            pred_today: f(&["curtailment", "pred_today"]),
            pred_daily_max: finite(at(&["curtailment", "pred_daily_max"])),
            actual_cum_today: f(&["curtailment", "actual_cum_today"]),
            actual_yday_total: f(&["curtailment", "actual_yday_total"]),
            peak_windows: peak_windows(at(&["curtailment", "peak_windows"])),
            peak_risk_pct: f(&["curtailment", "peak_risk_pct"]),
            hourly: series(at(&["curtailment", "hourly"])),
        };

        // Flat `ess_soc` / `pv_output` only fill in when the nested field is absent.
        let soc = finite(at(&["ess", "soc"]))
            .or_else(|| finite(at(&["ess_soc"])))
            .unwrap_or(0.0);
        let ess = EssStatus {
            power_kw: f(&["ess", "power_kw"]),
            soc,
            soh: f(&["ess", "soh"]),
            temperature_c: f(&["ess", "temperature_c"]),
            state: text(at(&["ess", "state"])),
            today_throughput_kwh: f(&["ess", "today_throughput_kwh"]),
            cycles: f(&["ess", "cycles"]),
            charge_kw_series: series(at(&["ess", "charge_kw_series"])),
            discharge_kw_series: series(at(&["ess", "discharge_kw_series"])),
        };

        let vpp = VppStatus {
            active_nodes: count(at(&["vpp", "active_nodes"])),
            total_nodes: count(at(&["vpp", "total_nodes"])),
            availability_pct: f(&["vpp", "availability_pct"]),
        };

        let economics = Economics {
            smp_now: f(&["economics", "smp_now"]),
            smp_avg: f(&["economics", "smp_avg"]),
            rec_now: f(&["economics", "rec_now"]),
            rec_avg: f(&["economics", "rec_avg"]),
            updated_at: text(at(&["economics", "updated_at"])),
        };

        let site = SiteInfo {
            name: text(at(&["site", "name"])),
            location: text(at(&["site", "location"])),
            pv_capacity_kwp: f(&["site", "pv_capacity_kwp"]),
            ess_capacity_kwh: f(&["site", "ess_capacity_kwh"]),
            operator: text(at(&["site", "operator"])),
        };

        let pv = PvStatus {
            output_kw: finite(at(&["pv", "output_kw"]))
                .or_else(|| finite(at(&["pv_output"])))
                .unwrap_or(0.0),
            today_kwh: f(&["pv", "today_kwh"]),
            generation_hours: f(&["pv", "generation_hours"]),
            month_mwh: f(&["pv", "month_mwh"]),
            year_mwh: f(&["pv", "year_mwh"]),
            inverter_efficiency_pct: f(&["pv", "inverter_efficiency_pct"]),
            generation_efficiency_pct: f(&["pv", "generation_efficiency_pct"]),
            irradiance_tilt_wm2: f(&["pv", "irradiance_tilt_wm2"]),
            irradiance_horizontal_wm2: f(&["pv", "irradiance_horizontal_wm2"]),
            module_temp_c: f(&["pv", "module_temp_c"]),
            ambient_temp_c: f(&["pv", "ambient_temp_c"]),
        };

        let alarms = AlarmCounts {
            error: count(at(&["alarms", "error"])),
            warn: count(at(&["alarms", "warn"])),
            info: count(at(&["alarms", "info"])),
        };

        Self {
            energy,
            curtailment,
            ess,
            vpp,
            economics,
            site,
            pv,
            alarms,
            logs: log_entries(at(&["logs"])),
            alarm_banner: text(at(&["alarm"])),
        }
    }
}

fn peak_windows(value: Option<&Value>) -> Vec<PeakWindow> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    let strict = |v: Option<&Value>| v.and_then(Value::as_str).unwrap_or_default().to_string();
    items
        .iter()
        .map(|item| PeakWindow {
            start: strict(item.get("start")),
            end: strict(item.get("end")),
        })
        .collect()
}

fn log_entries(value: Option<&Value>) -> Vec<LogEntry> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| LogEntry {
            time: text(item.get("time")),
            scope: text(item.get("scope")),
            msg: text(item.get("msg")),
            level: Severity::parse(&text(item.get("level"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn all_finite(s: &StatusSnapshot) -> bool {
        let e = &s.energy;
        let c = &s.curtailment;
        let x = &s.ess;
        let p = &s.pv;
        [
            e.generation_today_kwh,
            e.generation_yday_kwh,
            e.ess_charge_today_kwh,
            e.ess_charge_yday_kwh,
            e.ess_discharge_today_kwh,
            e.ess_discharge_yday_kwh,
            e.vpp_shed_today_kwh,
            e.vpp_shed_yday_kwh,
            c.pred_today,
            c.pred_daily_max.unwrap_or(0.0),
            c.actual_cum_today,
            c.actual_yday_total,
            c.peak_risk_pct,
            x.power_kw,
            x.soc,
            x.soh,
            x.temperature_c,
            x.today_throughput_kwh,
            x.cycles,
            s.vpp.availability_pct,
            s.economics.smp_now,
            s.economics.smp_avg,
            s.economics.rec_now,
            s.economics.rec_avg,
            s.site.pv_capacity_kwp,
            s.site.ess_capacity_kwh,
            p.output_kw,
            p.today_kwh,
            p.month_mwh,
            p.year_mwh,
        ]
        .iter()
        .chain(c.hourly.iter())
        .chain(x.charge_kw_series.iter())
        .chain(x.discharge_kw_series.iter())
        .all(|v| v.is_finite())
    }

    #[test]
    fn empty_payloads_yield_defaults() {
        for raw in [json!(null), json!({}), json!([]), json!("status"), json!(42)] {
            let snap = StatusSnapshot::normalize(&raw);
            assert_eq!(snap, StatusSnapshot::default());
        }
    }

    #[test]
    fn malformed_fields_stay_finite() {
        let raw = json!({
            "energy": "broken",
            "curtailment": {
                "pred_today": "NaN",
                "actual_cum_today": {"nested": true},
                "hourly": [1, "x", null, 2.5],
                "peak_windows": "13:00",
            },
            "ess": {"soc": "78", "power_kw": null, "charge_kw_series": {"0": 1}},
            "vpp": {"active_nodes": "19", "total_nodes": -4},
            "economics": {"smp_now": "1e999"},
        });
        let snap = StatusSnapshot::normalize(&raw);
        assert!(all_finite(&snap));
        assert_eq!(snap.curtailment.pred_today, 0.0);
        assert_eq!(snap.curtailment.hourly, vec![1.0, 0.0, 0.0, 2.5]);
        assert!(snap.curtailment.peak_windows.is_empty());
        assert_eq!(snap.ess.soc, 78.0);
        assert_eq!(snap.vpp.active_nodes, 19);
        assert_eq!(snap.vpp.total_nodes, 0);
        assert_eq!(snap.economics.smp_now, 0.0);
    }

    #[test]
    fn peak_windows_keep_order_and_blank_non_strings() {
        let raw = json!({"curtailment": {"peak_windows": [
            {"start": "15:00", "end": "16:00"},
            {"start": 13, "end": null},
        ]}});
        let snap = StatusSnapshot::normalize(&raw);
        assert_eq!(snap.curtailment.peak_windows[0].start, "15:00");
        assert_eq!(snap.curtailment.peak_windows[1], PeakWindow::default());
    }

    #[test]
    fn pred_daily_max_only_when_present() {
        let with = StatusSnapshot::normalize(&json!({"curtailment": {"pred_daily_max": 6.5}}));
        assert_eq!(with.curtailment.pred_daily_max, Some(6.5));
        let without = StatusSnapshot::normalize(&json!({"curtailment": {}}));
        assert_eq!(without.curtailment.pred_daily_max, None);
    }

    #[test]
    fn flat_legacy_keys_fill_gaps() {
        let raw = json!({"ess_soc": 72, "pv_output": 43.5, "alarm": "No Alarm"});
        let snap = StatusSnapshot::normalize(&raw);
        assert_eq!(snap.ess.soc, 72.0);
        assert_eq!(snap.pv.output_kw, 43.5);
        assert_eq!(snap.alarm_banner, "No Alarm");

        let nested_wins = json!({"ess": {"soc": 50}, "ess_soc": 72});
        assert_eq!(StatusSnapshot::normalize(&nested_wins).ess.soc, 50.0);
    }

    #[test]
    fn serialized_snapshot_normalizes_back() {
        let mut snap = StatusSnapshot::default();
        snap.curtailment.pred_daily_max = Some(6.0);
        snap.vpp.active_nodes = 19;
        snap.alarm_banner = "No Alarm".to_string();
        snap.logs.push(LogEntry {
            time: "10:01".to_string(),
            scope: "PCS".to_string(),
            msg: "INV RUN".to_string(),
            level: Severity::Error,
        });
        let wire = serde_json::to_value(&snap).expect("serialize");
        assert_eq!(StatusSnapshot::normalize(&wire), snap);
    }

    #[test]
    fn logs_parse_levels() {
        let raw = json!({"logs": [
            {"time": "10:01", "scope": "BMS[BMS]", "msg": "NPS Normal", "level": "warn"},
            {"time": "10:02", "scope": "PCS", "msg": "INV RUN", "level": "bogus"},
            "junk",
        ]});
        let snap = StatusSnapshot::normalize(&raw);
        assert_eq!(snap.logs.len(), 2);
        assert_eq!(snap.logs[0].level, Severity::Warn);
        assert_eq!(snap.logs[1].level, Severity::Info);
    }
}
