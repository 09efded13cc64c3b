//! Site simulator with a simple time-of-day model.
//! - PV follows a half-sine between 06:00 and 18:00 with cloud jitter.
//! - ESS charges on surplus PV and discharges in the evening, ramped and bounded by its config.
//! - VPP sheds enabled resources during peak-risk windows.
//! Everything is kept in kW/kWh internally; curtailment is reported in MWh.

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, Local, Timelike};
use rand::Rng;

use site_core::config::hour_forbidden;
use site_core::metrics::HOURS_PER_DAY;
use site_core::snapshot::{
    AlarmCounts, Curtailment, Economics, EnergyTotals, EssStatus, LogEntry, PvStatus, Severity,
    SiteInfo, StatusSnapshot, VppStatus,
};
use site_core::{EssConfig, VppConfig};

use crate::models::SiteFile;

const LOG_CAPACITY: usize = 50;
/// Ramp of the ESS power setpoint, kW per minute.
const ESS_RAMP_KW_PER_MIN: f64 = 120.0;
const EVENING_DISCHARGE: (u32, u32) = (18, 22);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SocState {
    BelowMin,
    InRange,
    AboveMax,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct DayTotals {
    generation_kwh: f64,
    charge_kwh: f64,
    discharge_kwh: f64,
    shed_kwh: f64,
    curtailed_kwh: f64,
}

#[derive(Clone, Debug)]
pub struct SiteSimulator {
    site: SiteFile,
    ess_cfg: EssConfig,
    vpp_cfg: VppConfig,
    soc_kwh: f64,
    power_kw: f64,
    soc_state: SocState,
    cycles: f64,
    pv_kw: f64,
    shed_kw: f64,
    today: DayTotals,
    yesterday: DayTotals,
    month_kwh: f64,
    year_kwh: f64,
    generation_secs: f64,
    curtail_hourly_mwh: [f64; HOURS_PER_DAY],
    charge_series: [f64; HOURS_PER_DAY],
    discharge_series: [f64; HOURS_PER_DAY],
    smp: Market,
    rec: Market,
    vpp_active: u32,
    last_hour: Option<u32>,
    logs: VecDeque<LogEntry>,
    updated_at: String,
}

#[derive(Clone, Copy, Debug)]
struct Market {
    now: f64,
    sum: f64,
    samples: u64,
}

impl Market {
    fn new(base: f64) -> Self {
        Self {
            now: base,
            sum: base,
            samples: 1,
        }
    }

    fn step(&mut self, rng: &mut impl Rng, scale: f64) {
        self.now = (self.now + rng.gen_range(-scale..scale)).max(0.0);
        self.sum += self.now;
        self.samples += 1;
    }

    fn avg(&self) -> f64 {
        self.sum / self.samples as f64
    }
}

impl SiteSimulator {
    pub fn new(site: SiteFile) -> Self {
        let ess_cfg = site.ess.sanitized();
        let vpp_cfg = site.vpp.sanitized();
        let soc_kwh = ess_cfg.capacity_kwh * (ess_cfg.soc_min + ess_cfg.soc_max) / 200.0;
        let smp = Market::new(site.market.smp_base);
        let rec = Market::new(site.market.rec_base);
        let vpp_active = site.vpp_nodes;
        Self {
            site,
            ess_cfg,
            vpp_cfg,
            soc_kwh,
            power_kw: 0.0,
            soc_state: SocState::InRange,
            cycles: 0.0,
            pv_kw: 0.0,
            shed_kw: 0.0,
            today: DayTotals::default(),
            yesterday: DayTotals::default(),
            month_kwh: 0.0,
            year_kwh: 0.0,
            generation_secs: 0.0,
            curtail_hourly_mwh: [0.0; HOURS_PER_DAY],
            charge_series: [0.0; HOURS_PER_DAY],
            discharge_series: [0.0; HOURS_PER_DAY],
            smp,
            rec,
            vpp_active,
            last_hour: None,
            logs: VecDeque::with_capacity(LOG_CAPACITY),
            updated_at: String::new(),
        }
    }

    pub fn ess_config(&self) -> &EssConfig {
        &self.ess_cfg
    }

    pub fn vpp_config(&self) -> &VppConfig {
        &self.vpp_cfg
    }

    /// Swap in a new ESS config. SOC is rescaled so the percentage survives a capacity change.
    pub fn apply_ess(&mut self, cfg: EssConfig, now: DateTime<Local>) {
        let soc_pct = self.soc_pct();
        self.ess_cfg = cfg.sanitized();
        self.soc_kwh = self.ess_cfg.capacity_kwh * soc_pct / 100.0;
        let msg = format!(
            "설정 적용: {} {:.0}kWh/{:.0}kW SOC {:.0}~{:.0}%",
            self.ess_cfg.name,
            self.ess_cfg.capacity_kwh,
            self.ess_cfg.rated_kw,
            self.ess_cfg.soc_min,
            self.ess_cfg.soc_max
        );
        self.push_log(now, "ESS", Severity::Info, msg);
    }

    pub fn apply_vpp(&mut self, cfg: VppConfig, now: DateTime<Local>) {
        self.vpp_cfg = cfg.sanitized();
        let msg = format!(
            "설정 적용: {} 자원 {}개",
            self.vpp_cfg.site_name,
            self.vpp_cfg.resources.len()
        );
        self.push_log(now, "VPP", Severity::Info, msg);
    }

    /// Advance the model by `dt_secs` ending at `now`.
    pub fn tick(&mut self, dt_secs: f64, now: DateTime<Local>) {
        let mut rng = rand::thread_rng();
        let hour = now.hour();
        let hour_f = f64::from(hour) + f64::from(now.minute()) / 60.0;

        if let Some(last) = self.last_hour {
            if hour < last {
                self.roll_day(now);
            }
        }
        self.last_hour = Some(hour);

        // PV: half-sine daylight curve, clipped at the export limit.
        let capacity = self.site.site.pv_capacity_kwp;
        let daylight = ((hour_f - 6.0) / 12.0 * std::f64::consts::PI).sin().max(0.0);
        let cloud = rng.gen_range(0.85..1.0);
        let potential_kw = capacity * daylight * cloud;
        let export_limit = self.site.export_limit_kw;

        // ESS target from the time of day, then ramp toward it.
        let target_kw = self.ess_target_kw(hour, potential_kw, export_limit);
        let max_delta = ESS_RAMP_KW_PER_MIN / 60.0 * dt_secs;
        self.power_kw += (target_kw - self.power_kw).clamp(-max_delta, max_delta);
        let (chg_limit, dis_limit) = self.ess_cfg.power_limits_kw();
        self.power_kw = self.power_kw.clamp(-chg_limit, dis_limit);

        // Charging soaks up surplus before it is curtailed.
        let absorbed = (-self.power_kw).max(0.0);
        let delivered = potential_kw - absorbed;
        let curtailed_kw = (delivered - export_limit).max(0.0);
        self.pv_kw = potential_kw - curtailed_kw;

        // SOC: positive power discharges, negative charges.
        let energy_kwh = self.power_kw * dt_secs / 3600.0;
        let adjusted = if energy_kwh >= 0.0 {
            energy_kwh / (self.ess_cfg.eff_dis / 100.0)
        } else {
            energy_kwh * (self.ess_cfg.eff_chg / 100.0)
        };
        self.soc_kwh = (self.soc_kwh - adjusted).clamp(0.0, self.ess_cfg.capacity_kwh);
        self.cycles += energy_kwh.abs() / (2.0 * self.ess_cfg.capacity_kwh);
        self.track_soc(now);

        // VPP shedding inside peak windows.
        let in_peak = self.in_peak_window(hour);
        self.shed_kw = if self.vpp_cfg.auto && in_peak {
            self.vpp_cfg.available_shed_kw(hour)
        } else {
            0.0
        };
        if rng.gen_bool(0.05) {
            let total = self.site.vpp_nodes;
            self.vpp_active = rng.gen_range(total.saturating_sub(2)..=total);
        }

        // Daily totals.
        let hours = dt_secs / 3600.0;
        let generated = self.pv_kw * hours;
        self.today.generation_kwh += generated;
        self.month_kwh += generated;
        self.year_kwh += generated;
        if self.pv_kw > 1.0 {
            self.generation_secs += dt_secs;
        }
        if self.power_kw < 0.0 {
            self.today.charge_kwh += -self.power_kw * hours;
        } else {
            self.today.discharge_kwh += self.power_kw * hours;
        }
        self.today.shed_kwh += self.shed_kw * hours;
        self.today.curtailed_kwh += curtailed_kw * hours;

        let slot = hour as usize % HOURS_PER_DAY;
        self.curtail_hourly_mwh[slot] += curtailed_kw * hours / 1000.0;
        self.charge_series[slot] = self.charge_series[slot].max((-self.power_kw).max(0.0));
        self.discharge_series[slot] = self.discharge_series[slot].max(self.power_kw.max(0.0));

        self.smp.step(&mut rng, 1.5);
        self.rec.step(&mut rng, 0.4);
        self.updated_at = now.format("%Y-%m-%d %H:%M").to_string();
    }

    fn ess_target_kw(&self, hour: u32, potential_kw: f64, export_limit: f64) -> f64 {
        if !self.ess_cfg.auto || hour_forbidden(&self.ess_cfg.forbid_hours, hour) {
            return 0.0;
        }
        let soc = self.soc_pct();
        let surplus = potential_kw - export_limit * 0.8;
        if surplus > 0.0 && soc < self.ess_cfg.soc_max {
            -surplus
        } else if (EVENING_DISCHARGE.0..EVENING_DISCHARGE.1).contains(&hour)
            && soc > self.ess_cfg.soc_min
        {
            self.ess_cfg.rated_kw
        } else {
            0.0
        }
    }

    fn in_peak_window(&self, hour: u32) -> bool {
        self.site.curtailment.peak_windows.iter().any(|w| {
            let start = w.start.split(':').next().and_then(|h| h.parse::<u32>().ok());
            let end = w.end.split(':').next().and_then(|h| h.parse::<u32>().ok());
            matches!((start, end), (Some(s), Some(e)) if hour >= s && hour < e)
        })
    }

    // Stop at the SOC bounds and log each crossing once.
    fn track_soc(&mut self, now: DateTime<Local>) {
        let soc = self.soc_pct();
        let state = if soc <= self.ess_cfg.soc_min {
            SocState::BelowMin
        } else if soc >= self.ess_cfg.soc_max {
            SocState::AboveMax
        } else {
            SocState::InRange
        };
        if state == SocState::BelowMin && self.power_kw > 0.0 {
            self.power_kw = 0.0;
        }
        if state == SocState::AboveMax && self.power_kw < 0.0 {
            self.power_kw = 0.0;
        }
        if state == self.soc_state {
            return;
        }
        self.soc_state = state;
        match state {
            SocState::BelowMin => {
                let msg = format!("SOC 하한 도달 ({soc:.1}%)");
                self.push_log(now, "BMS[BMS]", Severity::Warn, msg);
            }
            SocState::AboveMax => {
                let msg = format!("SOC 상한 도달 ({soc:.1}%)");
                self.push_log(now, "BMS[BMS]", Severity::Warn, msg);
            }
            SocState::InRange => {
                self.push_log(now, "BMS[BMS]", Severity::Info, "SOC 정상 범위".to_string());
            }
        }
    }

    fn roll_day(&mut self, now: DateTime<Local>) {
        self.yesterday = self.today;
        self.today = DayTotals::default();
        self.generation_secs = 0.0;
        self.curtail_hourly_mwh = [0.0; HOURS_PER_DAY];
        self.charge_series = [0.0; HOURS_PER_DAY];
        self.discharge_series = [0.0; HOURS_PER_DAY];
        if now.day() == 1 {
            self.month_kwh = 0.0;
            if now.month() == 1 {
                self.year_kwh = 0.0;
            }
        }
        tracing::info!(
            "day rollover: yesterday generation_kwh={:.1} curtailed_kwh={:.1}",
            self.yesterday.generation_kwh,
            self.yesterday.curtailed_kwh
        );
    }

    fn push_log(&mut self, now: DateTime<Local>, scope: &str, level: Severity, msg: String) {
        if self.logs.len() == LOG_CAPACITY {
            self.logs.pop_back();
        }
        self.logs.push_front(LogEntry {
            time: now.format("%Y-%m-%d %H:%M").to_string(),
            scope: scope.to_string(),
            msg,
            level,
        });
    }

    fn soc_pct(&self) -> f64 {
        if self.ess_cfg.capacity_kwh > 0.0 {
            (self.soc_kwh / self.ess_cfg.capacity_kwh * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    fn ess_state_label(&self) -> &'static str {
        if !self.ess_cfg.auto {
            "stopped"
        } else if self.power_kw > 0.1 {
            "discharging"
        } else if self.power_kw < -0.1 {
            "charging"
        } else {
            "standby"
        }
    }

    /// Current status in the wire shape the dashboard polls.
    pub fn status(&self) -> StatusSnapshot {
        let capacity = self.site.site.pv_capacity_kwp;
        let potential_ratio = if capacity > 0.0 { self.pv_kw / capacity } else { 0.0 };
        let logs: Vec<LogEntry> = self.logs.iter().cloned().collect();
        let alarms = AlarmCounts {
            error: logs.iter().filter(|l| l.level == Severity::Error).count() as u32,
            warn: logs.iter().filter(|l| l.level == Severity::Warn).count() as u32,
            info: logs.iter().filter(|l| l.level == Severity::Info).count() as u32,
        };
        let total_nodes = self.site.vpp_nodes;
        StatusSnapshot {
            energy: EnergyTotals {
                generation_today_kwh: self.today.generation_kwh,
                generation_yday_kwh: self.yesterday.generation_kwh,
                ess_charge_today_kwh: self.today.charge_kwh,
                ess_charge_yday_kwh: self.yesterday.charge_kwh,
                ess_discharge_today_kwh: self.today.discharge_kwh,
                ess_discharge_yday_kwh: self.yesterday.discharge_kwh,
                vpp_shed_today_kwh: self.today.shed_kwh,
                vpp_shed_yday_kwh: self.yesterday.shed_kwh,
            },
            curtailment: Curtailment {
                pred_today: self.site.curtailment.pred_today_mwh,
                pred_daily_max: self.site.curtailment.pred_daily_max_mwh,
                actual_cum_today: self.today.curtailed_kwh / 1000.0,
                actual_yday_total: self.yesterday.curtailed_kwh / 1000.0,
                peak_windows: self.site.curtailment.peak_windows.clone(),
                peak_risk_pct: (potential_ratio * 100.0).clamp(0.0, 100.0),
                hourly: self.curtail_hourly_mwh.to_vec(),
            },
            ess: EssStatus {
                power_kw: self.power_kw,
                soc: self.soc_pct(),
                soh: (100.0 - self.cycles * 0.02).clamp(0.0, 100.0),
                temperature_c: 24.0 + self.power_kw.abs() / self.ess_cfg.rated_kw * 8.0,
                state: self.ess_state_label().to_string(),
                today_throughput_kwh: self.today.charge_kwh + self.today.discharge_kwh,
                cycles: self.cycles,
                charge_kw_series: self.charge_series.to_vec(),
                discharge_kw_series: self.discharge_series.to_vec(),
            },
            vpp: VppStatus {
                active_nodes: self.vpp_active,
                total_nodes,
                availability_pct: if total_nodes > 0 {
                    f64::from(self.vpp_active) / f64::from(total_nodes) * 100.0
                } else {
                    0.0
                },
            },
            economics: Economics {
                smp_now: self.smp.now,
                smp_avg: self.smp.avg(),
                rec_now: self.rec.now,
                rec_avg: self.rec.avg(),
                updated_at: self.updated_at.clone(),
            },
            site: SiteInfo {
                name: self.site.site.name.clone(),
                location: self.site.site.location.clone(),
                pv_capacity_kwp: capacity,
                ess_capacity_kwh: self.ess_cfg.capacity_kwh,
                operator: self.site.site.operator.clone(),
            },
            pv: PvStatus {
                output_kw: self.pv_kw,
                today_kwh: self.today.generation_kwh,
                generation_hours: self.generation_secs / 3600.0,
                month_mwh: self.month_kwh / 1000.0,
                year_mwh: self.year_kwh / 1000.0,
                inverter_efficiency_pct: if self.pv_kw > 1.0 { 96.7 } else { 0.0 },
                generation_efficiency_pct: potential_ratio * 100.0,
                irradiance_tilt_wm2: potential_ratio * 1000.0,
                irradiance_horizontal_wm2: potential_ratio * 980.0,
                module_temp_c: 20.0 + potential_ratio * 28.0,
                ambient_temp_c: 18.0 + potential_ratio * 14.0,
            },
            alarms,
            logs,
            alarm_banner: if alarms_clear(&self.logs) {
                "No Alarm".to_string()
            } else {
                "Check Alarm".to_string()
            },
        }
    }
}

fn alarms_clear(logs: &VecDeque<LogEntry>) -> bool {
    logs.iter().all(|l| l.level == Severity::Info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 6, 10, hour, minute, 0)
            .earliest()
            .expect("valid local time")
    }

    #[test]
    fn night_has_no_pv() {
        let mut sim = SiteSimulator::new(SiteFile::demo());
        sim.tick(4.0, at(2, 0));
        let s = sim.status();
        assert_eq!(s.pv.output_kw, 0.0);
        assert_eq!(s.curtailment.hourly.len(), 24);
    }

    #[test]
    fn soc_stays_within_capacity() {
        let mut sim = SiteSimulator::new(SiteFile::demo());
        for i in 0..2000 {
            sim.tick(60.0, at(10 + (i / 600) as u32, (i % 60) as u32));
        }
        let s = sim.status();
        assert!((0.0..=100.0).contains(&s.ess.soc));
        assert!(s.energy.generation_today_kwh > 0.0);
    }

    #[test]
    fn forbidden_hours_idle_the_ess() {
        let mut site = SiteFile::demo();
        site.ess.forbid_hours = "0-24".to_string();
        let mut sim = SiteSimulator::new(site);
        for m in 0..30 {
            sim.tick(60.0, at(19, m));
        }
        assert_eq!(sim.status().ess.power_kw, 0.0);
    }

    #[test]
    fn evening_discharges_when_allowed() {
        let mut sim = SiteSimulator::new(SiteFile::demo());
        for m in 0..10 {
            sim.tick(60.0, at(19, m));
        }
        let s = sim.status();
        assert!(s.ess.power_kw > 0.0);
        assert_eq!(s.ess.state, "discharging");
    }

    #[test]
    fn apply_ess_keeps_soc_percentage() {
        let mut sim = SiteSimulator::new(SiteFile::demo());
        let before = sim.status().ess.soc;
        let cfg = EssConfig {
            capacity_kwh: 1000.0,
            ..EssConfig::default()
        };
        sim.apply_ess(cfg, at(9, 0));
        let after = sim.status();
        assert!((after.ess.soc - before).abs() < 1e-9);
        assert_eq!(after.site.ess_capacity_kwh, 1000.0);
        assert_eq!(after.logs[0].scope, "ESS");
    }

    #[test]
    fn day_rollover_moves_totals() {
        let mut sim = SiteSimulator::new(SiteFile::demo());
        sim.tick(3600.0, at(12, 0));
        let today = sim.status().energy.generation_today_kwh;
        assert!(today > 0.0);
        sim.tick(4.0, at(0, 1));
        let s = sim.status();
        assert_eq!(s.energy.generation_yday_kwh, today);
        assert_eq!(s.energy.generation_today_kwh, 0.0);
    }

    #[test]
    fn status_carries_site_and_windows() {
        let mut sim = SiteSimulator::new(SiteFile::demo());
        sim.tick(4.0, at(13, 30));
        let wire = serde_json::to_value(sim.status()).expect("serialize");
        let snap = StatusSnapshot::normalize(&wire);
        assert_eq!(snap.site.name, "솔라파크 1호");
        assert_eq!(snap.curtailment.peak_windows[0].start, "13:00");
        assert_eq!(snap.vpp.total_nodes, 20);
        assert_eq!(snap.curtailment.pred_today, 3.2);
    }
}
