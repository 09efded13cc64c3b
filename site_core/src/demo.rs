//! Placeholder data for screens that have nothing real to show yet.
//!
//! Only consulted when no snapshot has ever been received. Nothing in here feeds
//! derivations of a real snapshot.

use rand::Rng;

use crate::metrics::{round_tenth, HOURS_PER_DAY};
use crate::snapshot::{LogEntry, PeakWindow, Severity, StatusSnapshot};

pub trait PlaceholderData: Send + Sync {
    /// Stand-in snapshot for the report before the first poll lands.
    fn report_snapshot(&self) -> StatusSnapshot;

    /// Decorative trace for the realtime panel, `points` samples long.
    fn realtime_trace(&self, points: usize) -> Vec<f64>;
}

/// Smooth waves with a little jitter.
#[derive(Clone, Debug, Default)]
pub struct WavePlaceholder {
    /// Peak-to-peak jitter added to the curtailment wave.
    pub jitter: f64,
}

impl WavePlaceholder {
    pub fn new() -> Self {
        Self { jitter: 1.0 }
    }

    fn curtailment_wave(&self) -> Vec<f64> {
        let mut rng = rand::thread_rng();
        (0..HOURS_PER_DAY)
            .map(|h| {
                let h = h as f64;
                let noise = if self.jitter > 0.0 {
                    rng.gen_range(-0.5..0.5) * self.jitter
                } else {
                    0.0
                };
                round_tenth((h / 3.0).sin() * 2.0 + 5.0 + noise)
            })
            .collect()
    }
}

fn charge_wave() -> Vec<f64> {
    (0..HOURS_PER_DAY)
        .map(|h| round_tenth(((h as f64) / 2.6).cos() * 8.0 + 10.0))
        .collect()
}

fn discharge_wave() -> Vec<f64> {
    (0..HOURS_PER_DAY)
        .map(|h| round_tenth(((h as f64) / 2.2).sin() * 7.0 + 6.0))
        .collect()
}

fn sample_logs() -> Vec<LogEntry> {
    let entry = |time: &str, scope: &str, msg: &str| LogEntry {
        time: time.to_string(),
        scope: scope.to_string(),
        msg: msg.to_string(),
        level: Severity::Info,
    };
    vec![
        entry("2025-10-21 10:01", "BMS", "NPS Normal"),
        entry("2025-10-21 09:57", "PCS", "INV RUN"),
        entry("2025-10-21 09:40", "VPP", "연계 정상"),
    ]
}

impl PlaceholderData for WavePlaceholder {
    fn report_snapshot(&self) -> StatusSnapshot {
        let mut snap = StatusSnapshot::default();
        snap.curtailment.pred_today = 3.2;
        snap.curtailment.actual_cum_today = 4.8;
        snap.curtailment.peak_windows = vec![PeakWindow {
            start: "13:00".to_string(),
            end: "15:00".to_string(),
        }];
        snap.curtailment.hourly = self.curtailment_wave();
        snap.ess.soc = 78.0;
        snap.ess.charge_kw_series = charge_wave();
        snap.ess.discharge_kw_series = discharge_wave();
        snap.vpp.active_nodes = 19;
        snap.vpp.total_nodes = 20;
        snap.economics.smp_now = 143.7;
        snap.economics.smp_avg = 139.5;
        snap.economics.rec_now = 58.2;
        snap.economics.rec_avg = 59.0;
        snap.logs = sample_logs();
        snap
    }

    fn realtime_trace(&self, points: usize) -> Vec<f64> {
        let mut rng = rand::thread_rng();
        let mut level: f64 = 50.0;
        (0..points)
            .map(|_| {
                level = (level + rng.gen_range(-8.0..8.0)).clamp(5.0, 95.0);
                round_tenth(level)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics;

    #[test]
    fn report_snapshot_carries_headline_figures() {
        let snap = WavePlaceholder::new().report_snapshot();
        let kpi = metrics::kpi(&snap);
        assert_eq!(kpi.pred_mwh, 3.2);
        assert_eq!(kpi.cum_mwh, 4.8);
        assert_eq!(kpi.soc_pct, 78);
        assert_eq!(kpi.vpp_rate, 95);
        assert_eq!(snap.curtailment.hourly.len(), 24);
        assert_eq!(snap.logs.len(), 3);
    }

    #[test]
    fn waves_are_non_negative() {
        let demo = WavePlaceholder::new();
        let snap = demo.report_snapshot();
        assert!(snap.ess.charge_kw_series.iter().all(|v| *v >= 0.0));
        assert!(snap.ess.discharge_kw_series.iter().all(|v| *v >= 0.0));
        assert_eq!(snap.ess.charge_kw_series[0], 18.0);
    }

    #[test]
    fn realtime_trace_stays_in_band() {
        let trace = WavePlaceholder::new().realtime_trace(60);
        assert_eq!(trace.len(), 60);
        assert!(trace.iter().all(|v| (5.0..=95.0).contains(v)));
    }

    #[test]
    fn zero_jitter_is_repeatable() {
        let demo = WavePlaceholder { jitter: 0.0 };
        assert_eq!(demo.report_snapshot(), demo.report_snapshot());
    }
}
