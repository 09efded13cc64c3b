//! Operations report: ordered, toggleable sections built from the same derivations
//! as the live pages, plus the print theme and export file naming.

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::metrics::{self, Kpi};
use crate::snapshot::{LogEntry, StatusSnapshot};

pub const REPORT_TITLE: &str = "일일 운영 리포트";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionId {
    Kpi,
    Graph,
    Economics,
    Summary,
    Log,
}

impl SectionId {
    /// Fixed presentation order.
    pub const ORDER: [SectionId; 5] = [
        SectionId::Kpi,
        SectionId::Graph,
        SectionId::Economics,
        SectionId::Summary,
        SectionId::Log,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SectionId::Kpi => "kpi",
            SectionId::Graph => "graph",
            SectionId::Economics => "economics",
            SectionId::Summary => "summary",
            SectionId::Log => "log",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SectionId::Kpi => "주요 지표 요약 (KPI)",
            SectionId::Graph => "발전량 및 충·방전 그래프",
            SectionId::Economics => "SMP · REC 시세 현황",
            SectionId::Summary => "운영 요약",
            SectionId::Log => "알림 로그",
        }
    }

    /// Short label for the toggle checkbox.
    pub fn toggle_label(self) -> &'static str {
        match self {
            SectionId::Kpi => "KPI",
            SectionId::Graph => "그래프",
            SectionId::Economics => "가격표",
            SectionId::Summary => "요약",
            SectionId::Log => "로그",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|id| id.key() == key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SectionToggles {
    enabled: [bool; 5],
}

impl Default for SectionToggles {
    fn default() -> Self {
        Self { enabled: [true; 5] }
    }
}

impl SectionToggles {
    pub fn none() -> Self {
        Self { enabled: [false; 5] }
    }

    /// Toggles from form/query pairs. Input without any section key enables everything.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut toggles = Self::none();
        let mut seen = false;
        for (key, value) in pairs {
            let Some(id) = SectionId::from_key(key) else {
                continue;
            };
            seen = true;
            let on = matches!(value.trim(), "on" | "true" | "1" | "yes");
            toggles.set(id, on);
        }
        if seen { toggles } else { Self::default() }
    }

    pub fn is_enabled(&self, id: SectionId) -> bool {
        self.enabled[Self::slot(id)]
    }

    pub fn set(&mut self, id: SectionId, on: bool) {
        self.enabled[Self::slot(id)] = on;
    }

    pub fn toggle(&mut self, id: SectionId) {
        let slot = Self::slot(id);
        self.enabled[slot] = !self.enabled[slot];
    }

    /// Query string that reproduces these toggles. Disabled sections are sent as `off`
    /// so an all-off selection does not collapse back to the default.
    pub fn to_query(&self) -> String {
        SectionId::ORDER
            .iter()
            .map(|id| format!("{}={}", id.key(), if self.is_enabled(*id) { "on" } else { "off" }))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn slot(id: SectionId) -> usize {
        SectionId::ORDER
            .iter()
            .position(|x| *x == id)
            .unwrap_or_default()
    }
}

/// Enabled sections in order, numbered from 1 with no gaps.
pub fn numbered_sections(toggles: &SectionToggles) -> Vec<(usize, SectionId)> {
    SectionId::ORDER
        .into_iter()
        .filter(|id| toggles.is_enabled(*id))
        .enumerate()
        .map(|(i, id)| (i + 1, id))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KpiCard {
    pub label: &'static str,
    pub value: String,
    pub unit: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceRow {
    pub label: &'static str,
    pub now: f64,
    pub avg: f64,
    pub change: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SectionBody {
    Kpi { cards: Vec<KpiCard> },
    Graph {
        curtailment: Vec<f64>,
        charge: Vec<f64>,
        discharge: Vec<f64>,
    },
    Economics { rows: Vec<PriceRow> },
    Summary { text: String },
    Log { entries: Vec<LogEntry> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportSection {
    pub no: usize,
    pub id: SectionId,
    pub title: &'static str,
    pub body: SectionBody,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub title: &'static str,
    pub generated_at: String,
    pub sections: Vec<ReportSection>,
}

/// Log rows shown in the report.
pub const REPORT_LOG_LIMIT: usize = 10;

pub fn assemble<Tz>(
    snapshot: &StatusSnapshot,
    toggles: &SectionToggles,
    generated_at: &DateTime<Tz>,
) -> Report
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let kpi = metrics::kpi(snapshot);
    let sections = numbered_sections(toggles)
        .into_iter()
        .map(|(no, id)| ReportSection {
            no,
            id,
            title: id.title(),
            body: section_body(id, snapshot, &kpi),
        })
        .collect();
    Report {
        title: REPORT_TITLE,
        generated_at: generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        sections,
    }
}

fn section_body(id: SectionId, snapshot: &StatusSnapshot, kpi: &Kpi) -> SectionBody {
    match id {
        SectionId::Kpi => SectionBody::Kpi {
            cards: kpi_cards(kpi),
        },
        SectionId::Graph => SectionBody::Graph {
            curtailment: metrics::hourly(&snapshot.curtailment.hourly),
            charge: metrics::hourly(&snapshot.ess.charge_kw_series),
            discharge: metrics::hourly(&snapshot.ess.discharge_kw_series),
        },
        SectionId::Economics => {
            let board = metrics::price_board(snapshot);
            SectionBody::Economics {
                rows: vec![
                    PriceRow {
                        label: "SMP (원/kWh)",
                        now: board.smp_now,
                        avg: board.smp_avg,
                        change: board.smp_change,
                    },
                    PriceRow {
                        label: "REC (원/kWh)",
                        now: board.rec_now,
                        avg: board.rec_avg,
                        change: board.rec_change,
                    },
                ],
            }
        }
        SectionId::Summary => SectionBody::Summary {
            text: summary_text(kpi, snapshot),
        },
        SectionId::Log => SectionBody::Log {
            entries: metrics::recent_logs(snapshot, REPORT_LOG_LIMIT),
        },
    }
}

pub fn kpi_cards(kpi: &Kpi) -> Vec<KpiCard> {
    vec![
        KpiCard {
            label: "예측 출력제어량",
            value: kpi.pred_mwh.to_string(),
            unit: "MWh",
        },
        KpiCard {
            label: "누적 출력제어량",
            value: kpi.cum_mwh.to_string(),
            unit: "MWh",
        },
        KpiCard {
            label: "ESS SOC",
            value: kpi.soc_pct.to_string(),
            unit: "%",
        },
        KpiCard {
            label: "VPP 가동률",
            value: kpi.vpp_rate.to_string(),
            unit: "%",
        },
    ]
}

pub fn summary_text(kpi: &Kpi, snapshot: &StatusSnapshot) -> String {
    format!(
        "금일 예측 출력제어량은 {} MWh, 누적 {} MWh로 집계. ESS는 평균 SOC {}%를 유지. \
         SMP는 {} 원/kWh, REC는 {} 원/kWh 수준. 전체 출력제어는 안정적이며, ESS 운전은 계획대로 수행됨.",
        kpi.pred_mwh,
        kpi.cum_mwh,
        kpi.soc_pct,
        snapshot.economics.smp_now,
        snapshot.economics.rec_now,
    )
}

/// `report_YYYY-MM-DD_HH-MM.pdf` in the caller's time zone.
pub fn report_file_name<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("report_{}.pdf", at.format("%Y-%m-%d_%H-%M"))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Colours for one theme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub text: &'static str,
    pub sub: &'static str,
    pub card_border: &'static str,
    pub grid: &'static str,
    pub header_fill: &'static str,
}

impl Theme {
    pub fn palette(self) -> Palette {
        match self {
            Theme::Dark => Palette {
                background: "#162430",
                text: "#cfe7f6",
                sub: "rgba(207,231,246,0.7)",
                card_border: "#2a3e4d",
                grid: "rgba(255,255,255,0.12)",
                header_fill: "rgba(255,255,255,0.06)",
            },
            Theme::Light => Palette {
                background: "#ffffff",
                text: "#111",
                sub: "#555",
                card_border: "#e4e9ef",
                grid: "#e6eef5",
                header_fill: "#f3f6fa",
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

/// How report pages are drawn right now. Export flips this to print mode for the capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RenderMode {
    pub theme: Theme,
    pub animate: bool,
}

impl Default for RenderMode {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            animate: true,
        }
    }
}

impl RenderMode {
    pub fn print() -> Self {
        Self {
            theme: Theme::Light,
            animate: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use serde_json::json;

    fn ids(toggles: &SectionToggles) -> Vec<(usize, &'static str)> {
        numbered_sections(toggles)
            .into_iter()
            .map(|(no, id)| (no, id.key()))
            .collect()
    }

    #[test]
    fn all_sections_numbered_in_order() {
        assert_eq!(
            ids(&SectionToggles::default()),
            vec![(1, "kpi"), (2, "graph"), (3, "economics"), (4, "summary"), (5, "log")]
        );
    }

    #[test]
    fn disabling_a_section_closes_the_gap() {
        let mut t = SectionToggles::default();
        t.toggle(SectionId::Economics);
        assert_eq!(
            ids(&t),
            vec![(1, "kpi"), (2, "graph"), (3, "summary"), (4, "log")]
        );
        t.toggle(SectionId::Kpi);
        assert_eq!(ids(&t), vec![(1, "graph"), (2, "summary"), (3, "log")]);
        t.toggle(SectionId::Economics);
        assert_eq!(ids(&t), vec![(1, "graph"), (2, "economics"), (3, "summary"), (4, "log")]);
    }

    #[test]
    fn pairs_without_section_keys_enable_everything() {
        assert_eq!(SectionToggles::from_pairs([("theme", "dark")]), SectionToggles::default());
        let t = SectionToggles::from_pairs([("kpi", "on"), ("log", "off")]);
        assert_eq!(ids(&t), vec![(1, "kpi")]);
    }

    #[test]
    fn query_round_trips_all_off() {
        let none = SectionToggles::none();
        let q = none.to_query();
        let pairs: Vec<(&str, &str)> = q
            .split('&')
            .filter_map(|kv| kv.split_once('='))
            .collect();
        assert_eq!(SectionToggles::from_pairs(pairs), none);
    }

    #[test]
    fn report_content_uses_live_derivations() {
        let snap = StatusSnapshot::normalize(&json!({
            "curtailment": {"pred_today": 3.2, "actual_cum_today": 4.8, "hourly": [1.0, 2.26]},
            "ess": {"soc": 78, "charge_kw_series": [5.0]},
            "vpp": {"active_nodes": 19, "total_nodes": 20},
            "economics": {"smp_now": 143.7, "smp_avg": 139.5, "rec_now": 58.2, "rec_avg": 59.0},
        }));
        let at = Utc.with_ymd_and_hms(2025, 10, 21, 9, 5, 0).single().expect("valid time");
        let report = assemble(&snap, &SectionToggles::default(), &at);
        assert_eq!(report.generated_at, "2025-10-21 09:05:00");

        let SectionBody::Kpi { cards } = &report.sections[0].body else {
            panic!("kpi first");
        };
        let values: Vec<&str> = cards.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["3.2", "4.8", "78", "95"]);

        let SectionBody::Graph { curtailment, charge, discharge } = &report.sections[1].body else {
            panic!("graph second");
        };
        assert_eq!(curtailment.len(), 24);
        assert_eq!(curtailment[1], 2.3);
        assert_eq!(charge[0], 5.0);
        assert!(discharge.iter().all(|v| *v == 0.0));

        let SectionBody::Economics { rows } = &report.sections[2].body else {
            panic!("economics third");
        };
        assert_eq!(rows[0].change, "3.0%");
        assert_eq!(rows[1].change, "-1.4%");

        let SectionBody::Summary { text } = &report.sections[3].body else {
            panic!("summary fourth");
        };
        assert!(text.contains("3.2 MWh"));
        assert!(text.contains("SOC 78%"));
        assert!(text.contains("SMP는 143.7 원/kWh"));
    }

    #[test]
    fn file_name_uses_local_fields() {
        let kst = FixedOffset::east_opt(9 * 3600).expect("offset");
        let at = kst.with_ymd_and_hms(2025, 3, 7, 8, 4, 59).single().expect("valid time");
        assert_eq!(report_file_name(&at), "report_2025-03-07_08-04.pdf");
    }

    #[test]
    fn print_mode_is_light_and_still() {
        assert_eq!(RenderMode::print().theme.palette().background, "#ffffff");
        assert!(!RenderMode::print().animate);
        assert!(RenderMode::default().animate);
    }
}
