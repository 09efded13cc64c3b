//! Server-rendered pages. Every page is the shared shell (top bar, tab strip, stale
//! banner) around a tab-specific body. Styles are one static sheet; nothing is
//! injected at run time.

use chrono::{DateTime, Local};

use crate::poller::CachedStatus;

pub mod forms;
pub mod home;
pub mod pv;
pub mod report;
pub mod status;
pub mod widgets;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tab {
    Home,
    Pv,
    Pcs,
    Bms,
    Ess,
    Vpp,
    Report,
    Alarm,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 9] = [
        Tab::Home,
        Tab::Pv,
        Tab::Pcs,
        Tab::Bms,
        Tab::Ess,
        Tab::Vpp,
        Tab::Report,
        Tab::Alarm,
        Tab::Settings,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Tab::Home => "/",
            Tab::Pv => "/pv",
            Tab::Pcs => "/pcs",
            Tab::Bms => "/bms",
            Tab::Ess => "/ess",
            Tab::Vpp => "/vpp",
            Tab::Report => "/report",
            Tab::Alarm => "/alarm",
            Tab::Settings => "/settings",
        }
    }

    /// Telemetry tabs that reload themselves on the poll interval. Form and report
    /// tabs do not, so a reload never throws away edits.
    pub fn live(self) -> bool {
        matches!(self, Tab::Home | Tab::Pv | Tab::Pcs | Tab::Bms | Tab::Alarm)
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Home => "HOME",
            Tab::Pv => "PV",
            Tab::Pcs => "PCS",
            Tab::Bms => "BMS",
            Tab::Ess => "ESS",
            Tab::Vpp => "VPP",
            Tab::Report => "보고서",
            Tab::Alarm => "경보",
            Tab::Settings => "설정",
        }
    }
}

/// Top-bar values.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub now: String,
    pub site_name: String,
    pub pv_kwp: f64,
    pub ess_kwh: f64,
    pub temperature_c: f64,
    pub stale: bool,
    pub last_ok: Option<String>,
    pub last_error: Option<String>,
    pub banner: String,
    /// Seconds until the browser reloads the page, if it should.
    pub refresh_secs: Option<u64>,
}

impl Header {
    pub fn from_cache(cached: &CachedStatus, now: DateTime<Local>) -> Self {
        let snap = cached.snapshot.clone().unwrap_or_default();
        Self {
            now: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            site_name: snap.site.name,
            pv_kwp: snap.site.pv_capacity_kwp,
            ess_kwh: snap.site.ess_capacity_kwh,
            temperature_c: snap.pv.ambient_temp_c,
            stale: cached.stale,
            last_ok: cached
                .last_ok
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            last_error: cached.last_error.clone(),
            banner: snap.alarm_banner,
            refresh_secs: None,
        }
    }
}

/// Escape text for HTML bodies and double-quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// `1234.5` -> `"1,234.5"` with `decimals` places.
pub fn grouped(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value);
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int, frac) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let mut out = String::new();
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    match frac {
        Some(f) => format!("{sign}{out}.{f}"),
        None => format!("{sign}{out}"),
    }
}

pub fn shell(active: Tab, header: &Header, body: &str) -> String {
    let tabs: String = Tab::ALL
        .iter()
        .map(|tab| {
            let class = if *tab == active { " class=\"active\"" } else { "" };
            format!("<a href=\"{}\"{}>{}</a>", tab.path(), class, tab.label())
        })
        .collect();

    let site = if header.site_name.is_empty() {
        String::new()
    } else {
        format!("<span class=\"site\">{}</span>", escape(&header.site_name))
    };

    let mut notices = String::new();
    if header.stale {
        let since = header.last_ok.as_deref().unwrap_or("-");
        let why = header.last_error.as_deref().unwrap_or("");
        notices.push_str(&format!(
            "<div class=\"notice stale\">데이터 갱신 실패: 마지막 정상 수신 {} <small>{}</small></div>",
            escape(since),
            escape(why)
        ));
    }
    if !header.banner.is_empty() {
        notices.push_str(&format!(
            "<div class=\"notice alarm\">{}</div>",
            escape(&header.banner)
        ));
    }

    let refresh = header
        .refresh_secs
        .map(|secs| format!("<meta http-equiv=\"refresh\" content=\"{secs}\">"))
        .unwrap_or_default();

    format!(
        r#"<!doctype html>
<html lang="ko">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  {refresh}
  <title>출력제어 예측 - {title}</title>
  <style>{css}</style>
</head>
<body>
  <header class="topbar">
    <div class="brand">출력제어 예측 {site}</div>
    <div class="meta">
      <span>{now}</span>
      <span>{pv} <small>kWp</small></span>
      <span>{ess} <small>kWh</small></span>
      <span>{temp:.1} <small>℃</small></span>
      <form method="post" action="/refresh"><button type="submit" class="ghost" title="새로고침">새로고침</button></form>
    </div>
  </header>
  <nav class="tabs">{tabs}</nav>
  {notices}
  <main>{body}</main>
</body>
</html>"#,
        refresh = refresh,
        title = active.label(),
        css = STYLE,
        site = site,
        now = escape(&header.now),
        pv = grouped(header.pv_kwp, 1),
        ess = grouped(header.ess_kwh, 1),
        temp = header.temperature_c,
        tabs = tabs,
        notices = notices,
        body = body,
    )
}

/// Simple titled card, used by the pages without their own layout.
pub fn card(title: &str, inner: &str) -> String {
    format!(
        "<section class=\"card\"><h2>{}</h2>{}</section>",
        escape(title),
        inner
    )
}

const STYLE: &str = r#"
:root { color-scheme: dark; --bg: #0c131a; --panel: #162430; --card: #1a2a36; --border: #2a3e4d; --text: #cfe7f6; --muted: #8aa4b5; --accent: #69e3ff; }
* { box-sizing: border-box; }
body { margin: 0; background: var(--bg); color: var(--text); font-family: "Pretendard", "Noto Sans KR", system-ui, sans-serif; }
.topbar { display: flex; justify-content: space-between; align-items: center; padding: 0.5rem 1.5rem; border-bottom: 1px solid var(--border); font-size: 13px; }
.topbar .brand { font-size: 18px; font-weight: 800; }
.topbar .site { color: var(--accent); margin-left: 0.5rem; }
.topbar .meta { display: flex; gap: 1.2rem; align-items: center; }
.topbar form { margin: 0; }
.tabs { display: grid; grid-template-columns: repeat(9, 1fr); background: var(--panel); border-bottom: 1px solid var(--border); margin-top: 0.5rem; }
.tabs a { display: flex; align-items: center; justify-content: center; height: 48px; color: var(--text); text-decoration: none; border-right: 1px solid var(--border); }
.tabs a.active, .tabs a:hover { background: #1c2c39; color: var(--accent); font-weight: 600; }
main { padding: 0.5rem; display: flex; flex-direction: column; gap: 0.5rem; }
.notice { margin: 0.5rem; padding: 0.6rem 1rem; border-radius: 6px; }
.notice.stale { background: #3a2a12; color: #ffcf77; }
.notice.alarm { background: #3a1818; color: #ff8b8b; }
.notice.error { background: #3a1818; color: #ff8b8b; }
.notice.ok { background: #123a2a; color: #8ff0c0; }
.card { background: var(--card); border: 1px solid #22394b; padding: 0.8rem 1rem; }
.card h2 { margin: 0 0 0.6rem; font-size: 14px; color: #d7e9f6; }
.grid { display: grid; grid-template-columns: 3fr 9fr; gap: 0.25rem; }
.row { display: flex; gap: 0.25rem; }
.row > * { flex: 1; }
.donuts { display: grid; grid-template-columns: repeat(5, 1fr); background: var(--panel); }
.donut { display: flex; align-items: center; gap: 1.2rem; padding: 0.8rem 2rem; border-right: 1px solid var(--border); }
.donut .title { font-size: 17px; font-weight: 800; }
.donut .value { font-size: 38px; font-weight: 800; color: #f1f5f9; }
.donut .unit { font-size: 14px; font-weight: 600; color: #63d8ff; }
.tiles { display: grid; grid-template-columns: repeat(5, 1fr); gap: 0.25rem; }
.tile { background: #14222c; border: 1px solid #22394b; padding: 0.6rem; }
.tile .label { font-size: 12px; color: var(--muted); }
.tile .value { font-size: 22px; font-weight: 700; }
.tile.on { border-color: var(--accent); color: var(--accent); }
.stage-host { position: relative; width: 100%; overflow: hidden; }
.stage { position: absolute; left: 0; top: 0; transform-origin: 0 0; }
.stage .node { position: absolute; background: #14222c; border: 1px solid #22394b; padding: 12px 18px; font-size: 28px; }
.stage .pipe { position: absolute; background: linear-gradient(90deg, #63d8ff55, #c5ff4655); border-radius: 20px; }
.stage .chip { display: inline-block; padding: 4px 14px; border-radius: 999px; background: #1c2c39; color: var(--accent); }
table { width: 100%; border-collapse: collapse; font-size: 13px; }
th, td { padding: 0.35rem 0.5rem; text-align: left; border-bottom: 1px solid #22394b; }
th { color: var(--muted); font-weight: 700; }
.lv-info { color: #8fd3ff; } .lv-warn { color: #ffcf77; } .lv-error { color: #ff8b8b; }
form.cfg fieldset { border: 1px solid var(--border); margin: 0 0 0.8rem; padding: 0.8rem; display: grid; grid-template-columns: repeat(4, 1fr); gap: 0.6rem; }
form.cfg legend { font-weight: 600; padding: 0 0.4rem; }
label { display: block; font-size: 12px; color: #b8cfdd; }
input, select { width: 100%; margin-top: 0.25rem; padding: 0.4rem 0.5rem; background: #0f1a22; color: var(--text); border: 1px solid var(--border); border-radius: 4px; }
input[type=checkbox] { width: auto; }
button { padding: 0.5rem 1rem; border-radius: 4px; border: 1px solid var(--border); background: #1f3949; color: var(--text); cursor: pointer; }
button.ghost { background: transparent; padding: 0.2rem 0.6rem; }
button.apply { background: #1e4c41; border-color: #26544b; }
.actions { display: flex; gap: 0.5rem; justify-content: flex-end; align-items: center; }
.report-sheet { max-width: 960px; margin: 0 auto; padding: 24px; }
.report-sheet section { page-break-inside: avoid; margin-bottom: 18px; }
.report-sheet.still * { transition: none !important; animation: none !important; }
@media print { .tabs, .topbar, .report-controls, .notice { display: none; } }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<b>"A&B"</b>'"#),
            "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;&#39;"
        );
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(grouped(2660.0, 1), "2,660.0");
        assert_eq!(grouped(800.0, 1), "800.0");
        assert_eq!(grouped(1234567.891, 2), "1,234,567.89");
        assert_eq!(grouped(-4800.0, 0), "-4,800");
    }

    #[test]
    fn shell_marks_active_tab_and_stale_state() {
        let cached = CachedStatus {
            stale: true,
            last_error: Some("connection refused".to_string()),
            ..CachedStatus::default()
        };
        let header = Header::from_cache(&cached, Local::now());
        let html = shell(Tab::Pv, &header, "<p>body</p>");
        assert!(html.contains(r#"<a href="/pv" class="active">PV</a>"#));
        assert!(html.contains(r#"<a href="/report">보고서</a>"#));
        assert!(html.contains("데이터 갱신 실패"));
        assert!(html.contains("connection refused"));
        assert!(html.contains("<p>body</p>"));
        assert!(!html.contains("http-equiv"));
    }

    #[test]
    fn only_live_tabs_reload() {
        let live: Vec<Tab> = Tab::ALL.into_iter().filter(|t| t.live()).collect();
        assert_eq!(live, [Tab::Home, Tab::Pv, Tab::Pcs, Tab::Bms, Tab::Alarm]);

        let mut header = Header::from_cache(&CachedStatus::default(), Local::now());
        header.refresh_secs = Some(60);
        let html = shell(Tab::Home, &header, "");
        assert!(html.contains(r#"<meta http-equiv="refresh" content="60">"#));
    }
}
