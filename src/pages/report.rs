use site_core::report::{Report, ReportSection, SectionBody};
use site_core::{RenderMode, SectionId, SectionToggles};

use super::{escape, widgets};

/// Everything the report page needs besides the assembled report.
pub struct ReportView<'a> {
    pub report: &'a Report,
    pub toggles: &'a SectionToggles,
    pub mode: RenderMode,
    /// The report was built from placeholder data.
    pub placeholder: bool,
    pub exporting: bool,
}

pub fn render(view: &ReportView<'_>) -> String {
    let palette = view.mode.theme.palette();
    let sections: String = view.report.sections.iter().map(section).collect();
    let still = if view.mode.animate { "" } else { " still" };
    let sample = if view.placeholder {
        "<p class=\"notice stale\">실시간 데이터 수신 전: 샘플 데이터로 작성되었습니다.</p>"
    } else {
        ""
    };

    format!(
        r#"{controls}
<article class="report-sheet{still}" data-theme="{theme}" data-animate="{animate}"
  style="background:{bg};color:{text};border:1px solid {border}">
  <header>
    <h1>{title}</h1>
    <div style="color:{sub}">생성 시각 {generated}</div>
  </header>
  {sample}
  {sections}
</article>"#,
        controls = controls(view),
        still = still,
        theme = view.mode.theme.as_str(),
        animate = view.mode.animate,
        bg = palette.background,
        text = palette.text,
        border = palette.card_border,
        sub = palette.sub,
        title = escape(view.report.title),
        generated = escape(&view.report.generated_at),
        sample = sample,
        sections = sections,
    )
}

fn controls(view: &ReportView<'_>) -> String {
    let boxes: String = SectionId::ORDER
        .iter()
        .map(|id| {
            let checked = if view.toggles.is_enabled(*id) { " checked" } else { "" };
            // The hidden `off` makes an unchecked box explicit; a checked box's `on` comes later and wins.
            format!(
                r#"<label><input type="hidden" name="{key}" value="off"><input type="checkbox" name="{key}" value="on"{checked}> {label}</label>"#,
                key = id.key(),
                label = id.toggle_label(),
            )
        })
        .collect();

    let hidden: String = SectionId::ORDER
        .iter()
        .map(|id| {
            let value = if view.toggles.is_enabled(*id) { "on" } else { "off" };
            format!(r#"<input type="hidden" name="{}" value="{value}">"#, id.key())
        })
        .collect();

    let export_button = if view.exporting {
        r#"<button type="submit" disabled>내보내는 중…</button>"#
    } else {
        r#"<button type="submit">PDF 내보내기</button>"#
    };

    format!(
        r#"<div class="report-controls card">
  <form method="get" action="/report" class="actions">{boxes}<button type="submit">적용</button></form>
  <form method="post" action="/report/export" class="actions">{hidden}{export_button}</form>
</div>"#
    )
}

fn section(section: &ReportSection) -> String {
    let body = match &section.body {
        SectionBody::Kpi { cards } => {
            let inner: String = cards
                .iter()
                .map(|c| {
                    format!(
                        r#"<div class="tile"><div class="label">{}</div><div class="value">{} <small>{}</small></div></div>"#,
                        c.label,
                        escape(&c.value),
                        c.unit
                    )
                })
                .collect();
            format!("<div class=\"tiles\">{inner}</div>")
        }
        SectionBody::Graph {
            curtailment,
            charge,
            discharge,
        } => format!(
            "<h3>시간대별 출력제어량</h3>{}<h3>ESS 충전 / 방전</h3>{}",
            widgets::line_chart(&[("#ff9ab3", curtailment.as_slice())], 0.0, "MWh"),
            widgets::line_chart(
                &[("#63d8ff", charge.as_slice()), ("#f1a256", discharge.as_slice())],
                0.0,
                "kW"
            ),
        ),
        SectionBody::Economics { rows } => {
            let inner: String = rows
                .iter()
                .map(|r| {
                    format!(
                        "<tr><td>{}</td><td>{:.1}</td><td>{:.1}</td><td>{}</td></tr>",
                        r.label,
                        r.now,
                        r.avg,
                        escape(&r.change)
                    )
                })
                .collect();
            format!(
                "<table><thead><tr><th>구분</th><th>현재</th><th>평균</th><th>변동률</th></tr></thead><tbody>{inner}</tbody></table>"
            )
        }
        SectionBody::Summary { text } => format!("<p>{}</p>", escape(text)),
        SectionBody::Log { entries } => widgets::log_table(entries),
    };
    format!(
        r#"<section data-section="{key}"><h2>{no}. {title}</h2>{body}</section>"#,
        key = section.id.key(),
        no = section.no,
        title = section.title,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use site_core::report::assemble;
    use site_core::{PlaceholderData, WavePlaceholder};

    fn view_html(toggles: SectionToggles, mode: RenderMode) -> String {
        let snap = WavePlaceholder::new().report_snapshot();
        let at = FixedOffset::east_opt(9 * 3600)
            .expect("offset")
            .with_ymd_and_hms(2025, 10, 21, 9, 30, 0)
            .single()
            .expect("time");
        let report = assemble(&snap, &toggles, &at);
        render(&ReportView {
            report: &report,
            toggles: &toggles,
            mode,
            placeholder: true,
            exporting: false,
        })
    }

    #[test]
    fn numbering_follows_enabled_sections() {
        let mut toggles = SectionToggles::default();
        toggles.set(SectionId::Graph, false);
        let html = view_html(toggles, RenderMode::default());
        assert!(html.contains("<h2>1. 주요 지표 요약 (KPI)</h2>"));
        assert!(html.contains("<h2>2. SMP · REC 시세 현황</h2>"));
        assert!(html.contains("<h2>4. 알림 로그</h2>"));
        assert!(!html.contains(r#"data-section="graph""#));
        assert!(html.contains("2025-10-21 09:30:00"));
    }

    #[test]
    fn print_mode_uses_light_palette_and_stops_animation() {
        let html = view_html(SectionToggles::default(), RenderMode::print());
        assert!(html.contains(r#"data-theme="light""#));
        assert!(html.contains(r#"data-animate="false""#));
        assert!(html.contains("report-sheet still"));
        assert!(html.contains("background:#ffffff"));
    }

    #[test]
    fn export_form_carries_current_toggles() {
        let mut toggles = SectionToggles::default();
        toggles.set(SectionId::Log, false);
        let html = view_html(toggles, RenderMode::default());
        assert!(html.contains(r#"<input type="hidden" name="log" value="off"><button"#));
        assert!(html.contains("샘플 데이터로 작성되었습니다"));
    }
}
