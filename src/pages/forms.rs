//! ESS and VPP settings forms.
//!
//! Posted fields are parsed over the defaults. A number that does not parse becomes
//! NaN so the shared validation rejects it instead of silently keeping a default.

use std::collections::BTreeMap;

use site_core::{ControlMode, DrResource, EssConfig, EssMode, ResourceType, VppConfig};

use super::escape;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Ok(String),
    Error(String),
}

impl Notice {
    fn html(&self) -> String {
        match self {
            Notice::Ok(msg) => format!("<div class=\"notice ok\" role=\"status\">{}</div>", escape(msg)),
            Notice::Error(msg) => format!("<div class=\"notice error\" role=\"alert\">{}</div>", escape(msg)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormAction {
    Save,
    Apply,
    AddResource,
    RemoveResource(usize),
}

impl FormAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "save" => Some(FormAction::Save),
            "apply" => Some(FormAction::Apply),
            "add" => Some(FormAction::AddResource),
            other => other
                .strip_prefix("remove.")
                .and_then(|idx| idx.parse().ok())
                .map(FormAction::RemoveResource),
        }
    }

    pub fn from_pairs(pairs: &[(String, String)]) -> Option<Self> {
        pairs
            .iter()
            .find(|(k, _)| k == "action")
            .and_then(|(_, v)| Self::parse(v))
    }
}

fn number(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(f64::NAN)
}

fn num_value(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        String::new()
    }
}

pub fn ess_from_form(pairs: &[(String, String)]) -> EssConfig {
    let mut cfg = EssConfig {
        auto: false,
        ..EssConfig::default()
    };
    for (key, value) in pairs {
        match key.as_str() {
            "name" => cfg.name = value.clone(),
            "mode" => cfg.mode = EssMode::parse(value).unwrap_or_default(),
            "mqtt_topic" => cfg.mqtt_topic = value.clone(),
            "auto" => cfg.auto = true,
            "capacity_kwh" => cfg.capacity_kwh = number(value),
            "rated_kw" => cfg.rated_kw = number(value),
            "soc_min" => cfg.soc_min = number(value),
            "soc_max" => cfg.soc_max = number(value),
            "c_rate_chg" => cfg.c_rate_chg = number(value),
            "c_rate_dis" => cfg.c_rate_dis = number(value),
            "eff_chg" => cfg.eff_chg = number(value),
            "eff_dis" => cfg.eff_dis = number(value),
            "temp_min_c" => cfg.temp_min_c = number(value),
            "temp_max_c" => cfg.temp_max_c = number(value),
            "forbid_hours" => cfg.forbid_hours = value.clone(),
            _ => {}
        }
    }
    cfg
}

pub fn vpp_from_form(pairs: &[(String, String)]) -> VppConfig {
    let mut cfg = VppConfig {
        auto: false,
        resources: Vec::new(),
        ..VppConfig::default()
    };
    let mut resources: BTreeMap<usize, DrResource> = BTreeMap::new();
    for (key, value) in pairs {
        if let Some(rest) = key.strip_prefix("res.") {
            let Some((idx, field)) = rest.split_once('.') else {
                continue;
            };
            let Ok(idx) = idx.parse::<usize>() else {
                continue;
            };
            let res = resources.entry(idx).or_insert_with(|| DrResource {
                enabled: false,
                ..DrResource::blank(idx)
            });
            match field {
                "id" => res.id = value.clone(),
                "name" => res.name = value.clone(),
                "type" => res.kind = ResourceType::parse(value).unwrap_or_default(),
                "enabled" => res.enabled = true,
                "shed_kw" => res.shed_kw = number(value),
                "min_on_min" => res.min_on_min = number(value),
                "min_off_min" => res.min_off_min = number(value),
                "ramp_kw_per_min" => res.ramp_kw_per_min = number(value),
                "forbidden_hours" => res.forbidden_hours = value.clone(),
                "penalty_won_per_kwh" => res.penalty_won_per_kwh = number(value),
                "priority" => res.priority = number(value),
                "mode" => res.mode = ControlMode::parse(value).unwrap_or_default(),
                _ => {}
            }
            continue;
        }
        match key.as_str() {
            "site_name" => cfg.site_name = value.clone(),
            "auto" => cfg.auto = true,
            "control_horizon_min" => cfg.control_horizon_min = number(value),
            "ramp_limit_kw_per_min" => cfg.ramp_limit_kw_per_min = number(value),
            _ => {}
        }
    }
    cfg.resources = resources.into_values().collect();
    cfg
}

fn text_field(label: &str, name: &str, value: &str) -> String {
    format!(
        r#"<label>{label}<input type="text" name="{name}" value="{}"></label>"#,
        escape(value)
    )
}

fn num_field(label: &str, name: &str, value: f64) -> String {
    format!(
        r#"<label>{label}<input type="number" step="any" name="{name}" value="{}"></label>"#,
        num_value(value)
    )
}

fn check_field(label: &str, name: &str, on: bool) -> String {
    let checked = if on { " checked" } else { "" };
    format!(r#"<label><input type="checkbox" name="{name}" value="on"{checked}> {label}</label>"#)
}

fn select_field(label: &str, name: &str, options: &[(&str, &str)], current: &str) -> String {
    let opts: String = options
        .iter()
        .map(|(value, text)| {
            let selected = if *value == current { " selected" } else { "" };
            format!(r#"<option value="{value}"{selected}>{text}</option>"#)
        })
        .collect();
    format!(r#"<label>{label}<select name="{name}">{opts}</select></label>"#)
}

fn first_issue(issues: Vec<String>) -> String {
    issues
        .into_iter()
        .next()
        .map(|msg| format!("<span class=\"lv-error\">⚠ {}</span>", escape(&msg)))
        .unwrap_or_default()
}

fn actions(issue: &str) -> String {
    format!(
        r#"<div class="actions">{issue}<a href="" class="ghost">초기화</a><button type="submit" name="action" value="save">저장</button><button type="submit" name="action" value="apply" class="apply">적용(스케줄러/장비)</button></div>"#
    )
}

pub fn render_ess(cfg: &EssConfig, notice: Option<&Notice>) -> String {
    let issues: Vec<String> = cfg.issues().iter().map(ToString::to_string).collect();
    let notice = notice.map(Notice::html).unwrap_or_default();
    let mode = select_field(
        "운영 모드",
        "mode",
        &[("simulate", "시뮬레이션"), ("mqtt", "MQTT")],
        cfg.mode.as_str(),
    );
    format!(
        r#"<section class="card"><h2>ESS 운영 설정</h2>{notice}
<form method="post" action="/ess" class="cfg">
  <fieldset><legend>기본 정보</legend>{name}{mode}{topic}{auto}</fieldset>
  <fieldset><legend>정격 및 제약</legend>{cap}{rated}{crc}{crd}{soc_min}{soc_max}{eff_chg}{eff_dis}</fieldset>
  <fieldset><legend>안전/온도 한계</legend>{tmin}{tmax}{forbid}</fieldset>
  {actions}
</form></section>"#,
        name = text_field("ESS 이름", "name", &cfg.name),
        topic = text_field("MQTT 토픽", "mqtt_topic", &cfg.mqtt_topic),
        auto = check_field("자율 제어", "auto", cfg.auto),
        cap = num_field("정격용량 (kWh)", "capacity_kwh", cfg.capacity_kwh),
        rated = num_field("정격전력 (kW)", "rated_kw", cfg.rated_kw),
        crc = num_field("충전 C-rate", "c_rate_chg", cfg.c_rate_chg),
        crd = num_field("방전 C-rate", "c_rate_dis", cfg.c_rate_dis),
        soc_min = num_field("SOC 최소 (%)", "soc_min", cfg.soc_min),
        soc_max = num_field("SOC 최대 (%)", "soc_max", cfg.soc_max),
        eff_chg = num_field("충전 효율 (%)", "eff_chg", cfg.eff_chg),
        eff_dis = num_field("방전 효율 (%)", "eff_dis", cfg.eff_dis),
        tmin = num_field("온도 최소 (℃)", "temp_min_c", cfg.temp_min_c),
        tmax = num_field("온도 최대 (℃)", "temp_max_c", cfg.temp_max_c),
        forbid = text_field("운전 불가 시간대(쉼표 구분)", "forbid_hours", &cfg.forbid_hours),
        actions = actions(&first_issue(issues)),
    )
}

fn resource_fields(idx: usize, res: &DrResource) -> String {
    let key = |field: &str| format!("res.{idx}.{field}");
    let types: Vec<(&str, &str)> = ResourceType::ALL
        .iter()
        .map(|t| (t.as_str(), t.as_str()))
        .collect();
    format!(
        r#"<fieldset><legend>자원 {no} <button type="submit" name="action" value="remove.{idx}" class="ghost">삭제</button></legend>
<input type="hidden" name="{id_key}" value="{id}">{enabled}{name}{kind}{mode}{shed}{on}{off}{ramp}{forbid}{penalty}{priority}</fieldset>"#,
        no = idx + 1,
        id_key = key("id"),
        id = escape(&res.id),
        enabled = check_field("사용", &key("enabled"), res.enabled),
        name = text_field("자원 이름", &key("name"), &res.name),
        kind = select_field("자원 유형", &key("type"), &types, res.kind.as_str()),
        mode = select_field(
            "제어 모드",
            &key("mode"),
            &[("auto", "자동"), ("manual", "수동")],
            res.mode.as_str()
        ),
        shed = num_field("감축 가능 전력 (kW)", &key("shed_kw"), res.shed_kw),
        on = num_field("최소 가동 시간 (분)", &key("min_on_min"), res.min_on_min),
        off = num_field("최소 정지 시간 (분)", &key("min_off_min"), res.min_off_min),
        ramp = num_field("램프율 (kW/분)", &key("ramp_kw_per_min"), res.ramp_kw_per_min),
        forbid = text_field("불가 시간대(쉼표 구분)", &key("forbidden_hours"), &res.forbidden_hours),
        penalty = num_field(
            "품질/생산 패널티 (원/kWh)",
            &key("penalty_won_per_kwh"),
            res.penalty_won_per_kwh
        ),
        priority = num_field("우선순위 (0~100)", &key("priority"), res.priority),
    )
}

pub fn render_vpp(cfg: &VppConfig, notice: Option<&Notice>) -> String {
    let issues: Vec<String> = cfg.issues().iter().map(ToString::to_string).collect();
    let notice = notice.map(Notice::html).unwrap_or_default();
    let resources: String = cfg
        .resources
        .iter()
        .enumerate()
        .map(|(idx, res)| resource_fields(idx, res))
        .collect();
    format!(
        r#"<section class="card"><h2>VPP 자원 설정</h2>{notice}
<form method="post" action="/vpp" class="cfg">
  <fieldset><legend>VPP 기본 설정</legend>{site}{auto}{horizon}{ramp}</fieldset>
  <h3>자원 목록</h3>
  {resources}
  <button type="submit" name="action" value="add" class="ghost">+ 자원 추가</button>
  {actions}
</form></section>"#,
        site = text_field("사업장 이름", "site_name", &cfg.site_name),
        auto = check_field("자율 제어", "auto", cfg.auto),
        horizon = num_field("제어 계획 지평 (분)", "control_horizon_min", cfg.control_horizon_min),
        ramp = num_field(
            "전체 램프 한계 (kW/분)",
            "ramp_limit_kw_per_min",
            cfg.ramp_limit_kw_per_min
        ),
        actions = actions(&first_issue(issues)),
    )
}

/// Flatten a config into the field pairs its form would post.
#[cfg(test)]
fn vpp_pairs(cfg: &VppConfig) -> Vec<(String, String)> {
    let mut out = vec![
        ("site_name".to_string(), cfg.site_name.clone()),
        ("control_horizon_min".to_string(), num_value(cfg.control_horizon_min)),
        ("ramp_limit_kw_per_min".to_string(), num_value(cfg.ramp_limit_kw_per_min)),
    ];
    if cfg.auto {
        out.push(("auto".to_string(), "on".to_string()));
    }
    for (i, r) in cfg.resources.iter().enumerate() {
        let mut push = |field: &str, value: String| out.push((format!("res.{i}.{field}"), value));
        push("id", r.id.clone());
        push("name", r.name.clone());
        push("type", r.kind.as_str().to_string());
        push("mode", r.mode.as_str().to_string());
        if r.enabled {
            push("enabled", "on".to_string());
        }
        push("shed_kw", num_value(r.shed_kw));
        push("min_on_min", num_value(r.min_on_min));
        push("min_off_min", num_value(r.min_off_min));
        push("ramp_kw_per_min", num_value(r.ramp_kw_per_min));
        push("forbidden_hours", r.forbidden_hours.clone());
        push("penalty_won_per_kwh", num_value(r.penalty_won_per_kwh));
        push("priority", num_value(r.priority));
    }
    out
}
