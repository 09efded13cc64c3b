//! ESS and VPP operating parameters shared by the dashboard forms and the backend.
//!
//! Both sides validate with the same rules and sanitize with the same clamps,
//! so a payload the form accepts is one the backend stores unchanged.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigIssue, ValidationError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EssMode {
    #[default]
    Simulate,
    Mqtt,
}

impl EssMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EssMode::Simulate => "simulate",
            EssMode::Mqtt => "mqtt",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "simulate" => Some(EssMode::Simulate),
            "mqtt" => Some(EssMode::Mqtt),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EssConfig {
    pub name: String,
    pub mode: EssMode,
    pub mqtt_topic: String,
    pub auto: bool,
    pub capacity_kwh: f64,
    pub rated_kw: f64,
    pub soc_min: f64,
    pub soc_max: f64,
    pub c_rate_chg: f64,
    pub c_rate_dis: f64,
    pub eff_chg: f64,
    pub eff_dis: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub forbid_hours: String,
}

impl Default for EssConfig {
    fn default() -> Self {
        Self {
            name: "ESS #1".to_string(),
            mode: EssMode::Simulate,
            mqtt_topic: "essvpp/ess1".to_string(),
            auto: true,
            capacity_kwh: 500.0,
            rated_kw: 250.0,
            soc_min: 15.0,
            soc_max: 90.0,
            c_rate_chg: 0.5,
            c_rate_dis: 0.5,
            eff_chg: 95.0,
            eff_dis: 95.0,
            temp_min_c: 0.0,
            temp_max_c: 45.0,
            forbid_hours: "12-13, 18-19".to_string(),
        }
    }
}

impl EssConfig {
    /// Every broken rule, in the order the form reports them.
    pub fn issues(&self) -> Vec<ConfigIssue> {
        let mut out = Vec::new();
        if !(self.soc_min < self.soc_max) {
            out.push(ConfigIssue::SocBounds);
        }
        if !(self.capacity_kwh > 0.0) {
            out.push(ConfigIssue::Capacity);
        }
        if !(self.rated_kw > 0.0) {
            out.push(ConfigIssue::RatedPower);
        }
        if !(self.eff_chg > 0.0 && self.eff_chg <= 100.0) {
            out.push(ConfigIssue::ChargeEfficiency);
        }
        if !(self.eff_dis > 0.0 && self.eff_dis <= 100.0) {
            out.push(ConfigIssue::DischargeEfficiency);
        }
        if !(self.temp_min_c < self.temp_max_c) {
            out.push(ConfigIssue::TemperatureBounds);
        }
        if self.mode == EssMode::Mqtt && self.mqtt_topic.trim().is_empty() {
            out.push(ConfigIssue::MqttTopic);
        }
        if let Err(issue) = parse_forbidden_hours(&self.forbid_hours) {
            out.push(issue);
        }
        out
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(issues))
        }
    }

    /// Clamp numerics into their storable ranges.
    pub fn sanitized(&self) -> Self {
        Self {
            soc_min: self.soc_min.clamp(0.0, 100.0),
            soc_max: self.soc_max.clamp(0.0, 100.0),
            eff_chg: self.eff_chg.clamp(1.0, 100.0),
            eff_dis: self.eff_dis.clamp(1.0, 100.0),
            c_rate_chg: self.c_rate_chg.max(0.0),
            c_rate_dis: self.c_rate_dis.max(0.0),
            capacity_kwh: self.capacity_kwh.max(0.1),
            rated_kw: self.rated_kw.max(0.1),
            ..self.clone()
        }
    }

    /// Charge/discharge power ceilings implied by the C-rates, capped at rated power.
    pub fn power_limits_kw(&self) -> (f64, f64) {
        let chg = (self.capacity_kwh * self.c_rate_chg).min(self.rated_kw);
        let dis = (self.capacity_kwh * self.c_rate_dis).min(self.rated_kw);
        (chg.max(0.0), dis.max(0.0))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceType {
    Hvac,
    Chiller,
    Evcs,
    Process,
    #[default]
    Etc,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Hvac,
        ResourceType::Chiller,
        ResourceType::Evcs,
        ResourceType::Process,
        ResourceType::Etc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Hvac => "HVAC",
            ResourceType::Chiller => "CHILLER",
            ResourceType::Evcs => "EVCS",
            ResourceType::Process => "PROCESS",
            ResourceType::Etc => "ETC",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    #[default]
    Auto,
    Manual,
}

impl ControlMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlMode::Auto => "auto",
            ControlMode::Manual => "manual",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auto" => Some(ControlMode::Auto),
            "manual" => Some(ControlMode::Manual),
            _ => None,
        }
    }
}

/// One demand-response resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrResource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub enabled: bool,
    pub shed_kw: f64,
    pub min_on_min: f64,
    pub min_off_min: f64,
    pub ramp_kw_per_min: f64,
    pub forbidden_hours: String,
    pub penalty_won_per_kwh: f64,
    pub priority: f64,
    pub mode: ControlMode,
}

impl Default for DrResource {
    fn default() -> Self {
        Self::blank(0)
    }
}

impl DrResource {
    /// Entry appended by "add resource" when `existing` resources are already listed.
    pub fn blank(existing: usize) -> Self {
        Self {
            id: format!("RES{}", existing + 1),
            name: String::new(),
            kind: ResourceType::Etc,
            enabled: true,
            shed_kw: 0.0,
            min_on_min: 0.0,
            min_off_min: 0.0,
            ramp_kw_per_min: 0.0,
            forbidden_hours: String::new(),
            penalty_won_per_kwh: 0.0,
            priority: 50.0,
            mode: ControlMode::Auto,
        }
    }

    fn sample() -> Self {
        Self {
            id: "LOAD1".to_string(),
            name: "항온항습기 #1".to_string(),
            kind: ResourceType::Hvac,
            enabled: true,
            shed_kw: 120.0,
            min_on_min: 10.0,
            min_off_min: 10.0,
            ramp_kw_per_min: 30.0,
            forbidden_hours: "12-13".to_string(),
            penalty_won_per_kwh: 0.0,
            priority: 50.0,
            mode: ControlMode::Auto,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VppConfig {
    pub site_name: String,
    pub auto: bool,
    pub control_horizon_min: f64,
    pub ramp_limit_kw_per_min: f64,
    pub resources: Vec<DrResource>,
}

impl Default for VppConfig {
    fn default() -> Self {
        Self {
            site_name: "산업단지 A".to_string(),
            auto: true,
            control_horizon_min: 60.0,
            ramp_limit_kw_per_min: 100.0,
            resources: vec![DrResource::sample()],
        }
    }
}

impl VppConfig {
    pub fn issues(&self) -> Vec<ConfigIssue> {
        let mut out = Vec::new();
        if !(self.control_horizon_min > 0.0) {
            out.push(ConfigIssue::ControlHorizon);
        }
        for (idx, r) in self.resources.iter().enumerate() {
            let n = idx + 1;
            if r.name.trim().is_empty() {
                out.push(ConfigIssue::ResourceName(n));
            }
            if !(r.shed_kw > 0.0) {
                out.push(ConfigIssue::ResourceShed(n));
            }
            if r.min_on_min < 0.0 || r.min_off_min < 0.0 {
                out.push(ConfigIssue::ResourceMinOnOff(n));
            }
            if !(0.0..=100.0).contains(&r.priority) {
                out.push(ConfigIssue::ResourcePriority(n));
            }
            if let Err(issue) = parse_forbidden_hours(&r.forbidden_hours) {
                out.push(issue);
            }
        }
        out
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(issues))
        }
    }

    pub fn sanitized(&self) -> Self {
        Self {
            control_horizon_min: self.control_horizon_min.max(1.0),
            ramp_limit_kw_per_min: self.ramp_limit_kw_per_min.max(0.0),
            resources: self
                .resources
                .iter()
                .map(|r| DrResource {
                    shed_kw: r.shed_kw.max(0.0),
                    min_on_min: r.min_on_min.max(0.0),
                    min_off_min: r.min_off_min.max(0.0),
                    ramp_kw_per_min: r.ramp_kw_per_min.max(0.0),
                    penalty_won_per_kwh: r.penalty_won_per_kwh.max(0.0),
                    priority: r.priority.clamp(0.0, 100.0),
                    ..r.clone()
                })
                .collect(),
            ..self.clone()
        }
    }

    pub fn add_resource(&mut self) {
        let next = DrResource::blank(self.resources.len());
        self.resources.push(next);
    }

    pub fn remove_resource(&mut self, idx: usize) -> Option<DrResource> {
        (idx < self.resources.len()).then(|| self.resources.remove(idx))
    }

    /// Shed capacity available at `hour` from enabled resources.
    pub fn available_shed_kw(&self, hour: u32) -> f64 {
        self.resources
            .iter()
            .filter(|r| r.enabled)
            .filter(|r| !hour_forbidden(&r.forbidden_hours, hour))
            .map(|r| r.shed_kw.max(0.0))
            .sum()
    }
}

/// `[start, end)` in whole hours; `end < start` wraps past midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HourRange {
    pub start: u32,
    pub end: u32,
}

impl HourRange {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

/// Parse `"12-13, 18-19"`. Blank input means no forbidden hours.
pub fn parse_forbidden_hours(raw: &str) -> Result<Vec<HourRange>, ConfigIssue> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let bad = || ConfigIssue::ForbiddenHours(part.to_string());
            let (start, end) = part.split_once('-').ok_or_else(bad)?;
            let start: u32 = start.trim().parse().map_err(|_| bad())?;
            let end: u32 = end.trim().parse().map_err(|_| bad())?;
            if start > 23 || end > 24 || start == end {
                return Err(bad());
            }
            Ok(HourRange { start, end })
        })
        .collect()
}

/// Lenient check used at run time; a malformed string forbids nothing.
pub fn hour_forbidden(raw: &str, hour: u32) -> bool {
    parse_forbidden_hours(raw)
        .map(|ranges| ranges.iter().any(|r| r.contains(hour)))
        .unwrap_or(false)
}
