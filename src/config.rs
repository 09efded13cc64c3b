//! Dashboard settings from `dashboard.yaml`, then environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "dashboard.yaml";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub backend_url: String,
    pub listen_addr: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub report: ReportSettings,
    pub layout: LayoutPreset,
    /// Expected flow-stage container width for the first paint, before the browser measures.
    pub stage_width_px: Option<f64>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            listen_addr: "127.0.0.1:3000".to_string(),
            poll_interval_secs: 60,
            request_timeout_secs: 10,
            report: ReportSettings::default(),
            layout: LayoutPreset::Full,
            stage_width_px: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Headless browser used for print-to-PDF.
    pub capture_cmd: String,
    /// Pause between switching to the print theme and capturing.
    pub settle_ms: u64,
    pub capture_timeout_secs: u64,
    /// Where the browser writes its PDF before it is read back. System temp dir when unset.
    pub scratch_dir: Option<String>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            capture_cmd: "chromium".to_string(),
            settle_ms: 50,
            capture_timeout_secs: 30,
            scratch_dir: None,
        }
    }
}

/// Which optional Home panels are shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPreset {
    #[default]
    Full,
    Compact,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DashboardLayout {
    pub donuts: bool,
    pub accumulated: bool,
    pub prices: bool,
    pub flow: bool,
    pub realtime: bool,
    pub logs: bool,
    pub stage_width: Option<f64>,
}

impl LayoutPreset {
    pub fn layout(self) -> DashboardLayout {
        match self {
            LayoutPreset::Full => DashboardLayout {
                donuts: true,
                accumulated: true,
                prices: true,
                flow: true,
                realtime: true,
                logs: true,
                stage_width: None,
            },
            LayoutPreset::Compact => DashboardLayout {
                donuts: true,
                accumulated: true,
                prices: true,
                flow: true,
                realtime: false,
                logs: false,
                stage_width: None,
            },
        }
    }
}

impl DashboardConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("read dashboard config")?;
        let cfg: DashboardConfig =
            serde_yaml::from_str(&content).context("parse dashboard config yaml")?;
        Ok(cfg)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = set("BACKEND_URL") {
            // Allow host:port without a scheme.
            self.backend_url = if url.starts_with("http://") || url.starts_with("https://") {
                url
            } else {
                format!("http://{url}")
            };
        }
        if let Some(addr) = set("DASHBOARD_HTTP_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(raw) = set("POLL_INTERVAL_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.poll_interval_secs = secs,
                _ => tracing::warn!("ignoring POLL_INTERVAL_SECS={raw}; keeping {}", self.poll_interval_secs),
            }
        }
        if let Some(cmd) = set("REPORT_CAPTURE_CMD") {
            self.report.capture_cmd = cmd;
        }
        self.backend_url = self.backend_url.trim_end_matches('/').to_string();
    }

    pub fn layout(&self) -> DashboardLayout {
        DashboardLayout {
            stage_width: self.stage_width_px,
            ..self.layout.layout()
        }
    }
}

/// Load `dashboard.yaml` (or defaults) and apply environment overrides.
pub fn load_dashboard_config() -> DashboardConfig {
    let mut cfg = DashboardConfig::load_from_file(DEFAULT_CONFIG_PATH).unwrap_or_else(|err| {
        tracing::warn!(?err, "failed to load {DEFAULT_CONFIG_PATH}, falling back to defaults");
        DashboardConfig::default()
    });
    cfg.apply_overrides(|key| std::env::var(key).ok());
    cfg
}
