use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use site_core::snapshot::PeakWindow;
use site_core::{EssConfig, VppConfig};

/// Site description loaded from `site.yaml`.
#[derive(Clone, Debug, Deserialize)]
pub struct SiteFile {
    pub site: SiteCfg,
    #[serde(default = "default_export_limit_kw")]
    pub export_limit_kw: f64,
    #[serde(default)]
    pub curtailment: CurtailmentCfg,
    #[serde(default = "default_vpp_nodes")]
    pub vpp_nodes: u32,
    #[serde(default)]
    pub market: MarketCfg,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default)]
    pub ess: EssConfig,
    #[serde(default)]
    pub vpp: VppConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SiteCfg {
    pub name: String,
    #[serde(default)]
    pub location: String,
    pub pv_capacity_kwp: f64,
    #[serde(default)]
    pub operator: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CurtailmentCfg {
    pub pred_today_mwh: f64,
    #[serde(default)]
    pub pred_daily_max_mwh: Option<f64>,
    #[serde(default)]
    pub peak_windows: Vec<PeakWindow>,
}

impl Default for CurtailmentCfg {
    fn default() -> Self {
        Self {
            pred_today_mwh: 3.2,
            pred_daily_max_mwh: None,
            peak_windows: vec![PeakWindow {
                start: "13:00".to_string(),
                end: "15:00".to_string(),
            }],
        }
    }
}

/// Starting points for the SMP/REC random walk, 원/kWh.
#[derive(Clone, Debug, Deserialize)]
pub struct MarketCfg {
    pub smp_base: f64,
    pub rec_base: f64,
}

impl Default for MarketCfg {
    fn default() -> Self {
        Self {
            smp_base: 140.0,
            rec_base: 58.5,
        }
    }
}

pub fn default_export_limit_kw() -> f64 {
    450.0
}

pub fn default_vpp_nodes() -> u32 {
    20
}

pub fn default_tick_secs() -> u64 {
    4
}

impl SiteFile {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("read site config")?;
        let cfg: SiteFile = serde_yaml::from_str(&content).context("parse site config yaml")?;
        Ok(cfg)
    }

    pub fn demo() -> Self {
        Self {
            site: SiteCfg {
                name: "솔라파크 1호".to_string(),
                location: "전라남도 영암".to_string(),
                pv_capacity_kwp: 627.12,
                operator: "운영팀".to_string(),
            },
            export_limit_kw: default_export_limit_kw(),
            curtailment: CurtailmentCfg::default(),
            vpp_nodes: default_vpp_nodes(),
            market: MarketCfg::default(),
            tick_secs: default_tick_secs(),
            ess: EssConfig::default(),
            vpp: VppConfig::default(),
        }
    }
}

/// Load `SITE_CONFIG_PATH` (default `site.yaml`), falling back to the built-in demo site.
pub fn load_site_config() -> SiteFile {
    let path = std::env::var("SITE_CONFIG_PATH").unwrap_or_else(|_| "site.yaml".to_string());
    SiteFile::load_from_file(&path).unwrap_or_else(|err| {
        tracing::warn!(?err, path = %path, "failed to load site config, falling back to defaults");
        SiteFile::demo()
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyTarget {
    Ess,
    Vpp,
}

/// Receipt for an "apply to simulator" request.
#[derive(Clone, Debug, Serialize)]
pub struct ApplyRecord {
    pub id: Uuid,
    pub target: ApplyTarget,
    pub submitted_at: DateTime<Utc>,
    pub status: String,
}

impl ApplyRecord {
    pub fn accepted(target: ApplyTarget) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            submitted_at: Utc::now(),
            status: "applied".to_string(),
        }
    }
}

/// Body of a 400 from the config endpoints.
#[derive(Debug, Serialize)]
pub struct IssueBody {
    pub error: String,
    pub issues: Vec<String>,
}
