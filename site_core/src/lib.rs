//! Shared site-monitoring logic: status normalization, derived display metrics,
//! layout geometry, report assembly and ESS/VPP configuration rules.
//! Keep this crate free of HTTP/async deps so the dashboard and the backend can both reuse it.

pub mod config;
pub mod demo;
pub mod error;
pub mod geometry;
pub mod metrics;
pub mod report;
pub mod snapshot;
pub mod stage;
pub mod value;

pub use config::{ControlMode, DrResource, EssConfig, EssMode, ResourceType, VppConfig};
pub use demo::{PlaceholderData, WavePlaceholder};
pub use error::{ConfigIssue, ValidationError};
pub use report::{RenderMode, SectionId, SectionToggles, Theme};
pub use snapshot::StatusSnapshot;
pub use stage::{StageGeometry, StageScaler};
