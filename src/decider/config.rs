//! Configuration surface of the edge registration decider.
//!
//! Parameters live in a sectioned TOML file. The decider reads three
//! sections: a caller-chosen one for its own thresholds, the fixed
//! `VisualizationParameters` section, and the fixed `ICP` section that is
//! deserialized into [`IcpConfig`] and forwarded to the solver. Every key
//! is optional and falls back to its default.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::matching::IcpConfig;

fn default_icp_max_distance() -> f32 {
    10.0
}

fn default_icp_goodness_thresh() -> f32 {
    0.75
}

fn default_lc_min_nodeid_diff() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// Edge-search thresholds and the external image directory override.
#[derive(Debug, Clone, Deserialize)]
pub struct DeciderParams {
    /// Maximum translational distance (meters) between node poses for a
    /// candidate ICP pair; zero or negative means "consider all nodes".
    #[serde(rename = "ICP_max_distance", default = "default_icp_max_distance")]
    pub icp_max_distance: f32,

    /// Minimum ICP goodness (fraction in [0, 1]) required to register an edge.
    #[serde(rename = "ICP_goodness_thresh", default = "default_icp_goodness_thresh")]
    pub icp_goodness_thresh: f32,

    /// Minimum node-id gap for an edge to count as a loop closure.
    #[serde(rename = "LC_min_nodeid_diff", default = "default_lc_min_nodeid_diff")]
    pub lc_min_nodeid_diff: u64,

    /// Directory holding externally stored 3D-scan images; empty means
    /// "alongside the dataset".
    #[serde(rename = "scan_images_external_directory", default)]
    pub scan_images_external_directory: String,
}

impl Default for DeciderParams {
    fn default() -> Self {
        Self {
            icp_max_distance: default_icp_max_distance(),
            icp_goodness_thresh: default_icp_goodness_thresh(),
            lc_min_nodeid_diff: default_lc_min_nodeid_diff(),
            scan_images_external_directory: String::new(),
        }
    }
}

/// Toggles for the decider's visual surface.
#[derive(Debug, Clone, Deserialize)]
pub struct VisualizationParams {
    /// Draw the latest laser scan at the newest node.
    #[serde(default = "default_true")]
    pub visualize_laser_scans: bool,

    /// Show the intensity-image viewport for 3D sessions.
    #[serde(default = "default_true")]
    pub enable_intensity_viewport: bool,

    /// Show the range-image viewport for 3D sessions.
    #[serde(default = "default_true")]
    pub enable_range_viewport: bool,
}

impl Default for VisualizationParams {
    fn default() -> Self {
        Self {
            visualize_laser_scans: true,
            enable_intensity_viewport: true,
            enable_range_viewport: true,
        }
    }
}

/// Everything the decider loads from one configuration source.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub params: DeciderParams,
    pub visualization: VisualizationParams,
    pub icp: IcpConfig,
}

impl LoadedConfig {
    /// Parse the three decider sections out of a TOML document. Missing
    /// sections and missing keys fall back to defaults.
    pub fn from_toml_str(text: &str, section: &str) -> Result<Self> {
        let value: toml::Value = toml::from_str(text)?;

        let params = match value.get(section) {
            Some(table) => table.clone().try_into()?,
            None => DeciderParams::default(),
        };
        let visualization = match value.get("VisualizationParameters") {
            Some(table) => table.clone().try_into()?,
            None => VisualizationParams::default(),
        };
        let icp = match value.get("ICP") {
            Some(table) => table.clone().try_into()?,
            None => IcpConfig::default(),
        };

        Ok(Self {
            params,
            visualization,
            icp,
        })
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: &Path, section: &str) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text, section)
    }
}
