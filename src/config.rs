//! Viewer configuration, loadable from YAML.

use crate::enums::{Interpolation, Orientation, RenderMode, ScanPolicy, SortBy, TissuePreset};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How a DICOM series is read and shown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Series directory, scanned recursively
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default)]
    pub scan_policy: ScanPolicy,

    #[serde(default)]
    pub sort_by: SortBy,

    #[serde(default)]
    pub mode: RenderMode,

    /// Transfer function active at start
    #[serde(default)]
    pub preset: TissuePreset,

    #[serde(default)]
    pub orientation: Orientation,

    #[serde(default)]
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Points added per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Edge length of the cube points are drawn from
    #[serde(default = "default_extent")]
    pub extent: f32,

    #[serde(default = "default_point_interval_ms")]
    pub interval_ms: u64,
}

fn default_capacity() -> usize {
    10_000
}

fn default_batch_size() -> usize {
    200
}

fn default_extent() -> f32 {
    20.0
}

fn default_point_interval_ms() -> u64 {
    50
}

impl Default for PointCloudConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            batch_size: default_batch_size(),
            extent: default_extent(),
            interval_ms: default_point_interval_ms(),
        }
    }
}

impl PointCloudConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Translation applied per tick
    #[serde(default = "default_step")]
    pub step: [f32; 3],

    #[serde(default = "default_motion_interval_ms")]
    pub interval_ms: u64,
}

fn default_step() -> [f32; 3] {
    [0.01, 0.0, 0.0]
}

fn default_motion_interval_ms() -> u64 {
    30
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            interval_ms: default_motion_interval_ms(),
        }
    }
}

impl MotionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub series: SeriesConfig,

    #[serde(default)]
    pub point_cloud: PointCloudConfig,

    #[serde(default)]
    pub motion: MotionConfig,
}

impl ViewerConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.point_cloud.capacity == 0 {
            return Err(ConfigError::Invalid("point_cloud.capacity must be positive".into()));
        }
        if !(self.point_cloud.extent.is_finite() && self.point_cloud.extent > 0.0) {
            return Err(ConfigError::Invalid("point_cloud.extent must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_viewer_behaviour() {
        let config = ViewerConfig::default();
        assert_eq!(config.series.mode, RenderMode::Volume);
        assert_eq!(config.series.preset, TissuePreset::Bone);
        assert_eq!(config.series.scan_policy, ScanPolicy::Permissive);
        assert_eq!(config.point_cloud.capacity, 10_000);
        assert_eq!(config.point_cloud.interval(), Duration::from_millis(50));
        assert_eq!(config.motion.step, [0.01, 0.0, 0.0]);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = ViewerConfig::from_yaml_str(
            "series:\n  mode: slice\n  preset: soft-tissue\n  sort_by: instance-number\npoint_cloud:\n  capacity: 64\n",
        )
        .unwrap();
        assert_eq!(config.series.mode, RenderMode::Slice);
        assert_eq!(config.series.preset, TissuePreset::SoftTissue);
        assert_eq!(config.series.sort_by, SortBy::InstanceNumber);
        assert_eq!(config.point_cloud.capacity, 64);
        assert_eq!(config.point_cloud.batch_size, 200);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = ViewerConfig::from_yaml_str("point_cloud:\n  capacity: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.yaml");
        let mut config = ViewerConfig::default();
        config.series.directory = Some(PathBuf::from("/data/spine"));
        config.to_yaml(&path).unwrap();
        assert_eq!(ViewerConfig::from_yaml(&path).unwrap(), config);
    }
}
