//! Pipeline configuration.
//!
//! Stored as RON. A missing file yields the defaults.

use std::fs;
use std::path::Path;

use quarry_common::{ConfigError, SchemaVersion};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::reducer::NegativeDamagePolicy;

/// Default notice bus capacity.
pub const DEFAULT_NOTICE_CAPACITY: usize = 1024;

/// Damage pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Config format version
    pub version: SchemaVersion,
    /// What to do with negative final damage
    pub negative_damage: NegativeDamagePolicy,
    /// Trace every applied modifier
    pub log_steps: bool,
    /// Capacity of the notice bus. Must be at least 1.
    pub notice_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: SchemaVersion::PIPELINE_CONFIG,
            negative_damage: NegativeDamagePolicy::default(),
            log_steps: false,
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Parse from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if !SchemaVersion::PIPELINE_CONFIG.can_read(&config.version) {
            return Err(ConfigError::Parse(format!(
                "unsupported config version {}",
                config.version
            )));
        }
        if config.notice_capacity == 0 {
            return Err(ConfigError::Parse(
                "notice_capacity must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Serialize to pretty RON text.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Load from a file. Returns defaults if the file doesn't exist.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Pipeline config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config = Self::from_ron_str(&contents)?;
        info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Save to a file, creating parent directories if needed.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_ron_string()?)?;

        info!("Saved pipeline config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.negative_damage, NegativeDamagePolicy::ClampToZero);
        assert!(!config.log_steps);
        assert_eq!(config.notice_capacity, 1024);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = PipelineConfig::from_ron_str("(negative_damage: Allow)").unwrap();
        assert_eq!(config.negative_damage, NegativeDamagePolicy::Allow);
        assert_eq!(config.notice_capacity, DEFAULT_NOTICE_CAPACITY);
    }

    #[test]
    fn test_invalid_ron() {
        let err = PipelineConfig::from_ron_str("(log_steps: maybe)").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rejects_newer_major_version() {
        let text = "(version: (major: 2, minor: 0, patch: 0))";
        assert!(PipelineConfig::from_ron_str(text).is_err());
    }

    #[test]
    fn test_rejects_zero_notice_capacity() {
        let err = PipelineConfig::from_ron_str("(notice_capacity: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("notice_capacity")));
    }

    #[test]
    fn test_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load_from(dir.path().join("missing.ron")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pipeline.ron");
        let config = PipelineConfig {
            negative_damage: NegativeDamagePolicy::Allow,
            log_steps: true,
            notice_capacity: 16,
            ..PipelineConfig::default()
        };

        config.save_to(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("notice_capacity"));

        assert_eq!(PipelineConfig::load_from(&path).unwrap(), config);
    }
}
