//! Configuration structures for Quadra.

use crate::error::{QuadraError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound on the classroom count. Classroom ids are stored as `u8`.
pub const MAX_CLASSROOMS: u32 = 255;

/// Storage configuration for the indexed record stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding record logs, index side-files and `config.dat`.
    pub data_dir: PathBuf,
    /// Call fsync after every log and side-file write.
    pub fsync_enabled: bool,
    /// Run the integrity check when a store is opened.
    pub verify_on_open: bool,
    /// Initial bucket count of each Point Index.
    pub hash_initial_buckets: usize,
    /// Load factor above which a Point Index rehashes.
    pub hash_max_load_factor: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            fsync_enabled: true,
            verify_on_open: true,
            hash_initial_buckets: 101,
            hash_max_load_factor: 0.7,
        }
    }
}

impl StorageConfig {
    /// Returns a default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of classrooms, numbered from 1.
    pub classrooms: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { classrooms: 5 }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadraConfig {
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
}

impl QuadraConfig {
    /// Parses a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| QuadraError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.storage.hash_initial_buckets == 0 {
            return Err(QuadraError::Config(
                "hash_initial_buckets must be at least 1".to_string(),
            ));
        }
        let lf = self.storage.hash_max_load_factor;
        if !(lf > 0.0 && lf <= 1.0) {
            return Err(QuadraError::Config(format!(
                "hash_max_load_factor must be in (0, 1], got {}",
                lf
            )));
        }
        if self.scheduler.classrooms == 0 || self.scheduler.classrooms > MAX_CLASSROOMS {
            return Err(QuadraError::Config(format!(
                "classrooms must be in 1..={}, got {}",
                MAX_CLASSROOMS, self.scheduler.classrooms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(config.fsync_enabled);
        assert!(config.verify_on_open);
        assert_eq!(config.hash_initial_buckets, 101);
        assert_eq!(config.hash_max_load_factor, 0.7);
    }

    #[test]
    fn test_storage_config_with_data_dir() {
        let config = StorageConfig::with_data_dir("/var/lib/quadra");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/quadra"));
        assert_eq!(config.hash_initial_buckets, 101);
    }

    #[test]
    fn test_scheduler_config_defaults() {
        assert_eq!(SchedulerConfig::default().classrooms, 5);
    }

    #[test]
    fn test_storage_config_serde_roundtrip() {
        let original = StorageConfig {
            fsync_enabled: false,
            hash_initial_buckets: 7,
            ..Default::default()
        };
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: StorageConfig = serde_json::from_str(&serialized).unwrap();

        assert_eq!(original.data_dir, deserialized.data_dir);
        assert_eq!(deserialized.hash_initial_buckets, 7);
        assert!(!deserialized.fsync_enabled);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = QuadraConfig::from_toml_str(
            r#"
            [storage]
            data_dir = "/tmp/quadra"
            fsync_enabled = false

            [scheduler]
            classrooms = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/quadra"));
        assert!(!config.storage.fsync_enabled);
        assert!(config.storage.verify_on_open);
        assert_eq!(config.storage.hash_initial_buckets, 101);
        assert_eq!(config.scheduler.classrooms, 3);
    }

    #[test]
    fn test_from_toml_empty_is_default() {
        let config = QuadraConfig::from_toml_str("").unwrap();
        assert_eq!(config.scheduler.classrooms, 5);
        assert_eq!(config.storage.hash_max_load_factor, 0.7);
    }

    #[test]
    fn test_from_toml_malformed() {
        let err = QuadraConfig::from_toml_str("[storage\nfsync_enabled = ").unwrap_err();
        assert!(matches!(err, QuadraError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = QuadraConfig::default();
        config.storage.hash_initial_buckets = 0;
        assert!(config.validate().is_err());

        let mut config = QuadraConfig::default();
        config.storage.hash_max_load_factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = QuadraConfig::default();
        config.storage.hash_max_load_factor = 0.0;
        assert!(config.validate().is_err());

        let mut config = QuadraConfig::default();
        config.scheduler.classrooms = 0;
        assert!(config.validate().is_err());

        let mut config = QuadraConfig::default();
        config.scheduler.classrooms = 256;
        assert!(config.validate().is_err());

        assert!(QuadraConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quadra.toml");
        std::fs::write(&path, "[scheduler]\nclassrooms = 2\n").unwrap();

        let config = QuadraConfig::load(&path).unwrap();
        assert_eq!(config.scheduler.classrooms, 2);

        let missing = QuadraConfig::load(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(QuadraError::Io(_))));
    }
}
