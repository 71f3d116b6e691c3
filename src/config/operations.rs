//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{QueueError, Result};
use crate::status::SlotFormat;
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(QueueError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            QueueError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from `path`, falling back to defaults when the file does
    /// not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| QueueError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| QueueError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `num_tasks` must be positive
    /// - `use_bytes` must be in `1..=8` and `separator` must not be 0x00 or 0xFF
    /// - file names must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.num_tasks == 0 {
            return Err(QueueError::Config(
                "num_tasks must be greater than 0".to_string(),
            ));
        }

        self.slot_format()?;

        let files = [
            ("queue_file", &self.queue_file),
            ("status_file", &self.status_file),
            ("id_file", &self.id_file),
            ("locks_dir", &self.locks_dir),
            ("events_file", &self.events_file),
            ("progress_file", &self.progress_file),
        ];
        for (field, value) in files {
            if value.trim().is_empty() {
                return Err(QueueError::Config(format!("{} must not be empty", field)));
            }
        }

        Ok(())
    }

    /// Status slot layout described by this config.
    pub fn slot_format(&self) -> Result<SlotFormat> {
        SlotFormat::new(self.use_bytes, self.separator)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn starvation_timeout(&self) -> Duration {
        Duration::from_millis(self.starvation_ms)
    }

    pub fn progress_refresh(&self) -> Duration {
        Duration::from_millis(self.progress_refresh_ms)
    }
}
