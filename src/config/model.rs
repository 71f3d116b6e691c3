//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration of a flockwork work directory.
///
/// This struct represents the contents of `<work_dir>/flockwork.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Worker settings
    // =========================================================================
    /// Tasks claimed per batch.
    #[serde(default = "default_num_tasks")]
    pub num_tasks: usize,

    /// Backoff between claim attempts while peers hold all remaining work.
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,

    /// Idle time after which the starvation monitor starts reporting.
    #[serde(default = "default_starvation_ms")]
    pub starvation_ms: u64,

    // =========================================================================
    // Status table layout
    // =========================================================================
    /// Value bytes per status slot (1..=8). Also the width of the id counter.
    #[serde(default = "default_use_bytes")]
    pub use_bytes: usize,

    /// Separator byte leading every status slot. Must not be 0x00 or 0xFF.
    #[serde(default = "default_separator")]
    pub separator: u8,

    // =========================================================================
    // File layout (relative to the work directory)
    // =========================================================================
    #[serde(default = "default_queue_file")]
    pub queue_file: String,

    #[serde(default = "default_status_file")]
    pub status_file: String,

    #[serde(default = "default_id_file")]
    pub id_file: String,

    #[serde(default = "default_locks_dir")]
    pub locks_dir: String,

    #[serde(default = "default_events_file")]
    pub events_file: String,

    #[serde(default = "default_progress_file")]
    pub progress_file: String,

    // =========================================================================
    // Reporting
    // =========================================================================
    /// Interval between progress snapshots.
    #[serde(default = "default_progress_refresh_ms")]
    pub progress_refresh_ms: u64,

    /// Default tracing filter; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_tasks: default_num_tasks(),
            wait_ms: default_wait_ms(),
            starvation_ms: default_starvation_ms(),
            use_bytes: default_use_bytes(),
            separator: default_separator(),
            queue_file: default_queue_file(),
            status_file: default_status_file(),
            id_file: default_id_file(),
            locks_dir: default_locks_dir(),
            events_file: default_events_file(),
            progress_file: default_progress_file(),
            progress_refresh_ms: default_progress_refresh_ms(),
            log_level: default_log_level(),
        }
    }
}
