//! Configuration constants and default value functions.
//!
//! Used by the `Config` struct's serde defaults.

/// File name of the configuration inside a work directory.
pub const CONFIG_FILE_NAME: &str = "flockwork.yaml";

pub fn default_num_tasks() -> usize {
    15
}

pub fn default_wait_ms() -> u64 {
    10_000
}

pub fn default_starvation_ms() -> u64 {
    60_000
}

pub fn default_use_bytes() -> usize {
    2
}

pub fn default_separator() -> u8 {
    0xAA
}

pub fn default_queue_file() -> String {
    "queue".to_string()
}

pub fn default_status_file() -> String {
    "done".to_string()
}

pub fn default_id_file() -> String {
    "id".to_string()
}

pub fn default_locks_dir() -> String {
    "locks".to_string()
}

pub fn default_events_file() -> String {
    "events.ndjson".to_string()
}

pub fn default_progress_file() -> String {
    "progress.bin".to_string()
}

pub fn default_progress_refresh_ms() -> u64 {
    1_000
}

pub fn default_log_level() -> String {
    "info".to_string()
}
