use crate::loader::fetch::DEFAULT_MAX_FETCH_BYTES;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Engine-wide settings, read once per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of background worker threads shared by every job kind
    pub worker_count: usize,

    /// Widest texture row the downstream uploader accepts
    pub max_texture_width: usize,

    /// Timeout for a single remote fetch
    pub fetch_timeout_ms: u64,

    /// Largest file or response body a fetch accepts
    pub max_fetch_bytes: u64,

    /// Trailing window used for motion deltas when the caller has no preference
    pub motion_window_frames: u32,

    /// Matrices kept by the correlation cache
    pub correlation_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().clamp(1, 8),
            max_texture_width: 4096,
            fetch_timeout_ms: 30_000,
            max_fetch_bytes: DEFAULT_MAX_FETCH_BYTES,
            motion_window_frames: 5,
            correlation_cache_capacity: 16,
        }
    }
}

impl EngineConfig {
    pub fn from_json(config: Value) -> Result<Self> {
        let config: Self =
            serde_json::from_value(config).context("Failed to deserialize engine config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a JSON file on disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .context(format!("Failed to read engine config from {:?}", path))?;
        let value: Value = serde_json::from_str(&json)
            .context(format!("Failed to parse engine config at {:?}", path))?;
        Self::from_json(value)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            bail!("worker_count must be at least 1");
        }
        if self.max_texture_width == 0 {
            bail!("max_texture_width must be at least 1");
        }
        if self.max_fetch_bytes == 0 {
            bail!("max_fetch_bytes must be at least 1");
        }
        if self.motion_window_frames == 0 {
            bail!("motion_window_frames must be at least 1");
        }
        Ok(())
    }
}
