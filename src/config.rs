use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAX_SUBPAGES: usize = 10;

/// Tunables for a mirroring job. Every field has a default so a partial
/// JSON file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Size of the bounded image download pool
    pub max_concurrent: usize,
    /// Cap on subpages mirrored in multi-page mode
    pub max_subpages: usize,
    pub request_timeout_secs: u64,
    /// Deadline for one whole job (root page, subpages and validation)
    pub job_timeout_secs: u64,
    pub user_agent: String,
    pub show_progress: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            max_subpages: DEFAULT_MAX_SUBPAGES,
            request_timeout_secs: 30,
            job_timeout_secs: 600,
            user_agent: "SiteCloner/1.0".to_string(),
            show_progress: true,
        }
    }
}

impl MirrorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: MirrorConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.max_concurrent > 0, "max_concurrent must be at least 1");
        anyhow::ensure!(self.request_timeout_secs > 0, "request_timeout_secs must be at least 1");
        anyhow::ensure!(self.job_timeout_secs > 0, "job_timeout_secs must be at least 1");
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}
