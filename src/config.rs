// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Pipeline configuration, loadable from JSON and overridable from the CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Highest deflate level; the packer defaults to it.
pub const MAX_COMPRESSION_LEVEL: i64 = 9;

/// What to do when two attachments resolve to the same output name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// The later attachment replaces the earlier one.
    #[default]
    Overwrite,
    /// The later attachment is stored as `<stem>-<n>.<tag>`.
    Suffix,
}

/// Settings shared by every request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory under which per-request working directories are created.
    pub work_root: PathBuf,
    pub collisions: CollisionPolicy,
    /// Overall per-request deadline in seconds; unbounded when absent.
    pub deadline_secs: Option<u64>,
    /// Deflate level for the output archive (0-9).
    pub compression_level: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir(),
            collisions: CollisionPolicy::default(),
            deadline_secs: None,
            compression_level: MAX_COMPRESSION_LEVEL,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_COMPRESSION_LEVEL).contains(&self.compression_level) {
            bail!(
                "compression_level must be between 0 and {}, got {}",
                MAX_COMPRESSION_LEVEL,
                self.compression_level
            );
        }
        if self.deadline_secs == Some(0) {
            bail!("deadline_secs must be greater than zero");
        }
        Ok(())
    }
}
