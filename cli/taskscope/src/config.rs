//! `taskscope.toml` configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use taskscope_analysis::SessionConfig;
use taskscope_core::{BuildOptions, Timestamp};

pub const CONFIG_FILE_NAME: &str = "taskscope.toml";

/// Settings read from `taskscope.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskscopeConfig {
    #[serde(default)]
    pub index: IndexSection,
    #[serde(default)]
    pub gaps: GapsSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSection {
    #[serde(default)]
    pub bucket_width: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapsSection {
    /// Shortest idle interval reported.
    #[serde(default)]
    pub min_gap_length: Option<Timestamp>,
    /// Count only task commands as activity.
    #[serde(default)]
    pub task_only: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSection {
    #[serde(default)]
    pub warn_unresolved_dependencies: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSection {
    /// Default log level when `TASKSCOPE_LOG` is unset.
    #[serde(default)]
    pub level: Option<String>,
}

impl TaskscopeConfig {
    /// Search upward from `start_dir` for a `taskscope.toml` file, parse and
    /// return it along with its path.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                let config = Self::load(&candidate)?;
                return Ok(Some((config, candidate)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Session settings, with `bucket_width` taking precedence over the file.
    pub fn session_config(&self, bucket_width: Option<Timestamp>) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(width) = bucket_width.or(self.index.bucket_width) {
            config = config.with_bucket_width(width);
        }
        let mut build = BuildOptions::default();
        if let Some(warn) = self.build.warn_unresolved_dependencies {
            build.warn_unresolved_dependencies = warn;
        }
        config.with_build_options(build)
    }

    pub fn min_gap_length(&self, flag: Option<Timestamp>) -> Timestamp {
        flag.or(self.gaps.min_gap_length).unwrap_or(0)
    }

    pub fn task_only(&self, flag: bool) -> bool {
        flag || self.gaps.task_only.unwrap_or(false)
    }
}
