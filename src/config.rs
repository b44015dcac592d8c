// Copyright (c) 2025 Sean McNamara <smcnam@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Engine configuration: a validated struct resolved from an optional TOML
//! file on disk. `darkfactoryd` only takes `--project-root`/`--config` on
//! the command line, so there is no per-field CLI overlay here — whatever
//! `FileConfig` loads (or its defaults, if no file exists) is what
//! `EngineConfig::resolve` validates and returns.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Raw, partially-specified configuration as read from `dark-factory.toml`.
/// Every field optional so a bare CLI invocation with no config file works.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FileConfig {
    pub workflow: Option<String>,
    pub inbox_dir: Option<String>,
    pub queue_dir: Option<String>,
    pub completed_dir: Option<String>,
    pub log_dir: Option<String>,
    pub container_image: Option<String>,
    pub debounce_ms: Option<u64>,
    pub processor_tick_secs: Option<u64>,
    pub server_port: Option<u16>,
}

impl FileConfig {
    /// Load config from a file, or return default if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    Direct,
    Pr,
}

impl std::str::FromStr for WorkflowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(WorkflowKind::Direct),
            "pr" => Ok(WorkflowKind::Pr),
            other => Err(format!("invalid workflow \"{}\" (expected direct or pr)", other)),
        }
    }
}

/// Fully resolved, validated configuration the engine is constructed from.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub project_root: PathBuf,
    pub workflow: WorkflowKind,
    pub inbox_dir: PathBuf,
    pub queue_dir: PathBuf,
    pub completed_dir: PathBuf,
    pub log_dir: PathBuf,
    pub container_image: String,
    pub debounce_ms: u64,
    pub processor_tick_secs: u64,
    pub server_port: u16,
}

impl EngineConfig {
    /// Resolve a `FileConfig` against a project root, validating the
    /// directory-distinctness invariants from the external interfaces
    /// contract before returning.
    pub fn resolve(project_root: PathBuf, file: &FileConfig) -> Result<Self> {
        let workflow = file
            .workflow
            .as_deref()
            .unwrap_or("direct")
            .parse::<WorkflowKind>()
            .map_err(anyhow::Error::msg)?;

        let inbox_dir = project_root.join(file.inbox_dir.as_deref().unwrap_or("inbox"));
        let queue_dir = project_root.join(file.queue_dir.as_deref().unwrap_or("queue"));
        let completed_dir =
            project_root.join(file.completed_dir.as_deref().unwrap_or("completed"));
        let log_dir = project_root.join(file.log_dir.as_deref().unwrap_or("logs"));

        if completed_dir == queue_dir {
            bail!("completedDir must differ from queueDir");
        }
        if completed_dir == inbox_dir {
            bail!("completedDir must differ from inboxDir");
        }

        let debounce_ms = file.debounce_ms.unwrap_or(crate::constants::DEFAULT_DEBOUNCE_MS);
        if debounce_ms == 0 {
            bail!("debounceMs must be positive");
        }

        let server_port = file.server_port.unwrap_or(0);

        Ok(Self {
            project_root,
            workflow,
            inbox_dir,
            queue_dir,
            completed_dir,
            log_dir,
            container_image: file
                .container_image
                .clone()
                .unwrap_or_else(|| "dark-factory/runner:latest".to_string()),
            debounce_ms,
            processor_tick_secs: file
                .processor_tick_secs
                .unwrap_or(crate::constants::DEFAULT_PROCESSOR_TICK_SECS),
            server_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_file_config_is_empty() {
        let cfg = EngineConfig::resolve(PathBuf::from("/proj"), &FileConfig::default()).unwrap();
        assert_eq!(cfg.workflow, WorkflowKind::Direct);
        assert_eq!(cfg.queue_dir, PathBuf::from("/proj/queue"));
        assert_eq!(cfg.server_port, 0);
    }

    #[test]
    fn rejects_completed_dir_equal_to_queue_dir() {
        let file = FileConfig {
            completed_dir: Some("queue".to_string()),
            ..Default::default()
        };
        assert!(EngineConfig::resolve(PathBuf::from("/proj"), &file).is_err());
    }

    #[test]
    fn rejects_zero_debounce() {
        let file = FileConfig {
            debounce_ms: Some(0),
            ..Default::default()
        };
        assert!(EngineConfig::resolve(PathBuf::from("/proj"), &file).is_err());
    }

    #[test]
    fn parses_pr_workflow() {
        assert_eq!("pr".parse::<WorkflowKind>().unwrap(), WorkflowKind::Pr);
        assert!("bogus".parse::<WorkflowKind>().is_err());
    }
}
