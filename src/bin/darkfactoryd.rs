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

//! Minimal daemon entrypoint: parse a handful of flags, build an
//! `EngineConfig`, wire the default `CommandExecutor`/`GitReleaser` (or
//! `PrReleaser` for the `pr` workflow), and run the engine to completion.
//!
//! The CLI front-end proper (argument parsing beyond what's needed to make
//! this crate runnable) and the YAML/TOML config loader's full surface are
//! out of CORE scope; this binary exists so the engine is exercised end to
//! end rather than left a library stub.

use anyhow::{Context, Result};
use clap::Parser;
use dark_factory::config::{EngineConfig, FileConfig, WorkflowKind};
use dark_factory::{CommandExecutor, Engine, GitReleaser, NullStatusServer, PrReleaser};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "darkfactoryd")]
#[command(about = "Unattended daemon that drives a sequential pipeline of AI-coding prompts")]
#[command(version)]
struct Cli {
    /// Project root the engine operates in. All configured directories
    /// (inbox, queue, completed, log) and the instance lock are resolved
    /// relative to this path.
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Path to the engine config file. Relative paths are resolved against
    /// `project_root`.
    #[arg(long, default_value = "darkfactory.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let project_root = std::fs::canonicalize(&cli.project_root).with_context(|| {
        format!(
            "project root {} does not exist",
            cli.project_root.display()
        )
    })?;

    let config_path = if cli.config.is_absolute() {
        cli.config
    } else {
        project_root.join(&cli.config)
    };

    let file_config = FileConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let config = EngineConfig::resolve(project_root, &file_config)
        .context("invalid engine configuration")?;

    let executor = Arc::new(CommandExecutor::new(config.container_image.clone()));
    let releaser: Arc<dyn dark_factory::ReleaserTrait> = match config.workflow {
        WorkflowKind::Direct => Arc::new(GitReleaser::new(config.project_root.clone())),
        WorkflowKind::Pr => Arc::new(PrReleaser::new(config.project_root.clone())),
    };
    let status_server = Arc::new(NullStatusServer);

    let engine = Engine::new(config, executor, releaser, status_server);
    engine.run()
}
