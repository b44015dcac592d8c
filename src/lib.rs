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

//! dark-factory: an unattended daemon that drives a sequential pipeline of
//! AI-coding prompts through detection, normalization, validation, sandboxed
//! execution, and post-execution version control.
//!
//! This crate is the pipeline engine CORE: the Prompt Store, Normalizer,
//! Instance Lock, Watcher, Processor, and the `Engine` that wires them
//! together under a single cancellable shutdown flag. The CLI front-end,
//! config-file format, container runtime, and VCS driver are contracted out
//! through the `Executor`/`Releaser` traits and a thin `darkfactoryd` binary
//! entrypoint; a real deployment supplies richer implementations of those
//! on top of this library.

pub mod config;
pub mod constants;
pub mod engine;
pub mod executor;
pub mod lock;
pub mod logger;
pub mod processor;
pub mod prompt;
pub mod releaser;
pub mod status;
pub mod watcher;

pub use config::{EngineConfig, FileConfig, WorkflowKind};
pub use engine::Engine;
pub use executor::{CommandExecutor, Executor as ExecutorTrait};
pub use lock::InstanceLock;
pub use processor::Processor;
pub use prompt::{Frontmatter, Prompt, PromptStore, Status};
pub use releaser::{GitReleaser, PrReleaser, Releaser as ReleaserTrait};
pub use status::{NullStatusServer, StatusServer};
