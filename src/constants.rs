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

/// Stamped into a completed prompt's frontmatter for forensics.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Highest prompt number the filename grammar can encode (`999-slug.md`).
pub const MAX_PROMPT_NUMBER: u32 = 999;

/// Default debounce interval for the filesystem watcher, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Default periodic tick interval for the processor, in seconds.
pub const DEFAULT_PROCESSOR_TICK_SECS: u64 = 5;

/// Name of the instance lock file, relative to the project root.
pub const LOCK_FILE_NAME: &str = ".dark-factory.lock";
