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

//! The prompt state machine: frontmatter parsing, the queue/completed store,
//! and the filename normalizer that keeps numbering canonical.

pub mod frontmatter;
pub mod model;
pub mod normalize;
pub mod store;

pub use model::{Frontmatter, Prompt, Rename, Status};
pub use normalize::normalize_filenames;
pub use store::PromptStore;
