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

//! Prompt attributes and the frontmatter struct materializing them on disk.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// `NNN-slug.md`, the canonical post-normalization filename shape.
pub static CANONICAL_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3})-([a-z0-9-]+)\.md$").unwrap());

/// Lifecycle status of a prompt, materialized as the `status` frontmatter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Queued,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Queued => "queued",
            Status::Executing => "executing",
            Status::Completed => "completed",
            Status::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queued" => Ok(Status::Queued),
            "executing" => Ok(Status::Executing),
            "completed" => Ok(Status::Completed),
            "failed" => Ok(Status::Failed),
            other => Err(format!("Invalid prompt status: {}", other)),
        }
    }
}

/// The leading YAML frontmatter block of a prompt file.
///
/// All fields are optional: a prompt with no frontmatter block parses to
/// `Frontmatter::default()`, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    pub status: Option<Status>,
    pub container: Option<String>,
    pub started: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub version: Option<String>,
}

/// A single renumbering performed by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub old: PathBuf,
    pub new: PathBuf,
}

/// A prompt identified by its absolute path, with its number/slug parsed
/// out of the filename (if the filename is canonical).
#[derive(Debug, Clone)]
pub struct Prompt {
    pub path: PathBuf,
}

impl Prompt {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// The canonical `NNN` prefix, if the filename matches `^\d{3}-[a-z0-9-]+\.md$`.
    pub fn number(&self) -> Option<u32> {
        CANONICAL_NAME_PATTERN
            .captures(&self.file_name())
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    }

    /// The slug portion of a canonical filename, or the whole stem otherwise.
    pub fn slug(&self) -> String {
        CANONICAL_NAME_PATTERN
            .captures(&self.file_name())
            .and_then(|c| c.get(2))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| self.stem())
    }

    /// Does the filename match the canonical post-normalization grammar?
    pub fn is_canonical(&self) -> bool {
        CANONICAL_NAME_PATTERN.is_match(&self.file_name())
    }

    /// The container identifier used for a fresh execution of this prompt.
    pub fn default_container_name(&self) -> String {
        format!("darkfactory-{}", self.stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display_and_from_str() {
        for s in [
            Status::Queued,
            Status::Executing,
            Status::Completed,
            Status::Failed,
        ] {
            let rendered = s.to_string();
            assert_eq!(rendered.parse::<Status>().unwrap(), s);
        }
    }

    #[test]
    fn status_from_str_rejects_unknown() {
        assert!("bogus".parse::<Status>().is_err());
    }

    #[test]
    fn number_and_slug_from_canonical_name() {
        let p = Prompt::new(PathBuf::from("/q/012-add-health-check.md"));
        assert_eq!(p.number(), Some(12));
        assert_eq!(p.slug(), "add-health-check");
        assert!(p.is_canonical());
    }

    #[test]
    fn number_is_none_for_un_numbered_draft() {
        let p = Prompt::new(PathBuf::from("/inbox/my task.md"));
        assert_eq!(p.number(), None);
        assert!(!p.is_canonical());
    }

    #[test]
    fn container_name_uses_stem() {
        let p = Prompt::new(PathBuf::from("/q/004-b.md"));
        assert_eq!(p.default_container_name(), "darkfactory-004-b");
    }
}
