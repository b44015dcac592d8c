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

//! Post-execution version control: the commit/tag/push sequence (direct
//! workflow) or the branch/PR sequence (pr workflow) that follows a
//! successfully executed prompt.

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

/// Hand-rolled semver triple, ordered numerically rather than
/// lexicographically so `v0.10.0 > v0.9.0`. Non-semver tags never parse and
/// are ignored by `LatestVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemVer {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemVer {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn bump(self, kind: BumpKind) -> Self {
        match kind {
            BumpKind::Minor => SemVer::new(self.major, self.minor + 1, 0),
            BumpKind::Patch => SemVer::new(self.major, self.minor, self.patch + 1),
        }
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemVer {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix('v').unwrap_or(s);
        let mut parts = s.split('.');
        let major = parts.next().ok_or(())?.parse().map_err(|_| ())?;
        let minor = parts.next().ok_or(())?.parse().map_err(|_| ())?;
        let patch = parts.next().ok_or(())?.parse().map_err(|_| ())?;
        if parts.next().is_some() {
            return Err(());
        }
        Ok(SemVer::new(major, minor, patch))
    }
}

/// Keyword-based bump classification. Never `Major` — spec.md explicitly
/// rules out an automatic major bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpKind {
    Minor,
    Patch,
}

const MINOR_KEYWORDS: &[&str] = &["add", "implement", "new", "support", "feature"];

/// Classify a prompt title into a bump kind by case-insensitive keyword match.
pub fn classify_bump(title: &str) -> BumpKind {
    let lowered = title.to_lowercase();
    if MINOR_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        BumpKind::Minor
    } else {
        BumpKind::Patch
    }
}

/// The release workflow selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Direct,
    Pr,
}

/// Operations the processor consumes after a successful execution.
///
/// `branch_slug` is only meaningful to the `pr` workflow driver (it names
/// the `darkfactory/<branch_slug>` feature branch); the direct driver
/// ignores it.
pub trait Releaser: Send + Sync {
    fn has_changelog(&self) -> Result<bool>;
    fn commit_all(&self, message: &str) -> Result<()>;
    fn latest_version(&self) -> Result<Option<SemVer>>;
    fn bump_and_release(&self, title: &str, branch_slug: &str, bump: BumpKind) -> Result<SemVer>;
}

/// Shells out to `git` for everything, matching `audit.rs`'s
/// `Command::new("git")...status()` idiom: check `success()`, surface a
/// warning-grade context rather than propagating every git quirk as fatal.
pub struct GitReleaser {
    repo_root: std::path::PathBuf,
    changelog_path: std::path::PathBuf,
}

impl GitReleaser {
    pub fn new(repo_root: impl Into<std::path::PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let changelog_path = repo_root.join("CHANGELOG.md");
        Self {
            repo_root,
            changelog_path,
        }
    }

    fn git(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new("git")
            .current_dir(&self.repo_root)
            .args(args)
            .output()
            .with_context(|| format!("failed to run git {}", args.join(" ")))
    }

    fn git_checked(&self, args: &[&str]) -> Result<()> {
        let output = self.git(args)?;
        if !output.status.success() {
            anyhow::bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }

    fn list_tags(&self) -> Result<Vec<SemVer>> {
        let output = self.git(&["tag", "--list", "v*"])?;
        if !output.status.success() {
            anyhow::bail!(
                "git tag --list failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        let tags = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.trim().parse::<SemVer>().ok())
            .collect();
        Ok(tags)
    }

    fn append_changelog_entry(&self, version: SemVer, title: &str) -> Result<()> {
        let mut existing = std::fs::read_to_string(&self.changelog_path).unwrap_or_default();
        let entry = format!("## {}\n\n- {}\n\n", version, title);
        existing.insert_str(0, &entry);
        std::fs::write(&self.changelog_path, existing).with_context(|| {
            format!(
                "failed to write changelog at {}",
                self.changelog_path.display()
            )
        })?;
        Ok(())
    }
}

impl Releaser for GitReleaser {
    fn has_changelog(&self) -> Result<bool> {
        Ok(self.changelog_path.exists())
    }

    fn commit_all(&self, message: &str) -> Result<()> {
        self.git_checked(&["add", "-A"])?;
        let status_output = self.git(&["status", "--porcelain"])?;
        if String::from_utf8_lossy(&status_output.stdout).trim().is_empty() {
            return Ok(());
        }
        self.git_checked(&["commit", "-m", message])
    }

    fn latest_version(&self) -> Result<Option<SemVer>> {
        Ok(self.list_tags()?.into_iter().max())
    }

    fn bump_and_release(&self, title: &str, _branch_slug: &str, bump: BumpKind) -> Result<SemVer> {
        let current = self.latest_version()?.unwrap_or(SemVer::new(0, 0, 0));
        let next = if current == SemVer::new(0, 0, 0) && self.list_tags()?.is_empty() {
            SemVer::new(0, 1, 0)
        } else {
            current.bump(bump)
        };

        self.append_changelog_entry(next, title)?;
        self.commit_all(&format!("Release {}: {}", next, title))?;
        self.git_checked(&["tag", &next.to_string()])?;
        self.git_checked(&["push", "origin", "HEAD"])?;
        self.git_checked(&["push", "origin", &next.to_string()])?;
        Ok(next)
    }
}

/// Branch/PR workflow driver: record current branch, create
/// `darkfactory/NNN-slug`, commit, push, open a pull request via an
/// external tool, restore the original branch. On PR-creation failure the
/// feature branch is left in place for human recovery rather than cleaned
/// up, per spec.md.
pub struct PrReleaser {
    repo_root: std::path::PathBuf,
}

impl PrReleaser {
    pub fn new(repo_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new("git")
            .current_dir(&self.repo_root)
            .args(args)
            .output()
            .with_context(|| format!("failed to run git {}", args.join(" ")))
    }

    fn current_branch(&self) -> Result<String> {
        let output = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Releaser for PrReleaser {
    fn has_changelog(&self) -> Result<bool> {
        Ok(self.repo_root.join("CHANGELOG.md").exists())
    }

    fn commit_all(&self, message: &str) -> Result<()> {
        let output = self.git(&["add", "-A"])?;
        if !output.status.success() {
            anyhow::bail!("git add failed");
        }
        let output = self.git(&["commit", "-m", message])?;
        if !output.status.success() {
            anyhow::bail!("git commit failed");
        }
        Ok(())
    }

    fn latest_version(&self) -> Result<Option<SemVer>> {
        Ok(None)
    }

    fn bump_and_release(&self, title: &str, branch_slug: &str, _bump: BumpKind) -> Result<SemVer> {
        let original_branch = self.current_branch()?;
        let feature_branch = format!("darkfactory/{}", branch_slug);

        let output = self.git(&["checkout", "-b", &feature_branch])?;
        if !output.status.success() {
            anyhow::bail!(
                "failed to create branch {}: {}",
                feature_branch,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        self.commit_all(title)?;

        let push = self.git(&["push", "-u", "origin", &feature_branch])?;
        if !push.status.success() {
            anyhow::bail!(
                "failed to push {}: {}",
                feature_branch,
                String::from_utf8_lossy(&push.stderr)
            );
        }

        let pr = Command::new("gh")
            .current_dir(&self.repo_root)
            .args(["pr", "create", "--title", title, "--fill"])
            .output();

        match pr {
            Ok(output) if output.status.success() => {
                self.git(&["checkout", &original_branch])?;
                Ok(SemVer::new(0, 0, 0))
            }
            _ => {
                anyhow::bail!(
                    "pull request creation failed; working tree left on {} for manual recovery",
                    feature_branch
                )
            }
        }
    }
}

/// Derive the `darkfactory/NNN-slug` branch slug from a prompt path.
pub fn branch_slug_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
