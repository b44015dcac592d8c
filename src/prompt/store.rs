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

//! The prompt queue and completed archive: every read/write of prompt state
//! goes through here so the filesystem's own rename semantics stay the sole
//! source of truth for what's queued, executing, or done.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::frontmatter;
use super::model::{Frontmatter, Prompt, Status};

/// Owns the three directories that together hold a project's prompt state.
/// The inbox is intentionally absent: per invariant 4, the store never
/// reads, renames, or writes inbox files.
#[derive(Debug, Clone)]
pub struct PromptStore {
    queue_dir: PathBuf,
    completed_dir: PathBuf,
    log_dir: PathBuf,
}

impl PromptStore {
    pub fn new(queue_dir: PathBuf, completed_dir: PathBuf, log_dir: PathBuf) -> Self {
        Self {
            queue_dir,
            completed_dir,
            log_dir,
        }
    }

    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    pub fn completed_dir(&self) -> &Path {
        &self.completed_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Ensure the queue, completed, and log directories exist.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.queue_dir, &self.completed_dir, &self.log_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    fn list_md_files(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to read directory {}", dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "md") {
                out.push(path);
            }
        }
        out.sort();
        Ok(out)
    }

    pub fn queued_paths(&self) -> Result<Vec<PathBuf>> {
        Self::list_md_files(&self.queue_dir)
    }

    pub fn completed_paths(&self) -> Result<Vec<PathBuf>> {
        Self::list_md_files(&self.completed_dir)
    }

    /// `ReadFrontmatter(path)`.
    pub fn read_frontmatter(&self, path: &Path) -> Result<Frontmatter> {
        frontmatter::read_frontmatter(path)
    }

    pub fn set_status(&self, path: &Path, status: Status) -> Result<()> {
        frontmatter::set_status(path, status)
    }

    pub fn set_container(&self, path: &Path, container: &str) -> Result<()> {
        frontmatter::set_container(path, container)
    }

    pub fn set_started_now(&self, path: &Path) -> Result<()> {
        frontmatter::set_started_now(path)
    }

    pub fn set_completed_now(&self, path: &Path) -> Result<()> {
        frontmatter::set_completed_now(path)
    }

    pub fn set_version(&self, path: &Path, version: &str) -> Result<()> {
        frontmatter::set_version(path, version)
    }

    /// `Title(path)`.
    pub fn title(&self, path: &Path) -> Result<String> {
        let (_, body) = frontmatter::read(path)?;
        Ok(frontmatter::title(path, &body))
    }

    /// `Body(path)`.
    pub fn body(&self, path: &Path) -> Result<String> {
        let (_, body) = frontmatter::read(path)?;
        Ok(body)
    }

    /// `ListQueued()`: all prompts in the queue directory, regardless of status.
    pub fn list_queued(&self) -> Result<Vec<Prompt>> {
        Ok(self
            .queued_paths()?
            .into_iter()
            .map(Prompt::new)
            .collect())
    }

    /// `ListByStatus(s)`: queued-directory prompts whose frontmatter status
    /// matches `s`. A prompt with no status field never matches.
    pub fn list_by_status(&self, status: Status) -> Result<Vec<Prompt>> {
        let mut out = Vec::new();
        for path in self.queued_paths()? {
            let fm = self.read_frontmatter(&path)?;
            if fm.status == Some(status) {
                out.push(Prompt::new(path));
            }
        }
        Ok(out)
    }

    /// `HasExecuting()`: is any queue prompt currently mid-flight?
    pub fn has_executing(&self) -> Result<bool> {
        Ok(!self.list_by_status(Status::Executing)?.is_empty())
    }

    /// `AllPreviousCompleted(n)`: have all canonically-numbered prompts with
    /// number strictly less than `n` already reached the completed directory?
    /// Un-numbered or badly-prefixed files never block this check.
    pub fn all_previous_completed(&self, n: u32) -> Result<bool> {
        for path in self.queued_paths()? {
            let prompt = Prompt::new(path);
            if let Some(num) = prompt.number() {
                if num < n {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// `NextAvailableNumber()`: smallest positive integer not already used by
    /// a canonically-named file in `queue ∪ completed`. Errors once every
    /// number up to the 999 ceiling the filename grammar can encode is taken.
    pub fn next_available_number(&self) -> Result<u32> {
        let used = self.used_numbers()?;
        let mut candidate = 1u32;
        while used.contains(&candidate) {
            candidate += 1;
            if candidate > crate::constants::MAX_PROMPT_NUMBER {
                bail!("no available prompt numbers remain (999 limit reached)");
            }
        }
        Ok(candidate)
    }

    fn used_numbers(&self) -> Result<std::collections::BTreeSet<u32>> {
        let mut used = std::collections::BTreeSet::new();
        for path in self
            .queued_paths()?
            .into_iter()
            .chain(self.completed_paths()?)
        {
            if let Some(n) = Prompt::new(path).number() {
                used.insert(n);
            }
        }
        Ok(used)
    }

    /// `MoveToCompleted(path)`: stamp `completed` status/timestamp, then
    /// atomically rename into the completed directory. Renaming (rather than
    /// copy+delete) is what keeps this a single atomic operation and lets a
    /// VCS-aware releaser follow the move as a rename in its own history.
    pub fn move_to_completed(&self, path: &Path) -> Result<PathBuf> {
        self.set_status(path, Status::Completed)?;
        self.set_completed_now(path)?;

        let file_name = path
            .file_name()
            .with_context(|| format!("prompt path has no file name: {}", path.display()))?;
        let dest = self.completed_dir.join(file_name);
        fs::rename(path, &dest).with_context(|| {
            format!(
                "failed to move {} to {}",
                path.display(),
                dest.display()
            )
        })?;
        Ok(dest)
    }

    /// Reset a `failed` or stuck `executing` prompt back to `queued`, used by
    /// the crash-recovery sweep and by human-initiated resets.
    pub fn reset_to_queued(&self, path: &Path) -> Result<()> {
        self.set_status(path, Status::Queued)
    }

    /// Move a raw markdown file from the inbox into the queue directory,
    /// taking engine ownership of it. The inbox file itself is never
    /// modified beforehand; only the queue-side copy is touched from here on.
    pub fn adopt_from_inbox(&self, inbox_path: &Path) -> Result<PathBuf> {
        let file_name = inbox_path.file_name().with_context(|| {
            format!("inbox path has no file name: {}", inbox_path.display())
        })?;
        let dest = self.queue_dir.join(file_name);
        if dest.exists() {
            bail!(
                "refusing to adopt {}: a file named {} already exists in the queue",
                inbox_path.display(),
                dest.display()
            );
        }
        fs::rename(inbox_path, &dest).with_context(|| {
            format!(
                "failed to move {} into queue at {}",
                inbox_path.display(),
                dest.display()
            )
        })?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, PromptStore) {
        let dir = TempDir::new().unwrap();
        let store = PromptStore::new(
            dir.path().join("queue"),
            dir.path().join("completed"),
            dir.path().join("logs"),
        );
        store.ensure_directories().unwrap();
        (dir, store)
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn next_available_number_fills_gaps() {
        let (_tmp, store) = store();
        write(store.queue_dir(), "001-a.md", "---\nstatus: queued\n---\n");
        write(store.queue_dir(), "003-c.md", "---\nstatus: queued\n---\n");
        write(
            store.completed_dir(),
            "002-b.md",
            "---\nstatus: completed\n---\n",
        );
        assert_eq!(store.next_available_number().unwrap(), 4);
    }

    #[test]
    fn has_executing_reflects_frontmatter() {
        let (_tmp, store) = store();
        assert!(!store.has_executing().unwrap());
        write(
            store.queue_dir(),
            "001-a.md",
            "---\nstatus: executing\n---\n",
        );
        assert!(store.has_executing().unwrap());
    }

    #[test]
    fn all_previous_completed_ignores_un_numbered_drafts() {
        let (_tmp, store) = store();
        write(store.queue_dir(), "005-e.md", "---\nstatus: queued\n---\n");
        write(store.queue_dir(), "notes.md", "no frontmatter\n");
        assert!(store.all_previous_completed(5).unwrap());
        write(store.queue_dir(), "002-b.md", "---\nstatus: queued\n---\n");
        assert!(!store.all_previous_completed(5).unwrap());
    }

    #[test]
    fn move_to_completed_stamps_and_renames() {
        let (_tmp, store) = store();
        let path = write(store.queue_dir(), "001-a.md", "---\nstatus: executing\n---\nbody\n");
        let dest = store.move_to_completed(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(dest, store.completed_dir().join("001-a.md"));
        let fm = store.read_frontmatter(&dest).unwrap();
        assert_eq!(fm.status, Some(Status::Completed));
        assert!(fm.completed.is_some());
    }

    #[test]
    fn adopt_from_inbox_refuses_name_collision() {
        let (tmp, store) = store();
        let inbox = tmp.path().join("inbox");
        fs::create_dir_all(&inbox).unwrap();
        let inbox_file = write(&inbox, "task.md", "# Task\n");
        write(store.queue_dir(), "task.md", "already here\n");
        assert!(store.adopt_from_inbox(&inbox_file).is_err());
        assert!(inbox_file.exists());
    }

    #[test]
    fn list_by_status_filters_correctly() {
        let (_tmp, store) = store();
        write(store.queue_dir(), "001-a.md", "---\nstatus: queued\n---\n");
        write(store.queue_dir(), "002-b.md", "---\nstatus: failed\n---\n");
        let queued = store.list_by_status(Status::Queued).unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].file_name(), "001-a.md");
    }
}
