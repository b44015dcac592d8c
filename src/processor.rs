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

//! Drives prompts through `queued -> executing -> completed|failed`, one at
//! a time. The sole writer of `executing` and `completed` transitions; the
//! pass-at-most-one discipline is what keeps that true without a mutex.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::ENGINE_VERSION;
use crate::executor::Executor;
use crate::prompt::{Prompt, PromptStore, Status};
use crate::releaser::{branch_slug_for, classify_bump, Releaser};

pub struct Processor {
    store: PromptStore,
    executor: Arc<dyn Executor>,
    releaser: Arc<dyn Releaser>,
}

impl Processor {
    pub fn new(
        store: PromptStore,
        executor: Arc<dyn Executor>,
        releaser: Arc<dyn Releaser>,
    ) -> Self {
        Self {
            store,
            executor,
            releaser,
        }
    }

    /// The cooperative wait-then-pass loop. Intended as the body of its own
    /// `std::thread::spawn` task; returns once `shutdown` is observed.
    pub fn run(
        &self,
        ready_rx: Receiver<()>,
        tick_interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) {
        while !shutdown.load(Ordering::Relaxed) {
            match ready_rx.recv_timeout(tick_interval) {
                Ok(()) | Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            if let Err(err) = self.run_pass(&shutdown) {
                eprintln!("warning: processor pass failed: {:#}", err);
            }
        }
    }

    /// Selects at most one queued prompt and fully drives it through
    /// validate -> execute -> release -> archive before returning. Always
    /// re-scans disk rather than trusting the ready signal's identity.
    pub fn run_pass(&self, shutdown: &Arc<AtomicBool>) -> Result<()> {
        let mut queued = self.store.list_by_status(Status::Queued)?;
        queued.sort_by_key(|p| p.number().unwrap_or(u32::MAX));

        for prompt in &queued {
            match self.validate(prompt)? {
                Some(reason) => {
                    eprintln!(
                        "skipping {}: {}",
                        prompt.file_name(),
                        reason
                    );
                    continue;
                }
                None => {
                    self.process_one(prompt, shutdown)?;
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// `None` means the prompt is eligible to run now; `Some(reason)` names
    /// why it was skipped this pass.
    fn validate(&self, prompt: &Prompt) -> Result<Option<String>> {
        if !prompt.is_canonical() {
            return Ok(Some("filename is not in canonical NNN-slug.md form".to_string()));
        }
        let fm = self.store.read_frontmatter(&prompt.path)?;
        if fm.status != Some(Status::Queued) {
            return Ok(Some(format!("status is {:?}, not queued", fm.status)));
        }
        if self.store.has_executing()? {
            return Ok(Some("another prompt is already executing".to_string()));
        }
        let number = prompt.number().unwrap_or(u32::MAX);
        if !self.store.all_previous_completed(number)? {
            return Ok(Some("a predecessor has not yet completed".to_string()));
        }
        Ok(None)
    }

    fn process_one(&self, prompt: &Prompt, shutdown: &Arc<AtomicBool>) -> Result<()> {
        let body = self.store.body(&prompt.path)?;

        if body.trim().is_empty() {
            self.store.move_to_completed(&prompt.path)?;
            return Ok(());
        }

        let container = prompt.default_container_name();
        self.store.set_container(&prompt.path, &container)?;
        self.store.set_started_now(&prompt.path)?;
        self.store.set_version(&prompt.path, ENGINE_VERSION)?;
        self.store.set_status(&prompt.path, Status::Executing)?;

        let log_path = self.store.log_dir().join(format!("{}.log", prompt.stem()));

        if let Err(err) = self.executor.execute(&body, &log_path, &container, shutdown) {
            eprintln!("execution failed for {}: {:#}", prompt.file_name(), err);
            self.store.set_status(&prompt.path, Status::Failed)?;
            return Ok(());
        }

        // Release: not interruptible by `shutdown` between here and
        // archival, so a SIGINT mid-release cannot leave a half-done state.
        if let Err(err) = self.release(prompt) {
            eprintln!("release failed for {}: {:#}", prompt.file_name(), err);
            self.store.set_status(&prompt.path, Status::Failed)?;
            return Ok(());
        }

        self.store.move_to_completed(&prompt.path)?;
        Ok(())
    }

    fn release(&self, prompt: &Prompt) -> Result<()> {
        let title = self.store.title(&prompt.path)?;
        let bump = classify_bump(&title);
        let slug = branch_slug_for(&prompt.path);
        self.releaser.bump_and_release(&title, &slug, bump)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::releaser::SemVer;
    use std::fs;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StubExecutor {
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl Executor for StubExecutor {
        fn execute(
            &self,
            _body: &str,
            _log_path: &std::path::Path,
            container_name: &str,
            _shutdown: &Arc<AtomicBool>,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(container_name.to_string());
            if self.fail {
                anyhow::bail!("stub execution failure");
            }
            Ok(())
        }
    }

    struct StubReleaser {
        fail: bool,
    }

    impl Releaser for StubReleaser {
        fn has_changelog(&self) -> Result<bool> {
            Ok(true)
        }
        fn commit_all(&self, _message: &str) -> Result<()> {
            Ok(())
        }
        fn latest_version(&self) -> Result<Option<SemVer>> {
            Ok(Some(SemVer::new(0, 1, 0)))
        }
        fn bump_and_release(&self, _title: &str, _branch_slug: &str, _bump: crate::releaser::BumpKind) -> Result<SemVer> {
            if self.fail {
                anyhow::bail!("stub release failure");
            }
            Ok(SemVer::new(0, 2, 0))
        }
    }

    fn processor(exec_fail: bool, release_fail: bool) -> (TempDir, Processor) {
        let dir = TempDir::new().unwrap();
        let store = PromptStore::new(
            dir.path().join("queue"),
            dir.path().join("completed"),
            dir.path().join("logs"),
        );
        store.ensure_directories().unwrap();
        let executor = Arc::new(StubExecutor {
            fail: exec_fail,
            calls: Mutex::new(Vec::new()),
        });
        let releaser = Arc::new(StubReleaser { fail: release_fail });
        (dir, Processor::new(store, executor, releaser))
    }

    #[test]
    fn picks_lowest_number_first() {
        let (dir, proc) = processor(false, false);
        fs::write(
            dir.path().join("queue/005-a.md"),
            "---\nstatus: queued\n---\n# Do A\ntask\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("queue/004-b.md"),
            "---\nstatus: queued\n---\n# Do B\ntask\n",
        )
        .unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        proc.run_pass(&shutdown).unwrap();
        assert!(dir.path().join("completed/004-b.md").exists());
        assert!(!dir.path().join("completed/005-a.md").exists());
    }

    #[test]
    fn empty_body_skips_execution_and_completes() {
        let (dir, proc) = processor(false, false);
        fs::write(dir.path().join("queue/001-empty.md"), "---\nstatus: queued\n---\n   \n").unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        proc.run_pass(&shutdown).unwrap();
        assert!(dir.path().join("completed/001-empty.md").exists());
    }

    #[test]
    fn execution_failure_marks_failed_and_blocks_successors() {
        let (dir, proc) = processor(true, false);
        fs::write(
            dir.path().join("queue/001-a.md"),
            "---\nstatus: queued\n---\n# Task\nbody\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("queue/002-b.md"),
            "---\nstatus: queued\n---\n# Task\nbody\n",
        )
        .unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        proc.run_pass(&shutdown).unwrap();
        let fm = proc
            .store
            .read_frontmatter(&dir.path().join("queue/001-a.md"))
            .unwrap();
        assert_eq!(fm.status, Some(Status::Failed));

        proc.run_pass(&shutdown).unwrap();
        assert!(dir.path().join("queue/002-b.md").exists());
    }

    #[test]
    fn release_failure_marks_failed_not_completed() {
        let (dir, proc) = processor(false, true);
        fs::write(
            dir.path().join("queue/001-a.md"),
            "---\nstatus: queued\n---\n# Task\nbody\n",
        )
        .unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        proc.run_pass(&shutdown).unwrap();
        let fm = proc
            .store
            .read_frontmatter(&dir.path().join("queue/001-a.md"))
            .unwrap();
        assert_eq!(fm.status, Some(Status::Failed));
    }

    #[test]
    fn has_executing_blocks_selection() {
        let (dir, proc) = processor(false, false);
        fs::write(
            dir.path().join("queue/001-a.md"),
            "---\nstatus: executing\n---\n# Task\nbody\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("queue/002-b.md"),
            "---\nstatus: queued\n---\n# Task\nbody\n",
        )
        .unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        proc.run_pass(&shutdown).unwrap();
        assert!(dir.path().join("queue/002-b.md").exists());
        assert!(!dir.path().join("completed/002-b.md").exists());
    }
}
