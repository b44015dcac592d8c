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

//! The sandboxed execution contract. The processor consumes this trait
//! without knowledge of what actually runs a prompt body — a container
//! runtime in production, a recording stub in tests.

use anyhow::{Context, Result};
use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// `Execute(ctx, promptBody, logPath, containerName) -> error`.
///
/// Implementations must pass `body` via a file mount rather than an
/// environment variable or inline shell argument, so a body containing
/// `---`, backticks, or quotes never needs escaping.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        body: &str,
        log_path: &Path,
        container_name: &str,
        shutdown: &Arc<AtomicBool>,
    ) -> Result<()>;
}

/// Runs `container_image` against a prompt body mounted as a file, streaming
/// the union of stdout/stderr into `log_path` (truncated first).
pub struct CommandExecutor {
    container_image: String,
}

impl CommandExecutor {
    pub fn new(container_image: impl Into<String>) -> Self {
        Self {
            container_image: container_image.into(),
        }
    }
}

impl Executor for CommandExecutor {
    fn execute(
        &self,
        body: &str,
        log_path: &Path,
        container_name: &str,
        shutdown: &Arc<AtomicBool>,
    ) -> Result<()> {
        let body_file = tempfile::NamedTempFile::new()
            .context("failed to create temp file for prompt body")?;
        {
            let mut f = body_file.as_file();
            f.write_all(body.as_bytes())
                .context("failed to write prompt body to temp file")?;
            f.flush().ok();
        }

        let log_file = std::fs::File::create(log_path)
            .with_context(|| format!("failed to create log file {}", log_path.display()))?;
        let log_file_err = log_file
            .try_clone()
            .context("failed to duplicate log file handle for stderr")?;

        let mut child = Command::new("docker")
            .arg("run")
            .arg("--rm")
            .arg("--name")
            .arg(container_name)
            .arg("-v")
            .arg(format!("{}:/prompt.md:ro", body_file.path().display()))
            .arg(&self.container_image)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_err))
            .spawn()
            .with_context(|| format!("failed to spawn container {}", container_name))?;

        loop {
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                anyhow::bail!(
                    "container {} exited with {}",
                    container_name,
                    status
                );
            }
            if shutdown.load(Ordering::Relaxed) {
                let _ = Command::new("docker")
                    .arg("kill")
                    .arg(container_name)
                    .status();
                let _ = child.wait();
                anyhow::bail!("container {} terminated by shutdown", container_name);
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records invocations without touching a container runtime, the
    /// mock referenced by spec.md's Executor/Releaser testability note.
    pub struct RecordingExecutor {
        pub calls: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingExecutor {
        pub fn new(fail: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    impl Executor for RecordingExecutor {
        fn execute(
            &self,
            body: &str,
            _log_path: &Path,
            container_name: &str,
            _shutdown: &Arc<AtomicBool>,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", container_name, body));
            if self.fail {
                anyhow::bail!("simulated execution failure");
            }
            Ok(())
        }
    }

    #[test]
    fn recording_executor_captures_body_and_container() {
        let exec = RecordingExecutor::new(false);
        let shutdown = Arc::new(AtomicBool::new(false));
        exec.execute("do the thing", Path::new("/tmp/x.log"), "darkfactory-001-a", &shutdown)
            .unwrap();
        assert_eq!(exec.calls.lock().unwrap()[0], "darkfactory-001-a:do the thing");
    }
}
