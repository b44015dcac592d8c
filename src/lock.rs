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

//! Single-instance advisory lock on `<projectRoot>/.dark-factory.lock`.
//!
//! Unlike `gimme::checkout::FileLock`, which blocks with a retry loop to win
//! a short critical section, this lock is acquired once at daemon startup
//! with no retry: a second instance should fail fast and name the PID
//! already holding the lock.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::constants::LOCK_FILE_NAME;

/// Held for the lifetime of a running engine. Dropping it releases the OS
/// lock and removes the lock file; a crash releases the OS lock at the
/// kernel level but can leave a stale file behind, which the next
/// `acquire` call is still able to lock (an flock doesn't survive its
/// holder's death, only the file does).
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Attempt to acquire the lock at `project_root/.dark-factory.lock`.
    /// On success the current PID is written into the file. On failure,
    /// returns an error naming the PID already holding it, if readable.
    pub fn acquire(project_root: &Path) -> Result<Self> {
        let path = project_root.join(LOCK_FILE_NAME);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .open(&path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                write_pid(&file)?;
                set_owner_only_permissions(&file)?;
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                let holder = read_holder_pid(&path);
                match holder {
                    Some(pid) => anyhow::bail!(
                        "another dark-factory instance is already running (pid {})",
                        pid
                    ),
                    None => anyhow::bail!(
                        "another dark-factory instance is already running at {}",
                        path.display()
                    ),
                }
            }
            Err(e) => Err(e).with_context(|| format!("failed to lock {}", path.display())),
        }
    }
}

fn write_pid(mut file: &File) -> Result<()> {
    file.set_len(0)?;
    use std::io::Seek;
    file.seek(std::io::SeekFrom::Start(0))?;
    write!(file, "{}", std::process::id()).context("failed to write pid into lock file")?;
    file.flush().ok();
    Ok(())
}

/// `0600`: owning user read/write only, per the lock file contract.
#[cfg(unix)]
fn set_owner_only_permissions(file: &File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .context("failed to set lock file permissions")?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_file: &File) -> Result<()> {
    Ok(())
}

fn read_holder_pid(path: &Path) -> Option<u32> {
    let mut contents = String::new();
    File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = fs::remove_file(&self.path);
    }
}
