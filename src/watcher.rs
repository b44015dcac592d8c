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

//! Observes the queue directory, debounces bursts of editor saves, drives
//! normalization, and wakes the processor. Never reads prompt bodies or
//! inspects statuses itself.

use anyhow::{Context, Result};
use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::time::Duration;

use crate::prompt::{normalize_filenames, PromptStore};

/// Runs the watch loop on the calling thread until `shutdown` is observed.
/// Intended to be the body of its own `std::thread::spawn` task.
pub fn run(
    store: &PromptStore,
    debounce_ms: u64,
    ready_tx: SyncSender<()>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let (event_tx, event_rx) = std::sync::mpsc::channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(
        Duration::from_millis(debounce_ms),
        None,
        move |result: DebounceEventResult| {
            let _ = event_tx.send(result);
        },
    )
    .context("failed to create filesystem watcher")?;

    debouncer
        .watch(store.queue_dir(), RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", store.queue_dir().display()))?;

    while !shutdown.load(Ordering::Relaxed) {
        match event_rx.recv_timeout(Duration::from_millis(250)) {
            Ok(Ok(events)) => {
                // CHMOD-only saves (common on macOS editors) are included in
                // the trigger set; any event at all is treated as create-ish
                // since the watcher never inspects which files changed.
                if events.is_empty() {
                    continue;
                }
                tick(store);
                let _ = ready_tx.try_send(());
            }
            Ok(Err(errors)) => {
                for err in errors {
                    eprintln!("warning: filesystem watch error: {}", err);
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}

/// One debounced tick: normalize, then signal the processor regardless of
/// whether any rename actually happened.
fn tick(store: &PromptStore) {
    if let Err(err) = normalize_filenames(store) {
        eprintln!("warning: normalization pass failed: {:#}", err);
    }
}
