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

//! Engine startup and lifecycle: lock acquisition, crash recovery, spawning
//! the watcher/processor/status-server tasks, and signal-driven shutdown.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::executor::Executor;
use crate::lock::InstanceLock;
use crate::logger::{log_message, Logger};
use crate::processor::Processor;
use crate::prompt::{normalize_filenames, PromptStore, Status};
use crate::releaser::Releaser;
use crate::status::StatusServer;
use crate::watcher;

/// Wires together the Prompt Store, Watcher, Processor, and (if configured)
/// a status server, under a single shutdown flag.
pub struct Engine {
    config: EngineConfig,
    store: PromptStore,
    executor: Arc<dyn Executor>,
    releaser: Arc<dyn Releaser>,
    status_server: Arc<dyn StatusServer>,
    logger: Mutex<Option<Logger>>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        executor: Arc<dyn Executor>,
        releaser: Arc<dyn Releaser>,
        status_server: Arc<dyn StatusServer>,
    ) -> Self {
        let store = PromptStore::new(
            config.queue_dir.clone(),
            config.completed_dir.clone(),
            config.log_dir.clone(),
        );
        Self {
            config,
            store,
            executor,
            releaser,
            status_server,
            logger: Mutex::new(None),
        }
    }

    /// Runs the full startup sequence and blocks until shutdown. Returns
    /// once every spawned task has joined.
    pub fn run(&self) -> Result<()> {
        self.store
            .ensure_directories()
            .context("failed to prepare engine directories")?;
        std::fs::create_dir_all(&self.config.inbox_dir)
            .context("failed to prepare inbox directory")?;

        // 1. Acquire the instance lock; on failure, exit with the holding PID.
        let _lock = InstanceLock::acquire(&self.config.project_root)
            .context("failed to acquire instance lock")?;

        // 2. Crash recovery sweep: executing/failed -> queued.
        self.crash_recovery_sweep()?;

        // 3. One synchronous normalization pass before anything else runs.
        normalize_filenames(&self.store).context("initial normalization failed")?;

        // 4-5. Spawn sibling tasks and install signal handlers.
        let shutdown = Arc::new(AtomicBool::new(false));
        self.install_signal_handler(Arc::clone(&shutdown))?;

        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<()>(1);

        let watcher_store = self.store.clone();
        let watcher_shutdown = Arc::clone(&shutdown);
        let watcher_debounce = self.config.debounce_ms;
        let watcher_ready_tx = ready_tx.clone();
        let watcher_handle = std::thread::spawn(move || {
            if let Err(err) = watcher::run(
                &watcher_store,
                watcher_debounce,
                watcher_ready_tx,
                watcher_shutdown,
            ) {
                eprintln!("watcher task ended with error: {:#}", err);
            }
        });

        let processor = Processor::new(
            self.store.clone(),
            Arc::clone(&self.executor),
            Arc::clone(&self.releaser),
        );
        let processor_shutdown = Arc::clone(&shutdown);
        let tick = Duration::from_secs(self.config.processor_tick_secs);
        let processor_handle = std::thread::spawn(move || {
            processor.run(ready_rx, tick, processor_shutdown);
        });

        let status_handle = if self.config.server_port != 0 {
            let server = Arc::clone(&self.status_server);
            let port = self.config.server_port;
            let status_shutdown = Arc::clone(&shutdown);
            Some(std::thread::spawn(move || {
                server.run(port, status_shutdown);
            }))
        } else {
            None
        };

        // 6. Await whichever task returns first, cancel the rest, then join
        // them all before releasing the lock. A monitor thread per task
        // joins its real handle (panic or clean return, either way) and
        // reports the name down a shared channel, so the first finisher
        // always triggers shutdown of the others — a processor panic
        // doesn't leave the watcher spinning forever, and a watcher that
        // exits early doesn't leave the processor running undetected in a
        // watcher-less degraded mode.
        let (done_tx, done_rx) = std::sync::mpsc::channel::<&'static str>();

        let watcher_done_tx = done_tx.clone();
        let watcher_monitor = std::thread::spawn(move || {
            let _ = watcher_handle.join();
            let _ = watcher_done_tx.send("watcher");
        });

        let processor_done_tx = done_tx.clone();
        let processor_monitor = std::thread::spawn(move || {
            let _ = processor_handle.join();
            let _ = processor_done_tx.send("processor");
        });

        let status_monitor = status_handle.map(|handle| {
            let status_done_tx = done_tx.clone();
            std::thread::spawn(move || {
                let _ = handle.join();
                let _ = status_done_tx.send("status server");
            })
        });
        drop(done_tx);

        if let Ok(name) = done_rx.recv() {
            eprintln!("{} task ended; shutting down the rest", name);
        }
        shutdown.store(true, Ordering::SeqCst);

        watcher_monitor
            .join()
            .map_err(|_| anyhow::anyhow!("watcher monitor panicked"))?;
        processor_monitor
            .join()
            .map_err(|_| anyhow::anyhow!("processor monitor panicked"))?;
        if let Some(handle) = status_monitor {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("status server monitor panicked"))?;
        }

        Ok(())
    }

    fn crash_recovery_sweep(&self) -> Result<()> {
        for status in [Status::Executing, Status::Failed] {
            for prompt in self.store.list_by_status(status)? {
                self.store.reset_to_queued(&prompt.path)?;
                log_message(
                    &mut self.logger.lock().unwrap(),
                    &format!(
                        "crash recovery: reset {} from {:?} to queued",
                        prompt.file_name(),
                        status
                    ),
                );
            }
        }
        Ok(())
    }

    /// First SIGINT/SIGTERM flips the shutdown flag; a second signal within
    /// five seconds force-exits, mirroring the teacher's double-press
    /// escape hatch for an unresponsive child process.
    fn install_signal_handler(&self, shutdown: Arc<AtomicBool>) -> Result<()> {
        let last_signal: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
        ctrlc::set_handler(move || {
            let now = Instant::now();
            let mut last = last_signal.lock().unwrap();
            if let Some(t) = *last {
                if now.duration_since(t) < Duration::from_secs(5) {
                    println!("\ninterrupted again, force exiting");
                    std::process::exit(1);
                }
            }
            *last = Some(now);
            shutdown.store(true, Ordering::SeqCst);
            println!("\nshutdown requested, finishing current pass (press again within 5s to force exit)");
        })
        .context("failed to install signal handler")?;
        Ok(())
    }
}
