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

//! The read-only HTTP status surface's lifecycle slot. Route handlers
//! (`/health`, `/api/v1/status`, `/api/v1/queue`, ...) are outside CORE
//! scope; this trait exists only so `Engine::run` has a real join point for
//! a future concrete server instead of special-casing "no server" inline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub trait StatusServer: Send + Sync {
    /// Bind to loopback on `port` and serve until `shutdown` is observed.
    fn run(&self, port: u16, shutdown: Arc<AtomicBool>);
}

/// The default, fully-exercised path: `serverPort: 0` disables the status
/// surface and this server does nothing but wait for shutdown.
pub struct NullStatusServer;

impl StatusServer for NullStatusServer {
    fn run(&self, _port: u16, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(200));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_status_server_returns_on_shutdown() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || {
            NullStatusServer.run(0, shutdown_clone);
        });
        std::thread::sleep(Duration::from_millis(50));
        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }
}
