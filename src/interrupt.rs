// Ctrl-C handling. A `ctrlc` handler raises a shared flag that the download
// loop checks between chunks, so an interrupted transfer cleans up its
// partial file and the command loop can say goodbye.
//
// The flag alone is not enough when nothing is there to see it: a prompt
// blocked on piped stdin, or a transfer stalled inside `read`. The handler
// covers those itself: with no download registered it exits right away, and
// when a registered download does not stop within `GRACE` it removes the
// partial file before exiting.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

pub const FAREWELL: &str = "\n\nInterrupted. Goodbye!";

const GRACE: Duration = Duration::from_millis(750);
const POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Default)]
struct Shared {
    triggered: AtomicBool,
    active: Mutex<Option<PathBuf>>,
}

/// Cloneable handle on the interrupt state.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    shared: Arc<Shared>,
}

impl Interrupt {
    /// Register the process-wide Ctrl-C handler. Call once from `main`.
    pub fn install() -> Result<Self> {
        let interrupt = Interrupt::default();
        let handler = interrupt.clone();
        ctrlc::set_handler(move || handler.on_signal())
            .map_err(|e| anyhow::anyhow!("Failed to install Ctrl-C handler: {}", e))?;
        Ok(interrupt)
    }

    pub fn trigger(&self) {
        self.shared.triggered.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.shared.triggered.load(Ordering::SeqCst)
    }

    /// Mark `part` as the file being written until [`finish`](Self::finish).
    pub fn begin(&self, part: &Path) {
        *self.active() = Some(part.to_path_buf());
    }

    pub fn finish(&self) {
        *self.active() = None;
    }

    fn active(&self) -> MutexGuard<'_, Option<PathBuf>> {
        self.shared
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs on the handler thread.
    fn on_signal(&self) {
        self.trigger();
        if self.active().is_none() {
            leave();
        }

        let deadline = Instant::now() + GRACE;
        while Instant::now() < deadline {
            if self.active().is_none() {
                // The download loop stopped and owns the goodbye.
                return;
            }
            thread::sleep(POLL);
        }

        if let Some(part) = self.active().take() {
            debug!(path = %part.display(), "removing partial file after stalled interrupt");
            let _ = std::fs::remove_file(part);
        }
        leave();
    }
}

fn leave() -> ! {
    println!("{}", FAREWELL);
    std::process::exit(0);
}
