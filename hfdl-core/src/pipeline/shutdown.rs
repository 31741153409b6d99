//! Two-level cancellation (§5). `do_exit` transitions `0 -> 1 -> 2`:
//! `1` asks workers to drain pending work and exit; `2` asks them to exit
//! promptly without draining.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExitLevel {
    Running = 0,
    Graceful = 1,
    Force = 2,
}

#[derive(Debug, Default)]
pub struct ShutdownState {
    do_exit: AtomicU8,
}

impl ShutdownState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            do_exit: AtomicU8::new(ExitLevel::Running as u8),
        })
    }

    pub fn level(&self) -> ExitLevel {
        match self.do_exit.load(Ordering::SeqCst) {
            0 => ExitLevel::Running,
            1 => ExitLevel::Graceful,
            _ => ExitLevel::Force,
        }
    }

    /// Request graceful shutdown (`0 -> 1`). A no-op once already at or
    /// past `Graceful`.
    pub fn request_graceful(&self) {
        let _ = self.do_exit.compare_exchange(
            ExitLevel::Running as u8,
            ExitLevel::Graceful as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Request forced shutdown (`-> 2`), e.g. on a second interrupt signal.
    pub fn request_force(&self) {
        self.do_exit.store(ExitLevel::Force as u8, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.level() == ExitLevel::Running
    }

    pub fn should_drain(&self) -> bool {
        self.level() < ExitLevel::Force
    }
}
