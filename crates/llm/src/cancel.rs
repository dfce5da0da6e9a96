use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation shared between a signal handler and the decode loop.
///
/// Clones observe the same flag. The loop polls it before every step. The
/// flag also records whether a generation is in flight, so a handler can tell
/// "abort this reply" apart from "leave the program".
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Re-arms the flag before the next generation.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Re-arms the flag and marks a generation as running.
    pub fn begin(&self) {
        self.reset();
        self.in_flight.store(true, Ordering::SeqCst);
    }

    pub fn finish(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Cancels the running generation. Returns `false`, leaving the flag
    /// untouched, when nothing is in flight.
    pub fn interrupt(&self) -> bool {
        if !self.is_in_flight() {
            return false;
        }
        self.cancel();
        true
    }
}
