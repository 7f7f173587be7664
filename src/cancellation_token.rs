use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// The simplest implementation of an inter-thread cancelation token possible.
#[derive(Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancelation token.  Clone it to pass it to another thread
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Flips the state of the token to canceled
    #[inline]
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Checks if the token has been canceled
    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Sleeps for `duration` in small slices, returning early with `false` if canceled
    pub fn sleep(&self, duration: Duration) -> bool {
        let slice = Duration::from_millis(10);
        let deadline = Instant::now() + duration;

        loop {
            if self.is_canceled() {
                return false;
            }

            let now = Instant::now();

            if now >= deadline {
                return true;
            }

            thread::sleep(slice.min(deadline - now));
        }
    }
}
