use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Advisory write throttle, raised while commits are failing.
#[derive(Default)]
pub struct Throttle {
    throttled: Mutex<bool>,
    cleared: Notify,
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_throttled(&self) -> bool {
        *self.throttled.lock()
    }

    /// Set the flag; returns the previous value.
    pub fn set(&self, throttled: bool) -> bool {
        let previous = {
            let mut guard = self.throttled.lock();
            std::mem::replace(&mut *guard, throttled)
        };
        if previous && !throttled {
            self.cleared.notify_waiters();
        }
        previous
    }

    /// Wait until the flag is clear, re-checking at least every `poll`.
    /// Returns `false` if cancelled first.
    pub async fn wait_clear(&self, poll: Duration, cancel: &CancellationToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }

            // register before checking so a concurrent clear is not missed
            let notified = self.cleared.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_throttled() {
                return true;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = &mut notified => {}
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }
}
