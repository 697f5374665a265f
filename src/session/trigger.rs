//! Deferred work token
//!
//! Raised from the callback context, consumed once by the worker. Raising
//! while a token is already pending has no further effect, so a burst of
//! raises results in a single unit of work.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

/// Single pending-work token
pub struct DispatchTrigger<M: RawMutex> {
    signal: Signal<M, ()>,
}

impl<M: RawMutex> DispatchTrigger<M> {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Mark work as pending
    pub fn raise(&self) {
        self.signal.signal(());
    }

    /// Returns true if work is pending
    pub fn is_pending(&self) -> bool {
        self.signal.signaled()
    }

    /// Consume the token if pending
    pub fn try_take(&self) -> bool {
        self.signal.try_take().is_some()
    }

    /// Wait for the token and consume it
    pub async fn wait(&self) {
        self.signal.wait().await
    }
}

impl<M: RawMutex> Default for DispatchTrigger<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_raise_is_idempotent() {
        let trigger: DispatchTrigger<NoopRawMutex> = DispatchTrigger::new();

        trigger.raise();
        trigger.raise();
        assert!(trigger.is_pending());

        assert!(trigger.try_take());
        assert!(!trigger.try_take());
    }

    #[test]
    fn test_wait_consumes() {
        let trigger: DispatchTrigger<NoopRawMutex> = DispatchTrigger::new();
        trigger.raise();

        futures::executor::block_on(trigger.wait());
        assert!(!trigger.is_pending());
    }
}
