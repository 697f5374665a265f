//! One-shot command-mode guard
//!
//! Armed once when the session starts. If no recognized command cancels it
//! before the timeout, it fires and the worker quiesces the UART. The guard
//! is never re-armed.
//!
//! ```text
//! Idle --arm--> Running --cancel--> Cancelled
//!                  |
//!                  +--expire--> Fired
//! ```

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

/// Guard lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    Running,
    Cancelled,
    Fired,
}

/// One-shot timeout guard
///
/// The guard only tracks state and raises signals. The countdown itself is
/// run by a timer that waits for [`wait_armed`] and then calls [`expire`].
///
/// [`wait_armed`]: ModeGuard::wait_armed
/// [`expire`]: ModeGuard::expire
pub struct ModeGuard<M: RawMutex> {
    state: Mutex<M, Cell<GuardState>>,
    armed: Signal<M, ()>,
    fired: Signal<M, ()>,
}

impl<M: RawMutex> ModeGuard<M> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(GuardState::Idle)),
            armed: Signal::new(),
            fired: Signal::new(),
        }
    }

    pub fn state(&self) -> GuardState {
        self.state.lock(|state| state.get())
    }

    /// Start the countdown, only from `Idle`
    pub fn arm(&self) -> bool {
        let armed = self.transition(GuardState::Idle, GuardState::Running);
        if armed {
            self.armed.signal(());
        }
        armed
    }

    /// Stop the countdown, only while `Running`
    pub fn cancel(&self) -> bool {
        self.transition(GuardState::Running, GuardState::Cancelled)
    }

    /// Countdown elapsed, fires only while `Running`
    pub fn expire(&self) -> bool {
        let fired = self.transition(GuardState::Running, GuardState::Fired);
        if fired {
            self.fired.signal(());
        }
        fired
    }

    /// Wait until the guard is armed
    pub async fn wait_armed(&self) {
        self.armed.wait().await
    }

    /// Wait until the guard fires
    pub async fn wait_fired(&self) {
        self.fired.wait().await
    }

    /// Consume a pending fire, if any
    pub fn try_take_fired(&self) -> bool {
        self.fired.try_take().is_some()
    }

    fn transition(&self, from: GuardState, to: GuardState) -> bool {
        self.state.lock(|state| {
            if state.get() == from {
                state.set(to);
                true
            } else {
                false
            }
        })
    }
}

impl<M: RawMutex> Default for ModeGuard<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    fn guard() -> ModeGuard<NoopRawMutex> {
        ModeGuard::new()
    }

    #[test]
    fn test_arm_once() {
        let guard = guard();

        assert!(guard.arm());
        assert_eq!(guard.state(), GuardState::Running);
        assert!(!guard.arm());
    }

    #[test]
    fn test_fires_at_most_once() {
        let guard = guard();
        guard.arm();

        assert!(guard.expire());
        assert!(!guard.expire());
        assert_eq!(guard.state(), GuardState::Fired);

        assert!(guard.try_take_fired());
        assert!(!guard.try_take_fired());
    }

    #[test]
    fn test_cancelled_guard_never_fires() {
        let guard = guard();
        guard.arm();

        assert!(guard.cancel());
        assert!(!guard.cancel());
        assert!(!guard.expire());
        assert!(!guard.try_take_fired());
        assert_eq!(guard.state(), GuardState::Cancelled);

        // Never re-armed
        assert!(!guard.arm());
    }

    #[test]
    fn test_unarmed_guard_ignores_expiry() {
        let guard = guard();

        assert!(!guard.expire());
        assert!(!guard.cancel());
        assert_eq!(guard.state(), GuardState::Idle);
    }

    #[test]
    fn test_wait_armed() {
        let guard = guard();
        guard.arm();

        futures::executor::block_on(guard.wait_armed());
    }
}
