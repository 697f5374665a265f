use crate::uart::UartError;

/// Errors that stop the AT session from starting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtHostError {
    /// The UART line did not become valid in time
    DeviceNotReady,
    /// Event delivery could not be set up
    CallbackFailed(UartError),
    /// Reception could not be enabled
    RxEnable(UartError),
    /// Line configuration rejected
    Configure(UartError),
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started
    Idle,
    /// Receiving a line
    Armed,
    /// Line complete, reception off, waiting for the worker
    LineReady,
    /// Worker is executing the line
    Dispatching,
    /// Reception stopped on a line error, waiting for the restart
    ErrorRecovering,
    /// Command mode ended, UART suspended
    Disabled,
}
