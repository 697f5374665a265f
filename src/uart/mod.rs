pub mod traits;

#[cfg(feature = "embedded")]
pub mod esp;

pub use traits::{Parity, StopBits, StopReason, UartConfig, UartError, UartEvent, UartTransport};
