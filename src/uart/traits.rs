//! UART transport trait for abstraction and testability
//!
//! The transport is an asynchronous-reception UART driver. Received bytes and
//! buffer lifecycle changes are reported as [`UartEvent`]s, delivered from the
//! driver's callback context. All calls are non-blocking so they can be made
//! from that context.

use crate::config::uart;
use crate::protocol::RxBuffer;

/// Errors reported by the UART driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    /// Device not ready or line in error state
    NotReady,
    /// Reception already enabled, or another operation in progress
    Busy,
    /// Configuration not supported by the hardware
    Unsupported,
    /// Buffer refused by the driver
    InvalidBuffer,
    /// Generic driver error
    Io,
}

/// Why reception stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Overrun,
    Parity,
    Framing,
    Break,
    Collision,
}

/// Parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Stop bit setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// Line configuration applied at session start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: bool,
}

impl Default for UartConfig {
    /// 115200 8N1, no flow control
    fn default() -> Self {
        Self {
            baud_rate: uart::BAUD_RATE,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: false,
        }
    }
}

/// Events delivered by the driver
#[derive(Debug)]
pub enum UartEvent<'a> {
    /// A transmission completed
    TxDone,
    /// A transmission was aborted
    TxAborted,
    /// Bytes received into the current buffer
    RxReady(&'a [u8]),
    /// The driver needs the next receive buffer
    RxBufRequest,
    /// The driver no longer uses this buffer
    RxBufReleased(RxBuffer),
    /// Reception stopped because of a line error
    RxStopped(StopReason),
    /// Reception is fully disabled, all buffers released
    RxDisabled,
}

/// Abstract UART interface for testability
///
/// Buffers are moved into the driver. A refused buffer is handed back with
/// the error so the caller keeps ownership.
pub trait UartTransport {
    /// Check whether the line is currently valid
    fn err_check(&mut self) -> Result<(), UartError>;

    /// Route driver events to the session
    fn enable_events(&mut self) -> Result<(), UartError>;

    /// Apply the line configuration
    fn configure(&mut self, config: &UartConfig) -> Result<(), UartError>;

    /// Power the peripheral up
    fn resume(&mut self) -> Result<(), UartError>;

    /// Power the peripheral down
    fn suspend(&mut self) -> Result<(), UartError>;

    /// Start reception into `buffer`
    ///
    /// `timeout_us` is the inactivity time after which received bytes are
    /// reported even if the buffer is not full.
    fn rx_enable(&mut self, buffer: RxBuffer, timeout_us: u32) -> Result<(), (UartError, RxBuffer)>;

    /// Answer an [`UartEvent::RxBufRequest`]
    fn rx_buf_rsp(&mut self, buffer: RxBuffer) -> Result<(), (UartError, RxBuffer)>;

    /// Stop reception, buffers are released through events
    fn rx_disable(&mut self) -> Result<(), UartError>;

    /// Transmit a single byte, blocking until it is queued
    fn poll_out(&mut self, byte: u8);
}

#[cfg(test)]
pub mod mock {
    //! Mock UART transport for testing

    use super::*;
    use heapless::Vec;

    /// Mock UART transport for unit testing
    pub struct MockUart {
        /// Bytes written via poll_out()
        tx_buffer: Vec<u8, 4096>,
        /// Buffers currently owned by the driver
        held: Vec<RxBuffer, 2>,
        /// Buffers given up by rx_disable(), waiting to be released
        releasing: Vec<RxBuffer, 2>,
        /// Last applied configuration
        config: Option<UartConfig>,
        rx_enabled: bool,
        powered: bool,
        events_enabled: bool,
        rx_enable_calls: usize,
        rx_disable_calls: usize,
        suspend_calls: usize,
        /// Number of err_check() calls that fail before the line is valid
        not_ready_polls: usize,
        /// Number of rx_enable() calls that fail before one succeeds
        rx_enable_failures: usize,
        next_events_error: Option<UartError>,
        next_configure_error: Option<UartError>,
    }

    impl MockUart {
        /// Create a new mock transport with a valid line
        pub fn new() -> Self {
            Self {
                tx_buffer: Vec::new(),
                held: Vec::new(),
                releasing: Vec::new(),
                config: None,
                rx_enabled: false,
                powered: false,
                events_enabled: false,
                rx_enable_calls: 0,
                rx_disable_calls: 0,
                suspend_calls: 0,
                not_ready_polls: 0,
                rx_enable_failures: 0,
                next_events_error: None,
                next_configure_error: None,
            }
        }

        /// Get all bytes transmitted so far
        pub fn tx_data(&self) -> &[u8] {
            &self.tx_buffer
        }

        /// Transmitted bytes as text
        pub fn tx_str(&self) -> &str {
            core::str::from_utf8(&self.tx_buffer).unwrap_or("<invalid utf-8>")
        }

        /// Clear the TX record
        pub fn clear_tx(&mut self) {
            self.tx_buffer.clear();
        }

        /// Take the buffers the driver gave up on rx_disable()
        pub fn take_released(&mut self) -> Vec<RxBuffer, 2> {
            core::mem::take(&mut self.releasing)
        }

        /// Take a held buffer as the driver would when exhausting it
        pub fn take_exhausted(&mut self) -> Option<RxBuffer> {
            if self.held.is_empty() {
                None
            } else {
                Some(self.held.remove(0))
            }
        }

        /// Number of buffers the driver currently owns
        pub fn held_count(&self) -> usize {
            self.held.len()
        }

        pub fn held_ids(&self) -> Vec<crate::protocol::BufferId, 2> {
            self.held.iter().map(|buffer| buffer.id()).collect()
        }

        pub fn is_rx_enabled(&self) -> bool {
            self.rx_enabled
        }

        pub fn is_powered(&self) -> bool {
            self.powered
        }

        pub fn events_enabled(&self) -> bool {
            self.events_enabled
        }

        pub fn config(&self) -> Option<UartConfig> {
            self.config
        }

        pub fn rx_enable_calls(&self) -> usize {
            self.rx_enable_calls
        }

        pub fn rx_disable_calls(&self) -> usize {
            self.rx_disable_calls
        }

        pub fn suspend_calls(&self) -> usize {
            self.suspend_calls
        }

        /// Make the next `polls` err_check() calls report a bad line
        pub fn set_not_ready_polls(&mut self, polls: usize) {
            self.not_ready_polls = polls;
        }

        /// Make the next `count` rx_enable() calls fail
        pub fn set_rx_enable_failures(&mut self, count: usize) {
            self.rx_enable_failures = count;
        }

        pub fn set_next_events_error(&mut self, error: UartError) {
            self.next_events_error = Some(error);
        }

        pub fn set_next_configure_error(&mut self, error: UartError) {
            self.next_configure_error = Some(error);
        }

        fn give_up_held(&mut self) {
            while let Some(buffer) = self.held.pop() {
                let _ = self.releasing.push(buffer);
            }
        }
    }

    impl Default for MockUart {
        fn default() -> Self {
            Self::new()
        }
    }

    impl UartTransport for MockUart {
        fn err_check(&mut self) -> Result<(), UartError> {
            if self.not_ready_polls > 0 {
                self.not_ready_polls -= 1;
                return Err(UartError::NotReady);
            }
            Ok(())
        }

        fn enable_events(&mut self) -> Result<(), UartError> {
            if let Some(error) = self.next_events_error.take() {
                return Err(error);
            }
            self.events_enabled = true;
            Ok(())
        }

        fn configure(&mut self, config: &UartConfig) -> Result<(), UartError> {
            if let Some(error) = self.next_configure_error.take() {
                return Err(error);
            }
            self.config = Some(*config);
            Ok(())
        }

        fn resume(&mut self) -> Result<(), UartError> {
            self.powered = true;
            Ok(())
        }

        fn suspend(&mut self) -> Result<(), UartError> {
            self.suspend_calls += 1;
            self.powered = false;
            Ok(())
        }

        fn rx_enable(
            &mut self,
            buffer: RxBuffer,
            _timeout_us: u32,
        ) -> Result<(), (UartError, RxBuffer)> {
            self.rx_enable_calls += 1;
            if self.rx_enable_failures > 0 {
                self.rx_enable_failures -= 1;
                return Err((UartError::Io, buffer));
            }
            if self.rx_enabled {
                return Err((UartError::Busy, buffer));
            }
            self.held.push(buffer).map_err(|buffer| (UartError::InvalidBuffer, buffer))?;
            self.rx_enabled = true;
            Ok(())
        }

        fn rx_buf_rsp(&mut self, buffer: RxBuffer) -> Result<(), (UartError, RxBuffer)> {
            if !self.rx_enabled {
                return Err((UartError::Busy, buffer));
            }
            self.held.push(buffer).map_err(|buffer| (UartError::InvalidBuffer, buffer))
        }

        fn rx_disable(&mut self) -> Result<(), UartError> {
            self.rx_disable_calls += 1;
            if !self.rx_enabled {
                return Err(UartError::NotReady);
            }
            self.rx_enabled = false;
            self.give_up_held();
            Ok(())
        }

        fn poll_out(&mut self, byte: u8) {
            let _ = self.tx_buffer.push(byte);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::protocol::RxBufferPair;

        #[test]
        fn test_mock_rx_enable_takes_buffer() {
            let mut uart = MockUart::new();
            let mut pair = RxBufferPair::new();

            let buffer = pair.take_for_enable().unwrap();
            assert!(uart.rx_enable(buffer, 1).is_ok());
            assert!(uart.is_rx_enabled());
            assert_eq!(uart.held_count(), 1);
        }

        #[test]
        fn test_mock_rx_enable_failure_returns_buffer() {
            let mut uart = MockUart::new();
            let mut pair = RxBufferPair::new();
            uart.set_rx_enable_failures(1);

            let buffer = pair.take_for_enable().unwrap();
            let (error, buffer) = uart.rx_enable(buffer, 1).unwrap_err();
            assert_eq!(error, UartError::Io);

            // Second attempt with the returned buffer succeeds
            assert!(uart.rx_enable(buffer, 1).is_ok());
            assert_eq!(uart.rx_enable_calls(), 2);
        }

        #[test]
        fn test_mock_disable_gives_up_buffers() {
            let mut uart = MockUart::new();
            let mut pair = RxBufferPair::new();

            uart.rx_enable(pair.take_for_enable().unwrap(), 1).unwrap();
            uart.rx_buf_rsp(pair.take_next().unwrap()).unwrap();
            uart.rx_disable().unwrap();

            assert!(!uart.is_rx_enabled());
            assert_eq!(uart.held_count(), 0);
            assert_eq!(uart.take_released().len(), 2);
        }

        #[test]
        fn test_mock_poll_out() {
            let mut uart = MockUart::new();

            for &byte in b"OK" {
                uart.poll_out(byte);
            }
            assert_eq!(uart.tx_str(), "OK");

            uart.clear_tx();
            assert!(uart.tx_data().is_empty());
        }
    }
}
