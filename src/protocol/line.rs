//! Line receiver for the AT command protocol
//!
//! Accumulates received bytes until a carriage return is seen or the line
//! buffer is full. Either condition completes the line; nothing is dropped
//! silently. Once complete, further bytes are ignored until [`reset`].
//!
//! A line completed by length still owes its terminator. A carriage return
//! that arrives first after the reset is swallowed instead of being taken
//! as an empty line.
//!
//! [`reset`]: LineReceiver::reset

use crate::config::at::{LINE_TERMINATOR, MAX_CMD_LEN};
use heapless::Vec;

/// Outcome of pushing one byte into the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// Byte stored, should be echoed
    Accepted(u8),
    /// Byte stored and echoed, and it filled the buffer: the line is complete
    Filled(u8),
    /// Terminator received: the line is complete
    Terminated,
    /// Line already complete, byte discarded
    Ignored,
    /// Terminator of the previous, length-completed line, discarded
    Skipped,
}

impl LineEvent {
    /// Byte to echo back to the host, if any
    pub fn echo(&self) -> Option<u8> {
        match *self {
            LineEvent::Accepted(byte) | LineEvent::Filled(byte) => Some(byte),
            _ => None,
        }
    }

    /// True when this byte completed the line
    pub fn completes_line(&self) -> bool {
        matches!(self, LineEvent::Filled(_) | LineEvent::Terminated)
    }
}

/// Bounded line buffer fed from the receive callback
pub struct LineReceiver {
    buffer: Vec<u8, MAX_CMD_LEN>,
    complete: bool,
    /// The last line filled the buffer and its terminator is still due
    terminator_due: bool,
}

impl LineReceiver {
    /// Create an empty line receiver
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            complete: false,
            terminator_due: false,
        }
    }

    /// Push a received byte
    pub fn push(&mut self, byte: u8) -> LineEvent {
        let terminator_due = core::mem::take(&mut self.terminator_due);

        if self.complete {
            return LineEvent::Ignored;
        }

        if byte == LINE_TERMINATOR && terminator_due {
            return LineEvent::Skipped;
        }

        if byte == LINE_TERMINATOR {
            self.complete = true;
            return LineEvent::Terminated;
        }

        if self.buffer.push(byte).is_err() {
            // Unreachable while full lines are marked complete
            self.complete = true;
            return LineEvent::Ignored;
        }

        if self.buffer.is_full() {
            self.complete = true;
            self.terminator_due = true;
            LineEvent::Filled(byte)
        } else {
            LineEvent::Accepted(byte)
        }
    }

    /// The assembled line, cut at the first NUL byte
    pub fn line(&self) -> &[u8] {
        let end = self
            .buffer
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(self.buffer.len());
        &self.buffer[..end]
    }

    /// Returns true once a terminator or the length bound was reached
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns the current number of bytes in the buffer
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been stored
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and accept a new line
    ///
    /// A terminator still due from a length-completed line stays due.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.complete = false;
    }
}

impl Default for LineReceiver {
    fn default() -> Self {
        Self::new()
    }
}
