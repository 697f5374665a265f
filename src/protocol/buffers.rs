//! Alternating receive buffers shared with the UART driver
//!
//! The driver always owns exactly one buffer it is filling. When it runs
//! out it asks for the next one, and later hands the exhausted one back.
//! Buffers are moved by value, so the receiver can never hold a buffer the
//! driver is writing to.

use crate::config::uart::{RX_BUF_LEN, RX_BUF_NUM};

/// Identifies one of the two receive buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferId {
    First,
    Second,
}

impl BufferId {
    fn index(self) -> usize {
        match self {
            BufferId::First => 0,
            BufferId::Second => 1,
        }
    }

    /// The other buffer of the pair
    pub fn other(self) -> Self {
        match self {
            BufferId::First => BufferId::Second,
            BufferId::Second => BufferId::First,
        }
    }
}

/// A receive buffer, owned either by the pair or by the driver
#[derive(Debug)]
pub struct RxBuffer {
    id: BufferId,
    data: [u8; RX_BUF_LEN],
}

impl RxBuffer {
    const fn new(id: BufferId) -> Self {
        Self {
            id,
            data: [0; RX_BUF_LEN],
        }
    }

    /// Which buffer of the pair this is
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Storage for the driver to receive into
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Received contents
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// Errors from buffer handoffs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The requested buffer is still owned by the driver
    NotAvailable(BufferId),
}

/// The two receive buffers and which of them the driver holds
pub struct RxBufferPair {
    home: [Option<RxBuffer>; RX_BUF_NUM],
    /// Buffer most recently handed to the driver
    active: Option<BufferId>,
}

impl RxBufferPair {
    /// Create a pair with both buffers at home
    pub const fn new() -> Self {
        Self {
            home: [
                Some(RxBuffer::new(BufferId::First)),
                Some(RxBuffer::new(BufferId::Second)),
            ],
            active: None,
        }
    }

    /// Take the first buffer for enabling reception
    ///
    /// Reception always starts in the first buffer, matching the driver
    /// configuration used at start and after every re-arm.
    pub fn take_for_enable(&mut self) -> Result<RxBuffer, BufferError> {
        let buffer = self.home[BufferId::First.index()]
            .take()
            .ok_or(BufferError::NotAvailable(BufferId::First))?;
        self.active = Some(BufferId::First);
        Ok(buffer)
    }

    /// Hand over the reserve buffer when the driver requests the next one
    pub fn take_next(&mut self) -> Result<RxBuffer, BufferError> {
        let next = self.active.map_or(BufferId::First, BufferId::other);
        let buffer = self.home[next.index()]
            .take()
            .ok_or(BufferError::NotAvailable(next))?;
        self.active = Some(next);
        Ok(buffer)
    }

    /// Put back a buffer the driver released or refused
    pub fn give_back(&mut self, buffer: RxBuffer) {
        let index = buffer.id.index();
        if self.home[index].is_none() {
            self.home[index] = Some(buffer);
        }
    }

    /// Returns true if the buffer is held by the pair (not the driver)
    pub fn is_home(&self, id: BufferId) -> bool {
        self.home[id.index()].is_some()
    }

    /// Buffer most recently handed to the driver
    pub fn active(&self) -> Option<BufferId> {
        self.active
    }
}

impl Default for RxBufferPair {
    fn default() -> Self {
        Self::new()
    }
}
