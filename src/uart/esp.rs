//! UART transport on top of the esp-hal UART driver
//!
//! esp-hal reads from the hardware FIFO rather than into caller buffers, so
//! this adapter keeps the buffer contract of [`UartTransport`] itself: the
//! buffers handed over by the session are held while reception is enabled
//! and rotated as bytes are accounted. Buffer and disable notifications are
//! queued here and turned into [`UartEvent`]s by the receive pump, outside
//! the session lock.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use esp_hal::uart::{Config, DataBits, Parity as HalParity, StopBits as HalStopBits, UartTx};
use esp_hal::Async;
use heapless::Deque;
use log::{info, warn};

use super::traits::{Parity, StopBits, StopReason, UartConfig, UartError, UartEvent, UartTransport};
use crate::config::uart::RX_BUF_LEN;
use crate::protocol::RxBuffer;

/// Raised when notifications are queued, wakes the receive pump
pub static DRIVER_EVENTS: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Notification waiting to be delivered as an event
#[derive(Debug)]
pub enum Notice {
    Stopped(StopReason),
    Released(RxBuffer),
    Disabled,
}

impl From<Notice> for UartEvent<'static> {
    fn from(notice: Notice) -> Self {
        match notice {
            Notice::Stopped(reason) => UartEvent::RxStopped(reason),
            Notice::Released(buffer) => UartEvent::RxBufReleased(buffer),
            Notice::Disabled => UartEvent::RxDisabled,
        }
    }
}

/// esp-hal backed UART transport
pub struct EspUart {
    tx: UartTx<'static, Async>,
    events: bool,
    powered: bool,
    current: Option<RxBuffer>,
    next: Option<RxBuffer>,
    requested: bool,
    fill: usize,
    notices: Deque<Notice, 6>,
}

impl EspUart {
    pub fn new(tx: UartTx<'static, Async>) -> Self {
        Self {
            tx,
            events: false,
            powered: true,
            current: None,
            next: None,
            requested: false,
            fill: 0,
            notices: Deque::new(),
        }
    }

    /// Whether received bytes should be reported
    pub fn is_receiving(&self) -> bool {
        self.events && self.powered && self.current.is_some()
    }

    /// Account `len` received bytes against the current buffer
    ///
    /// A full buffer is swapped for the next one and released.
    pub fn consume(&mut self, len: usize) {
        self.fill += len;
        if self.fill < RX_BUF_LEN {
            return;
        }
        if let Some(next) = self.next.take() {
            if let Some(full) = self.current.replace(next) {
                self.notify(Notice::Released(full));
            }
            self.fill -= RX_BUF_LEN;
            self.requested = false;
        } else {
            // Keep receiving into the current buffer until a new one arrives
            self.fill = RX_BUF_LEN;
        }
    }

    /// Whether the next buffer should be requested, reported once per buffer
    pub fn wants_buffer(&mut self) -> bool {
        if self.current.is_some() && self.next.is_none() && !self.requested {
            self.requested = true;
            true
        } else {
            false
        }
    }

    /// Stop reception after a line error
    pub fn stop(&mut self, reason: StopReason) {
        if self.current.is_none() {
            return;
        }
        warn!("UART reception stopped: {:?}", reason);
        self.notify(Notice::Stopped(reason));
        self.release_all();
    }

    /// Take the oldest pending notification
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    fn release_all(&mut self) {
        if let Some(buffer) = self.current.take() {
            self.notify(Notice::Released(buffer));
        }
        if let Some(buffer) = self.next.take() {
            self.notify(Notice::Released(buffer));
        }
        self.fill = 0;
        self.requested = false;
        self.notify(Notice::Disabled);
    }

    fn notify(&mut self, notice: Notice) {
        if self.notices.push_back(notice).is_err() {
            warn!("UART notice queue full");
        }
        DRIVER_EVENTS.signal(());
    }
}

impl UartTransport for EspUart {
    fn err_check(&mut self) -> Result<(), UartError> {
        // esp-hal reports line errors per read, there is no standing error state
        Ok(())
    }

    fn enable_events(&mut self) -> Result<(), UartError> {
        self.events = true;
        Ok(())
    }

    fn configure(&mut self, config: &UartConfig) -> Result<(), UartError> {
        if config.flow_control {
            return Err(UartError::Unsupported);
        }
        let data_bits = match config.data_bits {
            5 => DataBits::_5,
            6 => DataBits::_6,
            7 => DataBits::_7,
            8 => DataBits::_8,
            _ => return Err(UartError::Unsupported),
        };
        let parity = match config.parity {
            Parity::None => HalParity::None,
            Parity::Even => HalParity::Even,
            Parity::Odd => HalParity::Odd,
        };
        let stop_bits = match config.stop_bits {
            StopBits::One => HalStopBits::_1,
            StopBits::Two => HalStopBits::_2,
        };

        let hal_config = Config::default()
            .with_baudrate(config.baud_rate)
            .with_data_bits(data_bits)
            .with_parity(parity)
            .with_stop_bits(stop_bits);
        self.tx.apply_config(&hal_config).map_err(|error| {
            warn!("UART configuration rejected: {:?}", error);
            UartError::Unsupported
        })
    }

    fn resume(&mut self) -> Result<(), UartError> {
        self.powered = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), UartError> {
        if self.current.is_some() {
            return Err(UartError::Busy);
        }
        info!("UART suspended");
        self.powered = false;
        Ok(())
    }

    fn rx_enable(&mut self, buffer: RxBuffer, _timeout_us: u32) -> Result<(), (UartError, RxBuffer)> {
        if !self.powered {
            return Err((UartError::NotReady, buffer));
        }
        if self.current.is_some() {
            return Err((UartError::Busy, buffer));
        }
        self.current = Some(buffer);
        self.fill = 0;
        self.requested = false;
        DRIVER_EVENTS.signal(());
        Ok(())
    }

    fn rx_buf_rsp(&mut self, buffer: RxBuffer) -> Result<(), (UartError, RxBuffer)> {
        if self.current.is_none() {
            return Err((UartError::NotReady, buffer));
        }
        if self.next.is_some() {
            return Err((UartError::Busy, buffer));
        }
        self.next = Some(buffer);
        Ok(())
    }

    fn rx_disable(&mut self) -> Result<(), UartError> {
        if self.current.is_none() {
            return Err(UartError::NotReady);
        }
        self.release_all();
        Ok(())
    }

    fn poll_out(&mut self, byte: u8) {
        let _ = embedded_io::Write::write_all(&mut self.tx, &[byte]);
    }
}
