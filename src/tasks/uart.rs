//! UART receive pump
//!
//! Reads the hardware FIFO and feeds the session with the events the
//! driver would raise from its interrupt: received bytes, buffer requests,
//! buffer releases and the end of reception.

use embassy_futures::select::{select, Either};
use embedded_io::{Error, ErrorKind};
use embedded_io_async::Read;
use log::warn;

use super::DeviceHost;
use crate::uart::esp::DRIVER_EVENTS;
use crate::uart::{StopReason, UartEvent};

/// Size of a single FIFO read
const READ_CHUNK_LEN: usize = 64;

fn stop_reason(kind: ErrorKind) -> StopReason {
    match kind {
        ErrorKind::OutOfMemory => StopReason::Overrun,
        ErrorKind::InvalidData => StopReason::Parity,
        _ => StopReason::Framing,
    }
}

/// Task that pumps received bytes into the session
///
/// Generic over any type implementing `embedded_io_async::Read`.
pub async fn uart_pump_task<R: Read>(mut reader: R, host: &'static DeviceHost) {
    let mut buf = [0u8; READ_CHUNK_LEN];

    loop {
        match select(reader.read(&mut buf), DRIVER_EVENTS.wait()).await {
            Either::First(Ok(0)) => {}
            Either::First(Ok(n)) => {
                if host.with_transport(|uart| uart.is_receiving()) {
                    host.on_uart_event(UartEvent::RxReady(&buf[..n]));
                    host.with_transport(|uart| uart.consume(n));
                }
            }
            Either::First(Err(error)) => {
                let reason = stop_reason(error.kind());
                warn!("UART read error: {:?}", reason);
                host.with_transport(|uart| uart.stop(reason));
            }
            Either::Second(()) => {}
        }

        deliver_notices(host);
    }
}

/// Turn everything the transport queued into session events
fn deliver_notices(host: &DeviceHost) {
    if host.with_transport(|uart| uart.wants_buffer()) {
        host.on_uart_event(UartEvent::RxBufRequest);
    }
    while let Some(notice) = host.with_transport(|uart| uart.take_notice()) {
        host.on_uart_event(notice.into());
    }
}
