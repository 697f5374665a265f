//! Debug logging over the USB serial JTAG console.
//!
//! Installs a [`log::Log`] implementation that formats records into a
//! shared buffer. A writer task drains the buffer with `esp-println`, so
//! logging never blocks the UART callback path. Records are dropped when
//! the buffer is full.

use core::cell::RefCell;
use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use heapless::String;
use log::{LevelFilter, Log, Metadata, Record};

/// Maximum length of a single formatted record
const MAX_DEBUG_MSG_LEN: usize = 160;

/// Capacity of the pending output buffer
const DEBUG_BUFFER_LEN: usize = 1024;

/// Signal to indicate debug output is available
pub static DEBUG_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Pending debug output (protected by critical section mutex)
static DEBUG_BUFFER: Mutex<CriticalSectionRawMutex, RefCell<String<DEBUG_BUFFER_LEN>>> =
    Mutex::new(RefCell::new(String::new()));

static LOGGER: DebugLogger = DebugLogger;

/// Logger feeding the debug buffer
pub struct DebugLogger;

impl Log for DebugLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line: String<MAX_DEBUG_MSG_LEN> = String::new();
        // Overlong records are truncated
        let _ = write!(line, "{} {}: {}", record.level(), record.target(), record.args());
        write_debug(&line);
    }

    fn flush(&self) {}
}

/// Install the debug logger.
///
/// Must be called once during startup, before the first log record.
pub fn init(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Queue a line of debug output.
///
/// Returns false if the line was dropped because the buffer is full.
pub fn write_debug(msg: &str) -> bool {
    DEBUG_BUFFER.lock(|cell| {
        let mut buffer = cell.borrow_mut();
        if buffer.capacity() - buffer.len() < msg.len() + 2 {
            return false;
        }
        let _ = buffer.push_str(msg);
        let _ = buffer.push_str("\r\n");
        DEBUG_SIGNAL.signal(());
        true
    })
}

/// Take everything queued so far.
///
/// Returns None if nothing is pending.
pub fn take_debug_output() -> Option<String<DEBUG_BUFFER_LEN>> {
    DEBUG_BUFFER.lock(|cell| {
        let mut buffer = cell.borrow_mut();
        if buffer.is_empty() {
            None
        } else {
            let out = buffer.clone();
            buffer.clear();
            Some(out)
        }
    })
}

/// Debug writer task that prints buffered output to the console.
pub async fn debug_writer_task() {
    loop {
        DEBUG_SIGNAL.wait().await;

        if let Some(out) = take_debug_output() {
            esp_println::print!("{}", out);
        }
    }
}
