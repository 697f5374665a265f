//! Embassy tasks module
//!
//! Contains all async tasks for the firmware, organised by functionality.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::session::AtHost;
use crate::uart::esp::EspUart;

pub mod ble;
pub mod session;
pub mod uart;

pub use ble::ble_task;
pub use session::{at_worker_task, mode_timer_task};
pub use uart::uart_pump_task;

/// The AT session as it runs on the device
pub type DeviceHost = AtHost<CriticalSectionRawMutex, EspUart>;
