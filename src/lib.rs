#![cfg_attr(not(test), no_std)]

pub mod at;
pub mod beacon;
pub mod config;
pub mod dispatcher;
pub mod protocol;
pub mod sensors;
pub mod session;
pub mod storage;
pub mod system;
pub mod uart;

// These modules depend on the ESP32 HAL and runtime, only available with embedded feature
#[cfg(feature = "embedded")]
pub mod debug;
#[cfg(feature = "embedded")]
pub mod tasks;
