//! Beacon advertising
//!
//! The dispatcher drives advertising through the [`Advertiser`] trait. The
//! device implementation forwards requests to the BLE task.

pub mod address;
pub mod boot;
pub mod eddystone;
pub mod traits;

#[cfg(feature = "embedded")]
pub mod controller;

pub use address::{AddressKind, DeviceAddress};
pub use boot::{boot_params, start_beacon};
pub use eddystone::UidFrame;
pub use traits::{AdvError, AdvParams, Advertiser};
