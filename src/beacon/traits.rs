//! Advertising controller trait for abstraction and testability
//!
//! This trait defines the interface the command dispatcher uses to control
//! the beacon's advertising, so the BLE stack can be swapped with a mock.

use crate::at::{InstanceId, Namespace};
use core::future::Future;

/// Errors that can occur during advertising operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvError {
    /// init() has not been called
    NotInitialised,
    /// Parameters rejected by the controller
    InvalidParams,
    /// Controller or host stack failure
    Controller,
}

/// Parameters of the advertising set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvParams {
    /// Advertising interval in milliseconds
    pub interval_ms: u16,
    /// Eddystone namespace
    pub namespace: Namespace,
    /// Eddystone instance id
    pub instance_id: InstanceId,
    /// Radio transmit power in dBm
    pub tx_power: i8,
}

/// Abstract advertising controller
pub trait Advertiser {
    /// (Re)build the advertising set from `params`
    ///
    /// Does not start advertising.
    fn init(&mut self, params: &AdvParams) -> impl Future<Output = Result<(), AdvError>>;

    /// Start advertising
    fn start(&mut self) -> impl Future<Output = Result<(), AdvError>>;

    /// Stop advertising
    fn stop(&mut self) -> impl Future<Output = Result<(), AdvError>>;

    /// Change the interval range
    ///
    /// Once the set is initialised, advertising is stopped, reconfigured and
    /// started, whether or not it was running before. Without a set only the
    /// range is recorded.
    fn update_interval(
        &mut self,
        min_ms: u16,
        max_ms: u16,
    ) -> impl Future<Output = Result<(), AdvError>>;

    /// Returns true while advertising
    fn is_running(&self) -> bool;
}
