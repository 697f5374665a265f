//! Self-test check trait for abstraction and testability

use core::future::Future;

/// Factory self-test checks, one per on-board sensor
///
/// Each check reports whether the sensor answered as expected.
pub trait SelfTestChecks {
    /// Accelerometer (LIS2DW12)
    fn lis2dw12(&mut self) -> impl Future<Output = bool>;

    /// Temperature, pressure and humidity sensor (BME280)
    fn bme280(&mut self) -> impl Future<Output = bool>;

    /// Ambient light sensor (APDS-9306)
    fn apds9306(&mut self) -> impl Future<Output = bool>;
}
