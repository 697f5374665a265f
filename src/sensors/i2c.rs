//! Chip-id checks over a shared I2C bus
//!
//! Each sensor is considered present when its identification register
//! reads back the expected chip id.

use embedded_hal_async::i2c::I2c;
use log::{info, warn};

use super::traits::SelfTestChecks;

/// Identification register of one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipId {
    pub name: &'static str,
    pub address: u8,
    pub register: u8,
    pub expected: u8,
}

/// LIS2DW12 accelerometer, SA0 pulled high
pub const LIS2DW12: ChipId = ChipId {
    name: "LIS2DW12",
    address: 0x19,
    register: 0x0F,
    expected: 0x44,
};

/// BME280 environmental sensor, SDO pulled low
pub const BME280: ChipId = ChipId {
    name: "BME280",
    address: 0x76,
    register: 0xD0,
    expected: 0x60,
};

/// APDS-9306-065 ambient light sensor
pub const APDS9306: ChipId = ChipId {
    name: "APDS-9306",
    address: 0x52,
    register: 0x06,
    expected: 0xB3,
};

/// Self-test checks reading chip ids over I2C
pub struct I2cChecks<I: I2c> {
    bus: I,
}

impl<I: I2c> I2cChecks<I> {
    pub fn new(bus: I) -> Self {
        Self { bus }
    }

    /// Release the bus
    pub fn into_inner(self) -> I {
        self.bus
    }

    async fn read_chip_id(&mut self, chip: &ChipId) -> bool {
        let mut id = [0u8; 1];
        match self
            .bus
            .write_read(chip.address, &[chip.register], &mut id)
            .await
        {
            Ok(()) if id[0] == chip.expected => {
                info!("{} id: {:#04x}", chip.name, id[0]);
                true
            }
            Ok(()) => {
                warn!(
                    "{} unexpected id {:#04x}, expected {:#04x}",
                    chip.name, id[0], chip.expected
                );
                false
            }
            Err(_) => {
                warn!("{} not responding at {:#04x}", chip.name, chip.address);
                false
            }
        }
    }
}

impl<I: I2c> SelfTestChecks for I2cChecks<I> {
    async fn lis2dw12(&mut self) -> bool {
        self.read_chip_id(&LIS2DW12).await
    }

    async fn bme280(&mut self) -> bool {
        self.read_chip_id(&BME280).await
    }

    async fn apds9306(&mut self) -> bool {
        self.read_chip_id(&APDS9306).await
    }
}
