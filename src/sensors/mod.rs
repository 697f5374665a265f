pub mod i2c;
pub mod traits;

pub use i2c::I2cChecks;
pub use traits::SelfTestChecks;
