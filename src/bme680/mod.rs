mod bme680_bus;
mod bme680_calc;
mod bme680_calib;
mod bme680_core;
mod bme680_enums;
mod bme680_error;
mod bme680_regs;
#[cfg(test)]
mod bme680_fake;

pub use bme680_bus::{Bme680Bus, BusOps, DeviceConfig, I2cBus, MemPage, SpiBus, SpiLink, SpidevLink};
pub use bme680_calc::*;
pub use bme680_calib::CalibrationSet;
pub use bme680_core::*;
pub use bme680_enums::*;
pub use bme680_error::Bme680Error;
pub use bme680_regs::{Bme680FieldData, Bme680MeasuringStatus, RegisterProtocol};
