pub mod i2cio;
pub mod spiio;
pub mod bme680;
