use thiserror::Error;

use super::bme680_enums::SensorChannel;

/// Errors reported by the BME680 driver. None of them is retried inside the driver.
#[derive(Debug, Error)]
pub enum Bme680Error {
    /// The bus failed its readiness check, the instance is unusable until re-initialized.
    #[error("Bus not ready")]
    BusNotReady,
    /// A single bus transaction failed.
    #[error("Bus I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The identity register did not hold the BME680 chip id.
    #[error("Found unknown chip id '{found:#04x}', expected '{expected:#04x}'")]
    BadChipId { found: u8, expected: u8 },
    /// The new data flag was not raised within the poll bound.
    #[error("No new data after {polls} status polls")]
    Timeout { polls: u32 },
    /// Compensation was requested before the calibration image was loaded.
    #[error("Calibration data not loaded")]
    NotCalibrated,
    #[error("Channel '{0}' is not supported")]
    UnsupportedChannel(SensorChannel),
    /// Initialization and chip id verification have not completed.
    #[error("Device not ready")]
    DeviceNotReady,
    #[error("Invalid heater profile: {0}")]
    InvalidHeaterProfile(String),
}
