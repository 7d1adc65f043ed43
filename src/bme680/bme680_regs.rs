#[allow(unused_imports)]
use log::{debug, info};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::{thread, time};

use super::bme680_bus::BusOps;
use super::bme680_enums::{Bme680IrrFilter, Bme680OverSampling, Bme680SensorPowerMode};

pub const BME680_CHIP_ID: u8 = 0x61;

// -- control, status and result registers
pub const BME680_REG_MEAS_STATUS_0: u8 = 0x1d;
pub const BME680_REG_FIELD_0: u8 = 0x1d;
pub const BME680_REG_RES_HEAT_0: u8 = 0x5a;
pub const BME680_REG_GAS_WAIT_0: u8 = 0x64;
pub const BME680_REG_CTRL_GAS_1: u8 = 0x71;
pub const BME680_REG_CTRL_HUM: u8 = 0x72;
pub const BME680_REG_STATUS: u8 = 0x73;
pub const BME680_REG_CTRL_MEAS: u8 = 0x74;
pub const BME680_REG_CONFIG: u8 = 0x75;
pub const BME680_REG_CHIP_ID: u8 = 0xd0;
pub const BME680_REG_RESET: u8 = 0xe0;

// -- calibration spans, not contiguous in register space
pub const BME680_REG_COEFF_1: u8 = 0x8a;
pub const BME680_REG_COEFF_2: u8 = 0xe1;
pub const BME680_REG_COEFF_3: u8 = 0x00;

// -- length values for block reads
pub const BME680_LEN_FIELD: usize = 17;
pub const BME680_LEN_COEFF_1: usize = 23;
pub const BME680_LEN_COEFF_2: usize = 14;
pub const BME680_LEN_COEFF_3: usize = 5;
pub const BME680_LEN_COEFF_ALL: usize = BME680_LEN_COEFF_1 + BME680_LEN_COEFF_2 + BME680_LEN_COEFF_3;

// -- mask and bits for meas_status_0 register
const BME680_MEAS_STATUS_0_NEW_DATA_BIT: u8 = 0x80;
const BME680_MEAS_STATUS_0_GAS_MEASURING_BIT: u8 = 0x40;
const BME680_MEAS_STATUS_0_MEASURING_BIT: u8 = 0x20;
const BME680_MEAS_STATUS_0_GAS_MEAS_INDEX_MASK: u8 = 0x0f;

// -- bits of the gas_r_lsb register
pub const BME680_GAS_RANGE_MASK: u8 = 0x0f;
pub const BME680_HEAT_STAB_BIT: u8 = 0x10;
pub const BME680_GAS_VALID_BIT: u8 = 0x20;

// -- other values
const BME680_COMMAND_SOFT_RESET: u8 = 0xb6;
const BME680_STARTUP_DELAY_MS: u64 = 10;

// -- shift values for control registers
const BME680_CTRL_MEAS_PRESSURE_SHL: u8 = 2;
const BME680_CTRL_MEAS_TEMPERATURE_SHL: u8 = 5;
const BME680_CONTROL_IIR_FILTER_SHL: u8 = 2;
const BME680_CTRL_GAS_1_RUN_GAS_BIT: u8 = 0x10;
const BME680_CTRL_GAS_1_NB_CONV_MASK: u8 = 0x0f;

// -- offsets into the field block read from BME680_REG_FIELD_0
const FIELD_OFFS_STATUS: usize = 0;
const FIELD_OFFS_PRESSURE: usize = 2;
const FIELD_OFFS_TEMPERATURE: usize = 5;
const FIELD_OFFS_HUMIDITY: usize = 8;
const FIELD_OFFS_GAS_MSB: usize = 13;
const FIELD_OFFS_GAS_LSB: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bme680MeasuringStatus {
    pub new_data: bool,
    pub gas_measuring: bool,
    pub measuring: bool,
    pub gas_meas_index: u8,
}

impl Bme680MeasuringStatus {
    pub fn from_reg(reg_val: u8) -> Bme680MeasuringStatus {
        Bme680MeasuringStatus {
            new_data: (reg_val & BME680_MEAS_STATUS_0_NEW_DATA_BIT) > 0,
            gas_measuring: (reg_val & BME680_MEAS_STATUS_0_GAS_MEASURING_BIT) > 0,
            measuring: (reg_val & BME680_MEAS_STATUS_0_MEASURING_BIT) > 0,
            gas_meas_index: reg_val & BME680_MEAS_STATUS_0_GAS_MEAS_INDEX_MASK,
        }
    }
}

/// Raw ADC codes decoded from one field block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bme680FieldData {
    pub status: u8,
    pub pressure_raw: u32,
    pub temperature_raw: u32,
    pub humidity_raw: u16,
    pub gas_raw: u16,
    // -- gas_r_lsb register: range nibble, heater stability and gas valid bits
    pub gas_range_raw: u8,
}

impl Bme680FieldData {
    pub fn from_bytes(reg_data: &[u8; BME680_LEN_FIELD]) -> Bme680FieldData {
        let adc_20 = |offs: usize| {
            (reg_data[offs] as u32) << 12 | (reg_data[offs + 1] as u32) << 4 | (reg_data[offs + 2] as u32) >> 4
        };
        let humidity_raw = (reg_data[FIELD_OFFS_HUMIDITY] as u16) << 8 | reg_data[FIELD_OFFS_HUMIDITY + 1] as u16;
        let gas_raw = (reg_data[FIELD_OFFS_GAS_MSB] as u16) << 2 | (reg_data[FIELD_OFFS_GAS_LSB] as u16) >> 6;
        Bme680FieldData {
            status: reg_data[FIELD_OFFS_STATUS],
            pressure_raw: adc_20(FIELD_OFFS_PRESSURE),
            temperature_raw: adc_20(FIELD_OFFS_TEMPERATURE),
            humidity_raw,
            gas_raw,
            gas_range_raw: reg_data[FIELD_OFFS_GAS_LSB],
        }
    }

    pub fn new_data(&self) -> bool {
        Bme680MeasuringStatus::from_reg(self.status).new_data
    }
}

/// Chip addressing rules on top of a bus transport. Every multi-step
/// operation holds the bus lock for its whole duration; transport errors
/// are passed through untouched.
pub struct RegisterProtocol<B: BusOps> {
    bus: Mutex<B>,
}

impl<B: BusOps> RegisterProtocol<B> {
    pub fn new(bus: B) -> RegisterProtocol<B> {
        RegisterProtocol { bus: Mutex::new(bus) }
    }

    pub fn into_inner(self) -> B {
        self.bus.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn bus_mut(&mut self) -> &mut B {
        self.bus.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, B> {
        // -- a panic while holding the lock leaves no half-written register behind
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn check(&self) -> bool {
        self.lock().check()
    }

    pub fn read_reg(&self, register: u8) -> Result<u8, std::io::Error> {
        let mut reg_val = [0u8; 1];
        self.lock().read(register, &mut reg_val)?;
        Ok(reg_val[0])
    }

    pub fn read_regs(&self, start: u8, data: &mut [u8]) -> Result<(), std::io::Error> {
        self.lock().read(start, data)
    }

    pub fn write_reg(&self, register: u8, value: u8) -> Result<(), std::io::Error> {
        self.lock().write(register, value)
    }

    pub fn soft_reset(&self) -> Result<(), std::io::Error> {
        let mut bus = self.lock();
        // -- initiate soft reset
        debug!("Initiating soft reset");
        bus.write(BME680_REG_RESET, BME680_COMMAND_SOFT_RESET)?;
        // -- wait for the device to startup
        let startup_delay = time::Duration::from_millis(BME680_STARTUP_DELAY_MS);
        thread::sleep(startup_delay);
        // -- reset puts the page latch back to its default
        bus.sync()
    }

    pub fn read_chip_id(&self) -> Result<u8, std::io::Error> {
        self.read_reg(BME680_REG_CHIP_ID)
    }

    /// Reads the three calibration spans into one 42 byte image.
    pub fn read_calibration(&self) -> Result<[u8; BME680_LEN_COEFF_ALL], std::io::Error> {
        const SPAN_2: usize = BME680_LEN_COEFF_1 + BME680_LEN_COEFF_2;
        let mut reg_data = [0u8; BME680_LEN_COEFF_ALL];
        let mut bus = self.lock();
        bus.read(BME680_REG_COEFF_1, &mut reg_data[..BME680_LEN_COEFF_1])?;
        bus.read(BME680_REG_COEFF_2, &mut reg_data[BME680_LEN_COEFF_1..SPAN_2])?;
        bus.read(BME680_REG_COEFF_3, &mut reg_data[SPAN_2..])?;
        debug!("Read {BME680_LEN_COEFF_ALL} bytes of calibration data");
        Ok(reg_data)
    }

    pub fn read_meas_status(&self) -> Result<Bme680MeasuringStatus, std::io::Error> {
        let reg_val = self.read_reg(BME680_REG_MEAS_STATUS_0)?;
        Ok(Bme680MeasuringStatus::from_reg(reg_val))
    }

    pub fn read_field_data(&self) -> Result<Bme680FieldData, std::io::Error> {
        let mut reg_data = [0u8; BME680_LEN_FIELD];
        self.read_regs(BME680_REG_FIELD_0, &mut reg_data)?;
        debug!("Read field block {reg_data:02x?}");
        Ok(Bme680FieldData::from_bytes(&reg_data))
    }

    pub fn set_humidity_osr(&self, humidity_osr: Bme680OverSampling) -> Result<(), std::io::Error> {
        debug!("Setting humidity oversampling rate to {humidity_osr}");
        self.write_reg(BME680_REG_CTRL_HUM, humidity_osr.value())
    }

    pub fn set_irr_filter(&self, irr_filter: Bme680IrrFilter) -> Result<(), std::io::Error> {
        let reg_val = irr_filter.value() << BME680_CONTROL_IIR_FILTER_SHL;
        debug!("Setting IRR filter to {irr_filter}");
        self.write_reg(BME680_REG_CONFIG, reg_val)
    }

    /// Writes oversampling for temperature and pressure together with the power mode.
    /// Forced mode is a one-shot trigger, the chip falls back to sleep on its own.
    pub fn set_ctrl_meas(&self, temperature_osr: Bme680OverSampling, pressure_osr: Bme680OverSampling,
        mode: Bme680SensorPowerMode) -> Result<(), std::io::Error> {
        let reg_val = temperature_osr.value() << BME680_CTRL_MEAS_TEMPERATURE_SHL
            | pressure_osr.value() << BME680_CTRL_MEAS_PRESSURE_SHL
            | mode.value();
        debug!("Setting ctrl_meas to {reg_val:#010b} ({mode})");
        self.write_reg(BME680_REG_CTRL_MEAS, reg_val)
    }

    /// Programs heater set point 0 and selects it with gas conversion enabled.
    pub fn set_heater_profile_0(&self, res_heat: u8, gas_wait: u8) -> Result<(), std::io::Error> {
        const NB_CONV: u8 = 0;
        let mut bus = self.lock();
        debug!("Setting heater resistance 0 to {res_heat:#04x}, gas wait 0 to {gas_wait:#04x}");
        bus.write(BME680_REG_RES_HEAT_0, res_heat)?;
        bus.write(BME680_REG_GAS_WAIT_0, gas_wait)?;
        bus.write(BME680_REG_CTRL_GAS_1, BME680_CTRL_GAS_1_RUN_GAS_BIT | (NB_CONV & BME680_CTRL_GAS_1_NB_CONV_MASK))
    }
}
