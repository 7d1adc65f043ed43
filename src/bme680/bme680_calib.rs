#[allow(unused_imports)]
use log::{debug, info};

use super::bme680_bus::BusOps;
use super::bme680_error::Bme680Error;
use super::bme680_regs::{RegisterProtocol, BME680_LEN_COEFF_ALL};

// -- bit masks used while decoding
const BME680_RES_HEAT_RANGE_MASK: u8 = 0x30;
const BME680_RANGE_SW_ERR_MASK: u8 = 0xf0;
const BME680_4_BIT_MASK: u8 = 0x0f;
const BME680_4_BIT_SHIFT: u8 = 4;

// -- offsets into the 42 byte calibration image (span 1 at 0, span 2 at 23, span 3 at 37)
const CALIB_OFFS_T2: usize = 0;
const CALIB_OFFS_T3: usize = 2;
const CALIB_OFFS_P1: usize = 4;
const CALIB_OFFS_P2: usize = 6;
const CALIB_OFFS_P3: usize = 8;
const CALIB_OFFS_P4: usize = 10;
const CALIB_OFFS_P5: usize = 12;
const CALIB_OFFS_P7: usize = 14;
const CALIB_OFFS_P6: usize = 15;
const CALIB_OFFS_P8: usize = 18;
const CALIB_OFFS_P9: usize = 20;
const CALIB_OFFS_P10: usize = 22;
const CALIB_OFFS_H2_MSB: usize = 23;
const CALIB_OFFS_H1_H2_LSB: usize = 24;
const CALIB_OFFS_H1_MSB: usize = 25;
const CALIB_OFFS_H3: usize = 26;
const CALIB_OFFS_H4: usize = 27;
const CALIB_OFFS_H5: usize = 28;
const CALIB_OFFS_H6: usize = 29;
const CALIB_OFFS_H7: usize = 30;
const CALIB_OFFS_T1: usize = 31;
const CALIB_OFFS_GH2: usize = 33;
const CALIB_OFFS_GH1: usize = 35;
const CALIB_OFFS_GH3: usize = 36;
const CALIB_OFFS_RES_HEAT_VAL: usize = 37;
const CALIB_OFFS_RES_HEAT_RANGE: usize = 39;
const CALIB_OFFS_RANGE_SW_ERR: usize = 41;

/// Factory calibration coefficients, loaded once per device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationSet {
    // -- calibration coefficients for temperature
    pub par_t1: u16,
    pub par_t2: i16,
    pub par_t3: i8,
    // -- calibration coefficients for pressure
    pub par_p1: u16,
    pub par_p2: i16,
    pub par_p3: i8,
    pub par_p4: i16,
    pub par_p5: i16,
    pub par_p6: i8,
    pub par_p7: i8,
    pub par_p8: i16,
    pub par_p9: i16,
    pub par_p10: u8,
    // -- calibration coefficients for humidity
    pub par_h1: u16,
    pub par_h2: u16,
    pub par_h3: i8,
    pub par_h4: i8,
    pub par_h5: i8,
    pub par_h6: u8,
    pub par_h7: i8,
    // -- calibration coefficients for the gas heater
    pub par_gh1: i8,
    pub par_gh2: i16,
    pub par_gh3: i8,
    pub res_heat_range: u8,
    pub res_heat_val: i8,
    pub range_sw_err: i8,
    loaded: bool,
}

fn le_u16(reg_data: &[u8], offs: usize) -> u16 {
    u16::from_le_bytes([reg_data[offs], reg_data[offs + 1]])
}

fn le_i16(reg_data: &[u8], offs: usize) -> i16 {
    i16::from_le_bytes([reg_data[offs], reg_data[offs + 1]])
}

impl CalibrationSet {
    /// Decodes a complete calibration image. The result is marked loaded.
    pub fn from_bytes(reg_data: &[u8; BME680_LEN_COEFF_ALL]) -> CalibrationSet {
        let h1_h2_lsb = reg_data[CALIB_OFFS_H1_H2_LSB];
        CalibrationSet {
            par_t1: le_u16(reg_data, CALIB_OFFS_T1),
            par_t2: le_i16(reg_data, CALIB_OFFS_T2),
            par_t3: reg_data[CALIB_OFFS_T3] as i8,
            par_p1: le_u16(reg_data, CALIB_OFFS_P1),
            par_p2: le_i16(reg_data, CALIB_OFFS_P2),
            par_p3: reg_data[CALIB_OFFS_P3] as i8,
            par_p4: le_i16(reg_data, CALIB_OFFS_P4),
            par_p5: le_i16(reg_data, CALIB_OFFS_P5),
            par_p6: reg_data[CALIB_OFFS_P6] as i8,
            par_p7: reg_data[CALIB_OFFS_P7] as i8,
            par_p8: le_i16(reg_data, CALIB_OFFS_P8),
            par_p9: le_i16(reg_data, CALIB_OFFS_P9),
            par_p10: reg_data[CALIB_OFFS_P10],
            // -- h1 and h2 share the nibbles of one byte
            par_h1: (reg_data[CALIB_OFFS_H1_MSB] as u16) << BME680_4_BIT_SHIFT
                | (h1_h2_lsb & BME680_4_BIT_MASK) as u16,
            par_h2: (reg_data[CALIB_OFFS_H2_MSB] as u16) << BME680_4_BIT_SHIFT
                | (h1_h2_lsb >> BME680_4_BIT_SHIFT) as u16,
            par_h3: reg_data[CALIB_OFFS_H3] as i8,
            par_h4: reg_data[CALIB_OFFS_H4] as i8,
            par_h5: reg_data[CALIB_OFFS_H5] as i8,
            par_h6: reg_data[CALIB_OFFS_H6],
            par_h7: reg_data[CALIB_OFFS_H7] as i8,
            par_gh1: reg_data[CALIB_OFFS_GH1] as i8,
            par_gh2: le_i16(reg_data, CALIB_OFFS_GH2),
            par_gh3: reg_data[CALIB_OFFS_GH3] as i8,
            res_heat_range: (reg_data[CALIB_OFFS_RES_HEAT_RANGE] & BME680_RES_HEAT_RANGE_MASK) >> BME680_4_BIT_SHIFT,
            res_heat_val: reg_data[CALIB_OFFS_RES_HEAT_VAL] as i8,
            // -- signed upper nibble
            range_sw_err: (reg_data[CALIB_OFFS_RANGE_SW_ERR] & BME680_RANGE_SW_ERR_MASK) as i8 / 16,
            loaded: true,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Reads and decodes the calibration image. Runs only once: when already
    /// loaded it returns the existing set without touching the bus. On failure
    /// the set stays unloaded and unchanged.
    pub fn load<B: BusOps>(&mut self, protocol: &RegisterProtocol<B>) -> Result<&CalibrationSet, Bme680Error> {
        if self.loaded {
            debug!("Calibration data already loaded");
            return Ok(&*self)
        }
        let reg_data = protocol.read_calibration()?;
        *self = CalibrationSet::from_bytes(&reg_data);
        debug!("Got calibration data: {self:#?}");
        Ok(&*self)
    }
}
