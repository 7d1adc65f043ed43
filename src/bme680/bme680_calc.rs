//! Compensation of raw ADC codes, integer arithmetic only.
//!
//! Units: temperature in centidegrees (2350 = 23.50 °C), pressure in Pa,
//! humidity in milli-percent (45123 = 45.123 %RH), gas resistance in ohms.
//! Temperature has to be compensated first in every cycle, its `t_fine`
//! carry feeds pressure and humidity.

use super::bme680_calib::CalibrationSet;
use super::bme680_regs::{BME680_GAS_RANGE_MASK, BME680_HEAT_STAB_BIT};

// -- lookup tables for the gas resistance calculation, indexed by gas range
const GAS_RANGE_LOOKUP_1: [u32; 16] = [
    2147483647, 2147483647, 2147483647, 2147483647, 2147483647, 2126008810, 2147483647, 2130303777,
    2147483647, 2147483647, 2143188679, 2136746228, 2147483647, 2126008810, 2147483647, 2147483647,
];
const GAS_RANGE_LOOKUP_2: [u32; 16] = [
    4096000000, 2048000000, 1024000000, 512000000, 255744255, 127110228, 64000000, 32258064,
    16016016, 8000000, 4000000, 2000000, 1000000, 500000, 250000, 125000,
];

const HUMIDITY_MAX: i64 = 100_000;
const PRESSURE_OVERFLOW_CHECK: i64 = 1 << 30;
const HEATER_TEMP_MAX: u16 = 400;
// -- gas_wait encodes 6 bit mantissa and 2 bit multiplier (x1, x4, x16, x64)
const GAS_WAIT_MAX_MS: u16 = 0xfc0;
const GAS_WAIT_MANTISSA_MAX: u16 = 0x3f;

fn assert_loaded(calib: &CalibrationSet) {
    assert!(calib.is_loaded(), "compensation requested before calibration data was loaded");
}

/// Returns the temperature in centidegrees and the `t_fine` carry.
pub fn compensate_temperature(temperature_raw: u32, calib: &CalibrationSet) -> (i32, i32) {
    assert_loaded(calib);
    let var1 = ((temperature_raw as i64) >> 3) - ((calib.par_t1 as i64) << 1);
    let var2 = (var1 * calib.par_t2 as i64) >> 11;
    let var3 = ((var1 >> 1) * (var1 >> 1)) >> 12;
    let var3 = (var3 * ((calib.par_t3 as i64) << 4)) >> 14;
    let t_fine = (var2 + var3) as i32;
    let temp_comp = (((t_fine as i64) * 5 + 128) >> 8) as i32;
    (temp_comp, t_fine)
}

/// Returns the pressure in Pa.
pub fn compensate_pressure(pressure_raw: u32, calib: &CalibrationSet, t_fine: i32) -> u32 {
    assert_loaded(calib);
    // -- 64 bit intermediates, raw codes out of the valid range must not overflow
    let var1 = ((t_fine as i64) >> 1) - 64000;
    let var2 = ((((var1 >> 2) * (var1 >> 2)) >> 11) * calib.par_p6 as i64) >> 2;
    let var2 = var2 + ((var1 * calib.par_p5 as i64) << 1);
    let var2 = (var2 >> 2) + ((calib.par_p4 as i64) << 16);
    let var1 = (((((var1 >> 2) * (var1 >> 2)) >> 13) * ((calib.par_p3 as i64) << 5)) >> 3)
        + ((calib.par_p2 as i64 * var1) >> 1);
    let var1 = var1 >> 18;
    let var1 = ((32768 + var1) * calib.par_p1 as i64) >> 15;
    if var1 == 0 {
        return 0
    }
    let press_comp = (1048576 - pressure_raw as i64 - (var2 >> 12)) * 3125;
    // -- same rounding as the 32 bit variant, which divides first for large values
    let press_comp = if press_comp >= PRESSURE_OVERFLOW_CHECK {
        (press_comp / var1) << 1
    } else {
        (press_comp << 1) / var1
    };
    let var1 = (calib.par_p9 as i64).saturating_mul(((press_comp >> 3).saturating_mul(press_comp >> 3)) >> 13) >> 12;
    let var2 = (press_comp >> 2).saturating_mul(calib.par_p8 as i64) >> 13;
    let var3 = (press_comp >> 8)
        .saturating_mul(press_comp >> 8)
        .saturating_mul(press_comp >> 8)
        .saturating_mul(calib.par_p10 as i64) >> 17;
    let correction = var1.saturating_add(var2).saturating_add(var3).saturating_add((calib.par_p7 as i64) << 7) >> 4;
    press_comp.saturating_add(correction).clamp(0, u32::MAX as i64) as u32
}

/// Returns the relative humidity in milli-percent, clamped to 0..=100000.
pub fn compensate_humidity(humidity_raw: u16, calib: &CalibrationSet, t_fine: i32) -> u32 {
    assert_loaded(calib);
    // -- widened to 64 bit where the vendor code stays at 32, equal results below saturation
    let temp_scaled = ((t_fine as i64 * 5) + 128) >> 8;
    let var1 = (humidity_raw as i64 - (calib.par_h1 as i64 * 16))
        - (((temp_scaled * calib.par_h3 as i64) / 100) >> 1);
    let var2 = (calib.par_h2 as i64
        * (((temp_scaled * calib.par_h4 as i64) / 100)
            + (((temp_scaled * ((temp_scaled * calib.par_h5 as i64) / 100)) >> 6) / 100)
            + (1 << 14)))
        >> 10;
    let var3 = var1.saturating_mul(var2);
    let var4 = (calib.par_h6 as i64) << 7;
    let var4 = (var4 + ((temp_scaled * calib.par_h7 as i64) / 100)) >> 4;
    let var5 = (var3 >> 14).saturating_mul(var3 >> 14) >> 10;
    let var6 = var4.saturating_mul(var5) >> 1;
    let hum_comp = (var3.saturating_add(var6) >> 10).saturating_mul(1000) >> 12;
    hum_comp.clamp(0, HUMIDITY_MAX) as u32
}

/// Returns the gas resistance in ohms and whether the heater was stable.
///
/// `gas_range_raw` is the gas_r_lsb register: the low nibble selects the
/// range, bit 4 is the heater stability flag. An unstable reading is still
/// computed and returned, only flagged.
pub fn compensate_gas_resistance(gas_raw: u16, gas_range_raw: u8, calib: &CalibrationSet) -> (u32, bool) {
    assert_loaded(calib);
    let gas_range = (gas_range_raw & BME680_GAS_RANGE_MASK) as usize;
    let heat_stab = (gas_range_raw & BME680_HEAT_STAB_BIT) > 0;
    let var1 = ((1340 + 5 * calib.range_sw_err as i64) * GAS_RANGE_LOOKUP_1[gas_range] as i64) >> 16;
    let var2 = ((gas_raw as i64) << 15) - 16777216 + var1;
    let var3 = (GAS_RANGE_LOOKUP_2[gas_range] as i64 * var1) >> 9;
    let gas_res = (var3 + (var2 >> 1)) / var2;
    (gas_res as u32, heat_stab)
}

/// Heater resistance register value for a target temperature, given the
/// ambient temperature in whole °C. Targets above 400 °C are capped.
pub fn calc_res_heat(calib: &CalibrationSet, amb_temp: i32, target_temp: u16) -> u8 {
    assert_loaded(calib);
    let target_temp = target_temp.min(HEATER_TEMP_MAX) as i64;
    let var1 = ((amb_temp as i64 * calib.par_gh3 as i64) / 1000) * 256;
    let var2 = (calib.par_gh1 as i64 + 784)
        * (((((calib.par_gh2 as i64 + 154009) * target_temp * 5) / 100) + 3276800) / 10);
    let var3 = var1 + (var2 / 2);
    let var4 = var3 / (calib.res_heat_range as i64 + 4);
    let var5 = 131 * calib.res_heat_val as i64 + 65536;
    let res_heat_x100 = ((var4 / var5) - 250) * 34;
    ((res_heat_x100 + 50) / 100).clamp(0, u8::MAX as i64) as u8
}

/// Gas wait register value for a heating duration in ms, saturating at 0xff.
pub fn calc_gas_wait(duration_ms: u16) -> u8 {
    if duration_ms >= GAS_WAIT_MAX_MS {
        return 0xff
    }
    let mut duration = duration_ms;
    let mut factor: u8 = 0;
    while duration > GAS_WAIT_MANTISSA_MAX {
        duration /= 4;
        factor += 1;
    }
    duration as u8 + factor * 64
}
