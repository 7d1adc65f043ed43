#[allow(unused_imports)]
use log::{debug, error, info, warn};
use std::fmt;
use std::{thread, time};

use super::bme680_bus::{Bme680Bus, BusOps, DeviceConfig};
use super::bme680_calc::*;
use super::bme680_calib::CalibrationSet;
use super::bme680_enums::*;
use super::bme680_error::Bme680Error;
use super::bme680_regs::*;

// -- ambient temperature assumed for the heater until the first measurement
const BME680_DEFAULT_AMBIENT_TEMP: i32 = 25;
const BME680_POLL_INTERVAL_MS: u64 = 30;
// -- worst case tph conversion time on top of the heater duration
const BME680_CONVERSION_BUDGET_MS: u64 = 250;

const BME680_DEFAULT_HEATER_PROFILE: Bme680HeaterProfile = if cfg!(feature = "heater-ulp") {
    Bme680HeaterProfile::UltraLowPower
} else {
    Bme680HeaterProfile::LowPower
};

/// Compiled-in measurement settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bme680Settings {
    pub temperature_osr: Bme680OverSampling,
    pub pressure_osr: Bme680OverSampling,
    pub humidity_osr: Bme680OverSampling,
    pub irr_filter: Bme680IrrFilter,
    pub heater_profile: Bme680HeaterProfile,
    /// Sleep between two status polls.
    pub poll_interval_ms: u64,
    /// Status polls before a cycle gives up with a timeout.
    pub max_polls: u32,
}

impl Bme680Settings {
    pub const DEFAULT: Bme680Settings = Bme680Settings {
        temperature_osr: Bme680OverSampling::Oversampling2x,
        pressure_osr: Bme680OverSampling::Oversampling16x,
        humidity_osr: Bme680OverSampling::Oversampling1x,
        irr_filter: Bme680IrrFilter::Coef3,
        heater_profile: BME680_DEFAULT_HEATER_PROFILE,
        poll_interval_ms: BME680_POLL_INTERVAL_MS,
        max_polls: Self::poll_bound(BME680_DEFAULT_HEATER_PROFILE, BME680_POLL_INTERVAL_MS),
    };

    /// Enough polls to cover the heater duration plus the conversion itself.
    pub const fn poll_bound(heater_profile: Bme680HeaterProfile, poll_interval_ms: u64) -> u32 {
        let budget_ms = heater_profile.duration_ms() as u64 + BME680_CONVERSION_BUDGET_MS;
        if poll_interval_ms == 0 {
            return budget_ms as u32
        }
        (budget_ms / poll_interval_ms) as u32 + 1
    }

    /// Poll bound for one cycle with the given heater set point, never below `max_polls`.
    pub fn polls_for(&self, heater_profile: Bme680HeaterProfile) -> u32 {
        if self.poll_interval_ms == 0 {
            return self.max_polls
        }
        self.max_polls.max(Self::poll_bound(heater_profile, self.poll_interval_ms))
    }
}

impl Default for Bme680Settings {
    fn default() -> Self {
        Bme680Settings::DEFAULT
    }
}

/// Phases of one forced measurement cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bme680Phase {
    Idle,
    Configuring,
    Triggered,
    AwaitingData,
    Ready,
}

/// Compensated values of one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bme680Measurement {
    /// Centidegrees Celsius.
    pub temperature: i32,
    /// Pa.
    pub pressure: u32,
    /// Milli-percent relative humidity.
    pub humidity: u32,
    /// Ohms.
    pub gas_resistance: u32,
    pub heater_stable: bool,
    pub gas_valid: bool,
}

/// Per-instance measurement state, replaced as a whole after a successful cycle.
#[derive(Clone, Copy, Debug, Default)]
struct MeasurementState {
    field_data: Bme680FieldData,
    measurement: Bme680Measurement,
    t_fine: i32,
    // -- set once the first cycle succeeded
    valid: bool,
}

/// Value of one channel as integer part plus millionths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SensorValue {
    pub val1: i32,
    pub val2: i32,
}

impl SensorValue {
    fn from_scaled(value: i64, scale: i64) -> SensorValue {
        let val1 = (value / scale).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        let val2 = ((value % scale) * (1_000_000 / scale)) as i32;
        SensorValue { val1, val2 }
    }

    pub fn as_f64(&self) -> f64 {
        self.val1 as f64 + self.val2 as f64 / 1_000_000.0
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.6}", self.as_f64())
    }
}

/// Generic sensor contract: fetch a sample, then read channels from it.
pub trait SensorDriver {
    type Error;

    /// Runs one complete measurement cycle and caches the result.
    fn fetch(&mut self) -> Result<(), Self::Error>;

    /// Returns the cached value of a channel without touching the bus.
    fn read_channel(&self, channel: SensorChannel) -> Result<SensorValue, Self::Error>;
}

/// BME680 specific extension contract.
pub trait Bme680Ext {
    type Error;

    /// Runs one forced cycle with the given heater set point right away.
    fn run_heater_profile(&mut self, temp_c: u16, duration_ms: u16) -> Result<(), Self::Error>;

    /// Chip identifier read during initialization.
    fn get_chip_id(&self) -> u8;
}

/// BME680 driver instance, owning its bus, calibration and measurement state.
///
/// `fetch` and `run_heater_profile` block the calling thread for the whole
/// conversion: the status register is polled with a real sleep in between,
/// bounded by `Bme680Settings::polls_for` the programmed heater profile.
/// Callers sharing an instance between threads have to serialize access themselves.
pub struct BME680<B: BusOps = Bme680Bus> {
    // -- register access over the configured bus
    protocol: RegisterProtocol<B>,
    settings: Bme680Settings,
    // -- chip id, 0 until read
    chip_id: u8,
    calib: CalibrationSet,
    state: MeasurementState,
    phase: Bme680Phase,
    ready: bool,
}

impl BME680<Bme680Bus> {
    /// Builds and initializes a driver instance, the only way to obtain a ready device.
    pub fn create(config: DeviceConfig<Bme680Bus>, settings: Bme680Settings) -> Result<BME680<Bme680Bus>, Bme680Error> {
        info!("Initializing BME680 on {}", config.bus());
        Self::create_on(config, settings)
    }
}

impl<B: BusOps> BME680<B> {

    /// Creates an instance without any bus traffic, `init` has to follow.
    pub fn new(config: DeviceConfig<B>, settings: Bme680Settings) -> BME680<B> {
        BME680 {
            protocol: RegisterProtocol::new(config.into_bus()),
            settings,
            chip_id: 0,
            calib: CalibrationSet::default(),
            state: MeasurementState::default(),
            phase: Bme680Phase::Idle,
            ready: false,
        }
    }

    pub fn create_on(config: DeviceConfig<B>, settings: Bme680Settings) -> Result<BME680<B>, Bme680Error> {
        let mut bme680 = BME680::new(config, settings);
        bme680.init()?;
        Ok(bme680)
    }

    /// Checks the bus, resets the chip, verifies its identity, loads the
    /// calibration data and programs the configured settings.
    pub fn init(&mut self) -> Result<(), Bme680Error> {
        if self.ready {
            return Ok(())
        }
        // -- check if the bus is usable at all
        if !self.protocol.check() {
            error!("Bus not ready");
            return Err(Bme680Error::BusNotReady)
        }
        // -- do a soft reset since it's in an unknown state
        self.protocol.soft_reset()?;
        // -- check if device is available by reading chip id
        let chip_id = self.protocol.read_chip_id()?;
        self.chip_id = chip_id;
        if chip_id != BME680_CHIP_ID {
            error!("Bad chip id {chip_id:#04x}, expected {BME680_CHIP_ID:#04x}");
            return Err(Bme680Error::BadChipId { found: chip_id, expected: BME680_CHIP_ID })
        }
        debug!("Got chip id: {chip_id:#x}");
        self.calib.load(&self.protocol)?;
        // -- humidity oversampling only takes effect with the next ctrl_meas write
        let settings = self.settings;
        self.protocol.set_humidity_osr(settings.humidity_osr)?;
        self.protocol.set_irr_filter(settings.irr_filter)?;
        self.program_heater(settings.heater_profile)?;
        self.protocol.set_ctrl_meas(settings.temperature_osr, settings.pressure_osr, Bme680SensorPowerMode::Sleep)?;
        self.ready = true;
        info!("BME680 ready, chip id {chip_id:#04x}, heater profile {}", settings.heater_profile);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn phase(&self) -> Bme680Phase {
        self.phase
    }

    pub fn settings(&self) -> &Bme680Settings {
        &self.settings
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calib
    }

    /// Last successfully measured values, all zero before the first cycle.
    pub fn measurement(&self) -> Bme680Measurement {
        self.state.measurement
    }

    /// Raw field data and `t_fine` carry of the last successful cycle.
    pub fn raw_data(&self) -> Option<(Bme680FieldData, i32)> {
        self.state.valid.then_some((self.state.field_data, self.state.t_fine))
    }

    pub fn release(self) -> B {
        self.protocol.into_inner()
    }

    #[cfg(test)]
    pub(crate) fn bus_mut(&mut self) -> &mut B {
        self.protocol.bus_mut()
    }

    fn set_phase(&mut self, phase: Bme680Phase) {
        debug!("Measurement phase {:?} -> {phase:?}", self.phase);
        self.phase = phase;
    }

    fn ambient_temp(&self) -> i32 {
        if self.state.valid {
            self.state.measurement.temperature / 100
        } else {
            BME680_DEFAULT_AMBIENT_TEMP
        }
    }

    fn program_heater(&self, heater_profile: Bme680HeaterProfile) -> Result<(), Bme680Error> {
        let res_heat = calc_res_heat(&self.calib, self.ambient_temp(), heater_profile.target_temp());
        let gas_wait = calc_gas_wait(heater_profile.duration_ms());
        self.protocol.set_heater_profile_0(res_heat, gas_wait)?;
        Ok(())
    }

    fn await_new_data(&self, max_polls: u32) -> Result<Bme680FieldData, Bme680Error> {
        let poll_delay = time::Duration::from_millis(self.settings.poll_interval_ms);
        for _ in 0..max_polls {
            thread::sleep(poll_delay);
            let status = self.protocol.read_meas_status()?;
            debug!("Got measuring status {status:?}");
            if status.new_data {
                return Ok(self.protocol.read_field_data()?)
            }
        }
        warn!("No new data after {max_polls} polls");
        Err(Bme680Error::Timeout { polls: max_polls })
    }

    fn measure(&mut self, heater_profile: Bme680HeaterProfile) -> Result<MeasurementState, Bme680Error> {
        if !self.calib.is_loaded() {
            return Err(Bme680Error::NotCalibrated)
        }
        self.set_phase(Bme680Phase::Configuring);
        self.program_heater(heater_profile)?;
        self.set_phase(Bme680Phase::Triggered);
        self.protocol.set_ctrl_meas(self.settings.temperature_osr, self.settings.pressure_osr,
            Bme680SensorPowerMode::Forced)?;
        self.set_phase(Bme680Phase::AwaitingData);
        // -- the chip only raises new data after the heater time has passed
        let field_data = self.await_new_data(self.settings.polls_for(heater_profile))?;
        self.set_phase(Bme680Phase::Ready);
        // -- temperature first, its carry feeds the other channels
        let (temperature, t_fine) = compensate_temperature(field_data.temperature_raw, &self.calib);
        let pressure = compensate_pressure(field_data.pressure_raw, &self.calib, t_fine);
        let humidity = compensate_humidity(field_data.humidity_raw, &self.calib, t_fine);
        let (gas_resistance, heater_stable) =
            compensate_gas_resistance(field_data.gas_raw, field_data.gas_range_raw, &self.calib);
        let gas_valid = field_data.gas_range_raw & BME680_GAS_VALID_BIT > 0;
        if !heater_stable {
            warn!("Heater not stable, gas resistance {gas_resistance} is unreliable");
        }
        let measurement = Bme680Measurement {
            temperature, pressure, humidity, gas_resistance, heater_stable, gas_valid,
        };
        debug!("Got measurement {measurement:?}");
        Ok(MeasurementState { field_data, measurement, t_fine, valid: true })
    }

    fn run_cycle(&mut self, heater_profile: Bme680HeaterProfile) -> Result<(), Bme680Error> {
        if !self.ready {
            return Err(Bme680Error::DeviceNotReady)
        }
        let result = self.measure(heater_profile);
        self.set_phase(Bme680Phase::Idle);
        // -- publish only complete cycles, a failure keeps the previous values
        self.state = result?;
        Ok(())
    }
}

impl<B: BusOps> SensorDriver for BME680<B> {
    type Error = Bme680Error;

    fn fetch(&mut self) -> Result<(), Bme680Error> {
        let heater_profile = self.settings.heater_profile;
        self.run_cycle(heater_profile)
    }

    fn read_channel(&self, channel: SensorChannel) -> Result<SensorValue, Bme680Error> {
        let measurement = &self.state.measurement;
        match channel {
            SensorChannel::AmbientTemp => Ok(SensorValue::from_scaled(measurement.temperature as i64, 100)),
            // -- kPa
            SensorChannel::Press => Ok(SensorValue::from_scaled(measurement.pressure as i64, 1000)),
            SensorChannel::Humidity => Ok(SensorValue::from_scaled(measurement.humidity as i64, 1000)),
            SensorChannel::GasRes => Ok(SensorValue::from_scaled(measurement.gas_resistance as i64, 1)),
            _ => Err(Bme680Error::UnsupportedChannel(channel)),
        }
    }
}

impl<B: BusOps> Bme680Ext for BME680<B> {
    type Error = Bme680Error;

    fn run_heater_profile(&mut self, temp_c: u16, duration_ms: u16) -> Result<(), Bme680Error> {
        if !self.ready {
            return Err(Bme680Error::DeviceNotReady)
        }
        if duration_ms == 0 {
            return Err(Bme680Error::InvalidHeaterProfile(format!("zero duration at {temp_c}C")))
        }
        info!("Running heater at {temp_c}C for {duration_ms}ms");
        self.run_cycle(Bme680HeaterProfile::Custom { temp_c, duration_ms })
    }

    fn get_chip_id(&self) -> u8 {
        self.chip_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bme680::bme680_bus::{MemPage, SpiBus};
    use crate::bme680::bme680_fake::{FakeBus, FakeSpiLink, CALIB_IMAGE, FIELD_BLOCK};
    use test_log::test;

    fn test_settings() -> Bme680Settings {
        Bme680Settings { poll_interval_ms: 0, max_polls: 5, ..Bme680Settings::DEFAULT }
    }

    fn ready_device() -> BME680<FakeBus> {
        BME680::create_on(DeviceConfig::new(FakeBus::with_chip()), test_settings()).unwrap()
    }

    fn channels(bme680: &BME680<FakeBus>) -> Vec<SensorValue> {
        [SensorChannel::AmbientTemp, SensorChannel::Press, SensorChannel::Humidity, SensorChannel::GasRes]
            .iter()
            .map(|channel| bme680.read_channel(*channel).unwrap())
            .collect()
    }

    #[test]
    fn init_resets_verifies_and_configures() {
        let mut bme680 = ready_device();
        assert!(bme680.is_ready());
        assert_eq!(bme680.get_chip_id(), BME680_CHIP_ID);
        assert!(bme680.calibration().is_loaded());
        let bus = bme680.bus_mut();
        assert_eq!(bus.resets, 1);
        assert_eq!(bus.writes_to(BME680_REG_CTRL_HUM), vec![0x01]);
        assert_eq!(bus.writes_to(BME680_REG_CONFIG), vec![0x08]);
        assert_eq!(bus.writes_to(BME680_REG_RES_HEAT_0), vec![116]);
        assert_eq!(bus.writes_to(BME680_REG_GAS_WAIT_0), vec![0x71]);
        assert_eq!(bus.writes_to(BME680_REG_CTRL_GAS_1), vec![0x10]);
        // -- osrs_t x2, osrs_p x16, sleep
        assert_eq!(bus.writes_to(BME680_REG_CTRL_MEAS), vec![0b010_101_00]);
    }

    #[test]
    fn bad_chip_id_never_reaches_ready() {
        let mut bus = FakeBus::with_chip();
        bus.regs[BME680_REG_CHIP_ID as usize] = 0x60;
        let mut bme680 = BME680::new(DeviceConfig::new(bus), test_settings());
        let err = bme680.init().unwrap_err();
        assert!(matches!(err, Bme680Error::BadChipId { found: 0x60, expected: 0x61 }));
        assert!(!bme680.is_ready());
        assert_eq!(bme680.get_chip_id(), 0x60);
        assert!(matches!(bme680.fetch(), Err(Bme680Error::DeviceNotReady)));
        assert!(matches!(bme680.run_heater_profile(320, 150), Err(Bme680Error::DeviceNotReady)));
        assert!(!bme680.calibration().is_loaded());
    }

    #[test]
    fn create_fails_on_bad_chip_id() {
        let mut bus = FakeBus::with_chip();
        bus.regs[BME680_REG_CHIP_ID as usize] = 0x55;
        let result = BME680::create_on(DeviceConfig::new(bus), test_settings());
        assert!(matches!(result, Err(Bme680Error::BadChipId { found: 0x55, .. })));
    }

    #[test]
    fn bus_not_ready_stops_init_before_any_traffic() {
        let mut bus = FakeBus::with_chip();
        bus.ready = false;
        let mut bme680 = BME680::new(DeviceConfig::new(bus), test_settings());
        assert!(matches!(bme680.init(), Err(Bme680Error::BusNotReady)));
        assert!(!bme680.is_ready());
        let bus = bme680.release();
        assert!(bus.writes.is_empty());
        assert!(bus.reads.is_empty());
    }

    #[test]
    fn fetch_compensates_reference_block() {
        let mut bme680 = ready_device();
        bme680.fetch().unwrap();
        assert_eq!(bme680.phase(), Bme680Phase::Idle);
        assert_eq!(bme680.measurement(), Bme680Measurement {
            temperature: 3282,
            pressure: 97357,
            humidity: 59270,
            gas_resistance: 239245,
            heater_stable: true,
            gas_valid: true,
        });
        assert_eq!(channels(&bme680), vec![
            SensorValue { val1: 32, val2: 820000 },
            SensorValue { val1: 97, val2: 357000 },
            SensorValue { val1: 59, val2: 270000 },
            SensorValue { val1: 239245, val2: 0 },
        ]);
        let (field_data, t_fine) = bme680.raw_data().unwrap();
        assert_eq!(field_data.temperature_raw, 0x7fff0);
        assert_eq!(t_fine, 168033);
        // -- forced mode trigger after the sleep mode write of init
        assert_eq!(bme680.bus_mut().writes_to(BME680_REG_CTRL_MEAS), vec![0b010_101_00, 0b010_101_01]);
    }

    #[test]
    fn fetch_programs_heater_before_trigger() {
        let mut bme680 = ready_device();
        bme680.bus_mut().writes.clear();
        bme680.fetch().unwrap();
        let writes: Vec<u8> = bme680.bus_mut().writes.iter().map(|(reg, _)| *reg).collect();
        assert_eq!(writes, vec![
            BME680_REG_RES_HEAT_0, BME680_REG_GAS_WAIT_0, BME680_REG_CTRL_GAS_1, BME680_REG_CTRL_MEAS,
        ]);
    }

    #[test]
    fn read_channel_does_no_io() {
        let mut bme680 = ready_device();
        bme680.fetch().unwrap();
        let reads = bme680.bus_mut().reads.len();
        channels(&bme680);
        assert_eq!(bme680.bus_mut().reads.len(), reads);
    }

    #[test]
    fn unsupported_channels_are_rejected() {
        let bme680 = ready_device();
        for channel in [SensorChannel::Altitude, SensorChannel::DieTemp, SensorChannel::Voc] {
            assert!(matches!(bme680.read_channel(channel), Err(Bme680Error::UnsupportedChannel(c)) if c == channel));
        }
    }

    #[test]
    fn timeout_returns_to_idle_and_keeps_values() {
        let mut bme680 = ready_device();
        bme680.fetch().unwrap();
        let before = channels(&bme680);
        bme680.bus_mut().new_data_after = None;
        let err = bme680.fetch().unwrap_err();
        assert!(matches!(err, Bme680Error::Timeout { polls: 5 }));
        assert_eq!(bme680.phase(), Bme680Phase::Idle);
        assert_eq!(channels(&bme680), before);
        // -- the instance stays usable
        bme680.bus_mut().new_data_after = Some(3);
        bme680.fetch().unwrap();
        assert_eq!(bme680.measurement().temperature, 3282);
    }

    #[test]
    fn failed_cycle_keeps_previous_values() {
        let mut bme680 = ready_device();
        bme680.fetch().unwrap();
        let before = channels(&bme680);
        let mut block = FIELD_BLOCK;
        block[5] = 0x7a;
        block[6] = 0x12;
        block[7] = 0x00;
        bme680.bus_mut().set_field_block(&block);
        // -- the trigger write fails, the new block is never read
        bme680.bus_mut().fail_write_at = Some(BME680_REG_CTRL_MEAS);
        assert!(matches!(bme680.fetch(), Err(Bme680Error::Io(_))));
        assert_eq!(bme680.phase(), Bme680Phase::Idle);
        assert_eq!(channels(&bme680), before);
        bme680.bus_mut().fail_write_at = None;
        bme680.fetch().unwrap();
        assert_eq!(bme680.measurement().temperature, 2523);
    }

    #[test]
    fn unstable_heater_is_flagged_not_suppressed() {
        let mut bme680 = ready_device();
        let mut block = FIELD_BLOCK;
        block[14] &= !BME680_HEAT_STAB_BIT;
        bme680.bus_mut().set_field_block(&block);
        bme680.fetch().unwrap();
        let measurement = bme680.measurement();
        assert!(!measurement.heater_stable);
        assert_eq!(measurement.gas_resistance, 239245);
        assert_eq!(measurement.temperature, 3282);
        assert_eq!(bme680.read_channel(SensorChannel::GasRes).unwrap().val1, 239245);
    }

    #[test]
    fn heater_uses_last_measured_ambient_temperature() {
        let mut bme680 = ready_device();
        bme680.fetch().unwrap();
        bme680.bus_mut().writes.clear();
        bme680.run_heater_profile(400, 100).unwrap();
        let expected = calc_res_heat(bme680.calibration(), 32, 400);
        assert_eq!(bme680.bus_mut().writes_to(BME680_REG_RES_HEAT_0), vec![expected]);
        assert_eq!(bme680.bus_mut().writes_to(BME680_REG_GAS_WAIT_0), vec![calc_gas_wait(100)]);
    }

    #[test]
    fn run_heater_profile_triggers_forced_cycle() {
        let mut bme680 = ready_device();
        bme680.bus_mut().writes.clear();
        bme680.run_heater_profile(320, 150).unwrap();
        let bus = bme680.bus_mut();
        assert_eq!(bus.writes_to(BME680_REG_RES_HEAT_0), vec![116]);
        assert_eq!(bus.writes_to(BME680_REG_GAS_WAIT_0), vec![calc_gas_wait(150)]);
        assert_eq!(bus.writes_to(BME680_REG_CTRL_GAS_1), vec![0x10]);
        assert_eq!(bus.writes_to(BME680_REG_CTRL_MEAS), vec![0b010_101_01]);
        assert_eq!(bme680.measurement().gas_resistance, 239245);
    }

    #[test]
    fn long_heater_cycle_waits_for_its_own_duration() {
        let settings = Bme680Settings { poll_interval_ms: 1, max_polls: 5, ..Bme680Settings::DEFAULT };
        let mut bus = FakeBus::with_chip();
        // -- new data shows up well after the configured poll bound ran out
        bus.new_data_after = Some(200);
        let mut bme680 = BME680::create_on(DeviceConfig::new(bus), settings).unwrap();
        bme680.run_heater_profile(400, 1943).unwrap();
        assert_eq!(bme680.bus_mut().writes_to(BME680_REG_GAS_WAIT_0), vec![0x71, 0xde]);
        assert_eq!(bme680.measurement().temperature, 3282);
        assert_eq!(bme680.phase(), Bme680Phase::Idle);
    }

    #[test]
    fn poll_bound_follows_heater_duration() {
        let settings = Bme680Settings::DEFAULT;
        let ulp = Bme680HeaterProfile::Custom { temp_c: 400, duration_ms: 1943 };
        assert_eq!(settings.polls_for(ulp), 74);
        assert_eq!(settings.polls_for(Bme680HeaterProfile::LowPower), settings.max_polls);
        // -- short custom cycles keep the configured bound
        let short = Bme680HeaterProfile::Custom { temp_c: 300, duration_ms: 10 };
        assert_eq!(settings.polls_for(short), settings.max_polls);
        assert_eq!(test_settings().polls_for(ulp), 5);
    }

    #[test]
    fn saturated_field_block_does_not_panic() {
        let mut bme680 = ready_device();
        bme680.bus_mut().set_field_block(&[0xff; BME680_LEN_FIELD]);
        bme680.fetch().unwrap();
        let measurement = bme680.measurement();
        assert!(measurement.humidity <= 100_000);
        assert!(measurement.heater_stable);
        assert!(measurement.gas_valid);
    }

    #[test]
    fn init_and_fetch_over_four_wire_bus() {
        let bus = SpiBus::new(FakeSpiLink::with_chip());
        let mut bme680 = BME680::create_on(DeviceConfig::new(bus), test_settings()).unwrap();
        assert_eq!(bme680.get_chip_id(), BME680_CHIP_ID);
        assert_eq!(bme680.calibration(), &CalibrationSet::from_bytes(&CALIB_IMAGE));
        let link = bme680.bus_mut().link_mut();
        // -- page select, reset, latch sync, chip id on page 0, three calibration spans
        assert_eq!(link.transfers[..10].to_vec(), vec![
            (0xf3, 1), (0x73, 1), (0x60, 1), (0xf3, 1), (0xd0, 1),
            (0x8a, 23), (0xe1, 14), (0xf3, 1), (0x73, 1), (0x80, 5),
        ]);
        assert_eq!(link.status_writes(), 2);
        assert_eq!(link.regs[BME680_REG_CTRL_HUM as usize], 0x01);
        assert_eq!(link.regs[BME680_REG_RES_HEAT_0 as usize], 116);
        bme680.fetch().unwrap();
        assert_eq!(bme680.measurement().temperature, 3282);
        assert_eq!(bme680.measurement().gas_resistance, 239245);
        assert_eq!(bme680.bus_mut().current_page(), Some(MemPage::Page1));
    }

    #[test]
    fn run_heater_profile_rejects_zero_duration() {
        let mut bme680 = ready_device();
        bme680.bus_mut().writes.clear();
        let err = bme680.run_heater_profile(320, 0).unwrap_err();
        assert!(matches!(err, Bme680Error::InvalidHeaterProfile(_)));
        assert!(bme680.bus_mut().writes.is_empty());
    }

    #[test]
    fn init_is_not_reentered() {
        let mut bme680 = ready_device();
        bme680.init().unwrap();
        assert_eq!(bme680.bus_mut().resets, 1);
    }

    #[test]
    fn values_before_first_fetch_are_zero() {
        let bme680 = ready_device();
        assert!(bme680.raw_data().is_none());
        assert_eq!(bme680.read_channel(SensorChannel::AmbientTemp).unwrap(), SensorValue::default());
    }

    #[test]
    fn sensor_value_splits_fraction() {
        assert_eq!(SensorValue::from_scaled(-1234, 100), SensorValue { val1: -12, val2: -340000 });
        assert_eq!(SensorValue::from_scaled(101325, 1000), SensorValue { val1: 101, val2: 325000 });
        assert_eq!(SensorValue { val1: 2, val2: 500000 }.as_f64(), 2.5);
        assert_eq!(SensorValue::from_scaled(u32::MAX as i64, 1).val1, i32::MAX);
    }

    #[test]
    fn default_poll_bound_covers_heater() {
        let settings = Bme680Settings::DEFAULT;
        let covered = settings.max_polls as u64 * settings.poll_interval_ms;
        assert!(covered >= settings.heater_profile.duration_ms() as u64);
        assert_eq!(Bme680Settings::poll_bound(Bme680HeaterProfile::LowPower, 30), 15);
    }
}
