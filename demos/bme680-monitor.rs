use chrono::Local;
use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use std::path::Path;
use std::process::ExitCode;
use std::{thread, time};

use bme680_sensor::bme680::*;

const EXIT_CODE_SET_CTR_C_HNDLR_FAILED: u8 = 0x02;
const EXIT_CODE_BME680_INIT_FAILED: u8 = 0x71;
const EXIT_CODE_BME680_READ_CHANNEL_FAILED: u8 = 0x72;
const EXIT_CODE_BME680_HEATER_PROFILE_FAILED: u8 = 0x73;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BusKind {
    I2c,
    Spi,
}

#[derive(Parser)]
struct Args {
    // -- bus type the sensor is wired to
    #[arg(value_enum)]
    bus_kind: BusKind,
    // -- i2c or spidev bus device
    bus_path: String,
    // -- use the secondary i2c address 0x76
    #[arg(long)]
    secondary: bool,
    // -- delay between measurements in seconds
    #[arg(long, default_value_t = 5)]
    interval: u64,
    // -- run one custom heater cycle (°C) before the measuring loop
    #[arg(long)]
    heater_temp: Option<u16>,
    // -- duration of the custom heater cycle in ms
    #[arg(long, default_value_t = 150)]
    heater_duration: u16,
}

fn log_channels(bme680: &BME680) -> Result<(), Bme680Error> {
    let now = Local::now();
    let temperature = bme680.read_channel(SensorChannel::AmbientTemp)?;
    let pressure = bme680.read_channel(SensorChannel::Press)?;
    let humidity = bme680.read_channel(SensorChannel::Humidity)?;
    let gas_res = bme680.read_channel(SensorChannel::GasRes)?;
    info!("{now}: temperature {temperature} °C, pressure {pressure} kPa, humidity {humidity} %, gas resistance {} Ohm",
        gas_res.val1);
    Ok(())
}

fn main() -> ExitCode {

    // -- read .env file
    dotenv::dotenv().ok();
    // -- setup logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let now = Local::now();
    info!("Starting up: {now}");

    let args = Args::parse();
    let bus_path = Path::new(&args.bus_path);
    let config = match args.bus_kind {
        BusKind::I2c => {
            let dev_addr = if args.secondary { Bme680DeviceAddress::Secondary } else { Bme680DeviceAddress::Default };
            DeviceConfig::i2c(bus_path, dev_addr)
        }
        BusKind::Spi => DeviceConfig::spi(bus_path),
    };

    // -- set handler for Ctrl-C
    if let Err(err) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, terminating...");
        std::process::exit(0);
    }) {
        error!("ERROR - Failed to set Ctrl-C handler: {err}");
        return ExitCode::from(EXIT_CODE_SET_CTR_C_HNDLR_FAILED);
    }

    let settings = Bme680Settings::DEFAULT;
    info!("Using heater profile {}, filter {}", settings.heater_profile, settings.irr_filter);
    let mut bme680 = match BME680::create(config, settings) {
        Ok(bme680) => bme680,
        Err(err) => {
            error!("ERROR - Failed to initialize BME680: {err}");
            return ExitCode::from(EXIT_CODE_BME680_INIT_FAILED);
        }
    };
    let chip_id = bme680.get_chip_id();
    info!("Got chip id {chip_id:#04x}");

    if let Some(heater_temp) = args.heater_temp {
        if let Err(err) = bme680.run_heater_profile(heater_temp, args.heater_duration) {
            error!("ERROR - BME680 failed to run heater profile: {err}");
            return ExitCode::from(EXIT_CODE_BME680_HEATER_PROFILE_FAILED);
        }
        info!("Got custom heater measurement {:#?}", bme680.measurement());
    }

    let measuring_delay = time::Duration::from_secs(args.interval);
    loop {
        // -- a failed cycle keeps the previous values, so just try again next time
        if let Err(err) = bme680.fetch() {
            warn!("BME680 measurement failed: {err}");
            thread::sleep(measuring_delay);
            continue
        }
        let measurement = bme680.measurement();
        if !(measurement.gas_valid && measurement.heater_stable) {
            warn!("Gas reading not valid or heater not stable");
        }
        if let Err(err) = log_channels(&bme680) {
            error!("ERROR - BME680 failed to read channel: {err}");
            return ExitCode::from(EXIT_CODE_BME680_READ_CHANNEL_FAILED);
        }
        // -- delay next measuring
        thread::sleep(measuring_delay);
    }
}
