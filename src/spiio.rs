use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use std::path::Path;

// -- the bme680 accepts spi mode 0 and 3, mode 3 keeps the clock idle high
const SPI_BITS_PER_WORD: u8 = 8;
const SPI_MAX_SPEED_HZ: u32 = 1_000_000;

pub fn get_bus(bus_path: &Path) -> Result<Spidev, std::io::Error> {
    let mut spi = Spidev::open(bus_path)?;
    let options = SpidevOptions::new()
        .bits_per_word(SPI_BITS_PER_WORD)
        .max_speed_hz(SPI_MAX_SPEED_HZ)
        .lsb_first(false)
        .mode(SpiModeFlags::SPI_MODE_3)
        .build();
    spi.configure(&options)?;
    Ok(spi)
}

// -- full duplex transfer, chip select stays asserted for the whole buffer
pub fn transfer(spi: &mut Spidev, tx: &[u8], rx: &mut [u8]) -> Result<(), std::io::Error> {
    let mut transfer = SpidevTransfer::read_write(tx, rx);
    spi.transfer(&mut transfer)
}
