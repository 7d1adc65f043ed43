use i2c_linux::I2c;
#[allow(unused_imports)]
use log::{debug, info, warn};
use spidev::Spidev;
use std::fmt;
use std::fs::File;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

use crate::{i2cio, spiio};

use super::bme680_enums::Bme680DeviceAddress;
use super::bme680_regs::BME680_REG_STATUS;

// -- four-wire addressing: bit 7 of the address byte selects read/write
const BME680_SPI_READ_BIT: u8 = 0x80;
const BME680_SPI_WRITE_MASK: u8 = 0x7f;
// -- memory page latch, bit 4 of the status register
const BME680_SPI_MEM_PAGE_MASK: u8 = 0x10;
const BME680_SPI_MEM_PAGE_SHR: u8 = 4;

/// Capability set every transport offers to the register protocol.
///
/// Reads are non-destructive and fill the whole buffer starting at `start`,
/// writes touch exactly one register. Implementations are not reentrant, the
/// register protocol serializes access.
pub trait BusOps {
    /// Returns whether the bus is usable, opening the underlying device if needed.
    fn check(&mut self) -> bool;

    fn read(&mut self, start: u8, data: &mut [u8]) -> Result<(), std::io::Error>;

    fn write(&mut self, register: u8, value: u8) -> Result<(), std::io::Error>;

    /// Re-reads transport state the chip may have changed behind our back (soft reset).
    fn sync(&mut self) -> Result<(), std::io::Error> {
        Ok(())
    }
}

fn not_connected(bus_path: &Path) -> Error {
    Error::new(ErrorKind::NotConnected, format!("Bus {} is not open", bus_path.display()))
}

fn check_span(start: u8, len: usize) -> Result<(), std::io::Error> {
    if start as usize + len > 0x100 {
        let errmsg = format!("Read of {len} bytes at {start:#04x} runs past the register map");
        return Err(Error::new(ErrorKind::InvalidInput, errmsg))
    }
    Ok(())
}

/// Two-wire transport, addressed through a fixed slave address.
pub struct I2cBus {
    // -- i2c bus device path
    bus_path: PathBuf,
    // -- device address
    device_addr: Bme680DeviceAddress,
    // -- opened bus, None until the first successful check
    i2c: Option<I2c<File>>,
}

impl I2cBus {
    pub fn new(bus_path: &Path, device_addr: Bme680DeviceAddress) -> I2cBus {
        I2cBus { bus_path: bus_path.to_path_buf(), device_addr, i2c: None }
    }

    pub fn get_device_addr(&self) -> Bme680DeviceAddress {
        self.device_addr.clone()
    }

    fn open(&mut self) -> Result<(), std::io::Error> {
        let mut i2c = i2cio::get_bus(&self.bus_path)?;
        i2cio::set_slave(&mut i2c, self.device_addr.value())?;
        self.i2c = Some(i2c);
        Ok(())
    }
}

impl BusOps for I2cBus {
    fn check(&mut self) -> bool {
        if self.i2c.is_some() {
            return true
        }
        match self.open() {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to open i2c bus {}: {err}", self.bus_path.display());
                false
            }
        }
    }

    fn read(&mut self, start: u8, data: &mut [u8]) -> Result<(), std::io::Error> {
        check_span(start, data.len())?;
        let i2c = self.i2c.as_mut().ok_or_else(|| not_connected(&self.bus_path))?;
        if data.len() == 1 {
            data[0] = i2cio::read_byte(i2c, start)?;
            return Ok(())
        }
        i2cio::read_block(i2c, start, data)
    }

    fn write(&mut self, register: u8, value: u8) -> Result<(), std::io::Error> {
        let i2c = self.i2c.as_mut().ok_or_else(|| not_connected(&self.bus_path))?;
        i2cio::write_byte(i2c, register, value)
    }
}

/// Raw four-wire byte exchange, chip select held for the whole buffer.
pub trait SpiLink {
    fn check(&mut self) -> bool;

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), std::io::Error>;
}

/// Linux spidev backed link.
pub struct SpidevLink {
    bus_path: PathBuf,
    spi: Option<Spidev>,
}

impl SpidevLink {
    pub fn new(bus_path: &Path) -> SpidevLink {
        SpidevLink { bus_path: bus_path.to_path_buf(), spi: None }
    }
}

impl SpiLink for SpidevLink {
    fn check(&mut self) -> bool {
        if self.spi.is_some() {
            return true
        }
        match spiio::get_bus(&self.bus_path) {
            Ok(spi) => {
                self.spi = Some(spi);
                true
            }
            Err(err) => {
                warn!("Failed to open spi bus {}: {err}", self.bus_path.display());
                false
            }
        }
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), std::io::Error> {
        let spi = self.spi.as_mut().ok_or_else(|| not_connected(&self.bus_path))?;
        spiio::transfer(spi, tx, rx)
    }
}

/// One of the two register banks seen through the four-wire interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemPage {
    /// Registers 0x80..=0xff.
    Page0,
    /// Registers 0x00..=0x7f.
    Page1,
}

impl MemPage {
    pub fn of(register: u8) -> MemPage {
        if register > 0x7f { MemPage::Page0 } else { MemPage::Page1 }
    }

    fn from_status(status: u8) -> MemPage {
        if (status & BME680_SPI_MEM_PAGE_MASK) >> BME680_SPI_MEM_PAGE_SHR == 1 {
            MemPage::Page1
        } else {
            MemPage::Page0
        }
    }
}

/// Four-wire transport. The chip only decodes 7 address bits, so the register
/// map is split into two pages and the page latch lives in the status register
/// (which itself is visible from both pages).
pub struct SpiBus<L: SpiLink = SpidevLink> {
    link: L,
    // -- currently latched page, None until known
    mem_page: Option<MemPage>,
}

impl<L: SpiLink> SpiBus<L> {
    pub fn new(link: L) -> SpiBus<L> {
        SpiBus { link, mem_page: None }
    }

    pub fn current_page(&self) -> Option<MemPage> {
        self.mem_page
    }

    #[cfg(test)]
    pub(crate) fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn read_raw(&mut self, register: u8, data: &mut [u8]) -> Result<(), std::io::Error> {
        let mut tx = vec![0u8; data.len() + 1];
        let mut rx = vec![0u8; data.len() + 1];
        tx[0] = register | BME680_SPI_READ_BIT;
        self.link.transfer(&tx, &mut rx)?;
        data.copy_from_slice(&rx[1..]);
        Ok(())
    }

    fn write_raw(&mut self, register: u8, value: u8) -> Result<(), std::io::Error> {
        let tx = [register & BME680_SPI_WRITE_MASK, value];
        let mut rx = [0u8; 2];
        self.link.transfer(&tx, &mut rx)
    }

    fn select_page(&mut self, register: u8) -> Result<(), std::io::Error> {
        if register == BME680_REG_STATUS {
            return Ok(())
        }
        let page = MemPage::of(register);
        if self.mem_page == Some(page) {
            return Ok(())
        }
        // -- read current status, flip the page bit and write it back
        let mut status = [0u8; 1];
        self.read_raw(BME680_REG_STATUS, &mut status)?;
        let status = match page {
            MemPage::Page0 => status[0] & !BME680_SPI_MEM_PAGE_MASK,
            MemPage::Page1 => status[0] | BME680_SPI_MEM_PAGE_MASK,
        };
        debug!("Selecting memory page {page:?} for register {register:#04x}");
        self.write_raw(BME680_REG_STATUS, status)?;
        self.mem_page = Some(page);
        Ok(())
    }
}

impl<L: SpiLink> BusOps for SpiBus<L> {
    fn check(&mut self) -> bool {
        self.link.check()
    }

    fn read(&mut self, start: u8, data: &mut [u8]) -> Result<(), std::io::Error> {
        check_span(start, data.len())?;
        let mut offset = 0;
        // -- split the burst into runs that stay within one page
        while offset < data.len() {
            let register = start + offset as u8;
            let page = MemPage::of(register);
            let mut run = 1;
            while offset + run < data.len() && MemPage::of(start + (offset + run) as u8) == page {
                run += 1;
            }
            self.select_page(register)?;
            self.read_raw(register, &mut data[offset..offset + run])?;
            offset += run;
        }
        Ok(())
    }

    fn write(&mut self, register: u8, value: u8) -> Result<(), std::io::Error> {
        self.select_page(register)?;
        self.write_raw(register, value)
    }

    fn sync(&mut self) -> Result<(), std::io::Error> {
        let mut status = [0u8; 1];
        self.read_raw(BME680_REG_STATUS, &mut status)?;
        let page = MemPage::from_status(status[0]);
        debug!("Memory page latch is {page:?}");
        self.mem_page = Some(page);
        Ok(())
    }
}

/// The bus a device instance talks over. Exactly one variant is chosen at
/// construction and never changes.
pub enum Bme680Bus {
    I2c(I2cBus),
    Spi(SpiBus<SpidevLink>),
}

impl fmt::Display for Bme680Bus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::I2c(bus) => write!(f, "i2c {}@{:#04x}", bus.bus_path.display(), bus.device_addr.value()),
            Self::Spi(bus) => write!(f, "spi {}", bus.link.bus_path.display()),
        }
    }
}

impl BusOps for Bme680Bus {
    fn check(&mut self) -> bool {
        match self {
            Self::I2c(bus) => bus.check(),
            Self::Spi(bus) => bus.check(),
        }
    }

    fn read(&mut self, start: u8, data: &mut [u8]) -> Result<(), std::io::Error> {
        match self {
            Self::I2c(bus) => bus.read(start, data),
            Self::Spi(bus) => bus.read(start, data),
        }
    }

    fn write(&mut self, register: u8, value: u8) -> Result<(), std::io::Error> {
        match self {
            Self::I2c(bus) => bus.write(register, value),
            Self::Spi(bus) => bus.write(register, value),
        }
    }

    fn sync(&mut self) -> Result<(), std::io::Error> {
        match self {
            Self::I2c(bus) => bus.sync(),
            Self::Spi(bus) => bus.sync(),
        }
    }
}

/// Resolved device configuration: the bus handle with its operations bound.
/// Read-only once handed to the driver.
pub struct DeviceConfig<B: BusOps = Bme680Bus> {
    bus: B,
}

impl DeviceConfig<Bme680Bus> {
    pub fn i2c(bus_path: &Path, device_addr: Bme680DeviceAddress) -> DeviceConfig<Bme680Bus> {
        DeviceConfig { bus: Bme680Bus::I2c(I2cBus::new(bus_path, device_addr)) }
    }

    pub fn spi(bus_path: &Path) -> DeviceConfig<Bme680Bus> {
        DeviceConfig { bus: Bme680Bus::Spi(SpiBus::new(SpidevLink::new(bus_path))) }
    }
}

impl<B: BusOps> DeviceConfig<B> {
    pub fn new(bus: B) -> DeviceConfig<B> {
        DeviceConfig { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }
}
