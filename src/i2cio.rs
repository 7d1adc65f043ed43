use i2c_linux::I2c;
use std::fs::File;
use std::io::{Error, ErrorKind};
use std::path::Path;

pub fn get_bus(bus_path: &Path) -> Result<I2c<File>, std::io::Error> {
    I2c::from_path(bus_path)
}

pub fn set_slave(i2c: &mut I2c<File>, dev_addr: u16) -> Result<(), std::io::Error> {
    i2c.smbus_set_slave_address(dev_addr, false)
}

pub fn read_byte(i2c: &mut I2c<File>, register: u8) -> Result<u8, std::io::Error> {
    i2c.smbus_read_byte_data(register)
}

// -- burst read of contiguous registers, the chip auto-increments the register address
pub fn read_block(i2c: &mut I2c<File>, start: u8, data: &mut [u8]) -> Result<(), std::io::Error> {
    let bytes_read = i2c.i2c_read_block_data(start, data)?;
    if bytes_read != data.len() {
        let errmsg = format!("Short block read at {start:#04x}: got {bytes_read} of {} bytes", data.len());
        return Err(Error::new(ErrorKind::UnexpectedEof, errmsg))
    }
    Ok(())
}

pub fn write_byte(i2c: &mut I2c<File>, register: u8, data: u8) -> Result<(), std::io::Error> {
    i2c.smbus_write_byte_data(register, data)
}
