use std::io::{Error, ErrorKind};

use super::bme680_bus::{BusOps, SpiLink};
use super::bme680_regs::*;

// -- calibration image of a typical part, laid out as the three spans are read
pub(crate) const CALIB_IMAGE: [u8; BME680_LEN_COEFF_ALL] = [
    97, 102, 3, 90, 125, 142, 67, 214, 88, 17, 142, 28, 90, 255, 64, 30, 34, 51, 44, 241, 167, 244, 30,
    63, 122, 49, 0, 45, 20, 120, 156, 91, 102, 230, 206, 226, 18,
    38, 170, 220, 119, 3,
];

// -- press 0x5a3c8, temp 0x7fff0, hum 0x5c10, gas 562 in range 5, heater stable and gas valid
pub(crate) const FIELD_BLOCK: [u8; BME680_LEN_FIELD] = [
    0x80, 0x00, 0x5a, 0x3c, 0x80, 0x7f, 0xff, 0x00, 0x5c, 0x10, 0x00, 0x00, 0x00, 0x8c, 0xb5, 0x00, 0x00,
];

const BME680_NEW_DATA_BIT: u8 = 0x80;
const BME680_FORCED_MODE_BIT: u8 = 0x01;

/// Register file standing in for the chip on any bus.
pub(crate) struct FakeBus {
    pub regs: [u8; 256],
    pub reads: Vec<(u8, usize)>,
    pub writes: Vec<(u8, u8)>,
    pub ready: bool,
    // -- status polls after a trigger before the new data bit shows, None keeps it cleared
    pub new_data_after: Option<u32>,
    pub fail_read_at: Option<u8>,
    pub fail_write_at: Option<u8>,
    pub resets: u32,
    polls: u32,
}

impl FakeBus {
    pub fn with_chip() -> FakeBus {
        let mut regs = [0u8; 256];
        regs[BME680_REG_CHIP_ID as usize] = BME680_CHIP_ID;
        let coeff_1 = BME680_REG_COEFF_1 as usize;
        let coeff_2 = BME680_REG_COEFF_2 as usize;
        let coeff_3 = BME680_REG_COEFF_3 as usize;
        regs[coeff_1..coeff_1 + BME680_LEN_COEFF_1].copy_from_slice(&CALIB_IMAGE[..BME680_LEN_COEFF_1]);
        regs[coeff_2..coeff_2 + BME680_LEN_COEFF_2]
            .copy_from_slice(&CALIB_IMAGE[BME680_LEN_COEFF_1..BME680_LEN_COEFF_1 + BME680_LEN_COEFF_2]);
        regs[coeff_3..coeff_3 + BME680_LEN_COEFF_3]
            .copy_from_slice(&CALIB_IMAGE[BME680_LEN_COEFF_1 + BME680_LEN_COEFF_2..]);
        let field = BME680_REG_FIELD_0 as usize;
        regs[field..field + BME680_LEN_FIELD].copy_from_slice(&FIELD_BLOCK);
        FakeBus {
            regs,
            reads: Vec::new(),
            writes: Vec::new(),
            ready: true,
            new_data_after: Some(1),
            fail_read_at: None,
            fail_write_at: None,
            resets: 0,
            polls: 0,
        }
    }

    pub fn set_field_block(&mut self, block: &[u8; BME680_LEN_FIELD]) {
        let field = BME680_REG_FIELD_0 as usize;
        self.regs[field..field + BME680_LEN_FIELD].copy_from_slice(block);
    }

    pub fn writes_to(&self, register: u8) -> Vec<u8> {
        self.writes.iter().filter(|(reg, _)| *reg == register).map(|(_, val)| *val).collect()
    }
}

impl BusOps for FakeBus {
    fn check(&mut self) -> bool {
        self.ready
    }

    fn read(&mut self, start: u8, data: &mut [u8]) -> Result<(), std::io::Error> {
        self.reads.push((start, data.len()));
        if self.fail_read_at == Some(start) {
            return Err(Error::new(ErrorKind::BrokenPipe, format!("injected read failure at {start:#04x}")))
        }
        let start = start as usize;
        data.copy_from_slice(&self.regs[start..start + data.len()]);
        // -- single byte reads of meas_status_0 are polls
        if start == BME680_REG_MEAS_STATUS_0 as usize && data.len() == 1 {
            self.polls += 1;
            let new_data = matches!(self.new_data_after, Some(after) if self.polls >= after);
            data[0] = if new_data { data[0] | BME680_NEW_DATA_BIT } else { data[0] & !BME680_NEW_DATA_BIT };
        }
        Ok(())
    }

    fn write(&mut self, register: u8, value: u8) -> Result<(), std::io::Error> {
        self.writes.push((register, value));
        if self.fail_write_at == Some(register) {
            return Err(Error::new(ErrorKind::BrokenPipe, format!("injected write failure at {register:#04x}")))
        }
        if register == BME680_REG_RESET {
            self.resets += 1;
            return Ok(())
        }
        if register == BME680_REG_CTRL_MEAS && value & BME680_FORCED_MODE_BIT != 0 {
            self.polls = 0;
        }
        self.regs[register as usize] = value;
        Ok(())
    }
}

const SPI_READ_BIT: u8 = 0x80;
const SPI_ADDR_MASK: u8 = 0x7f;
const SPI_MEM_PAGE_BIT: u8 = 0x10;
const BME680_SOFT_RESET_CMD: u8 = 0xb6;

/// Four-wire view of a register file: 7 bit addresses, the page latch in the
/// status register picks the upper or lower half of the map.
pub(crate) struct FakeSpiLink {
    pub regs: [u8; 256],
    pub status: u8,
    // -- (address byte, payload length) per transfer
    pub transfers: Vec<(u8, usize)>,
}

impl FakeSpiLink {
    /// Every register holds its own address, handy to see which page answered.
    pub fn new(status: u8) -> FakeSpiLink {
        let mut regs = [0u8; 256];
        for (i, reg) in regs.iter_mut().enumerate() {
            *reg = i as u8;
        }
        FakeSpiLink { regs, status, transfers: Vec::new() }
    }

    /// Same register image as `FakeBus::with_chip`, latched to page 1 like after a previous session.
    pub fn with_chip() -> FakeSpiLink {
        FakeSpiLink { regs: FakeBus::with_chip().regs, status: SPI_MEM_PAGE_BIT, transfers: Vec::new() }
    }

    fn register(&self, addr7: u8) -> usize {
        if self.status & SPI_MEM_PAGE_BIT != 0 {
            addr7 as usize
        } else {
            (addr7 | SPI_READ_BIT) as usize
        }
    }

    pub fn status_writes(&self) -> usize {
        self.transfers.iter().filter(|(addr, _)| *addr == BME680_REG_STATUS).count()
    }
}

impl SpiLink for FakeSpiLink {
    fn check(&mut self) -> bool {
        true
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), std::io::Error> {
        assert_eq!(tx.len(), rx.len());
        self.transfers.push((tx[0], tx.len() - 1));
        let addr7 = tx[0] & SPI_ADDR_MASK;
        if tx[0] & SPI_READ_BIT != 0 {
            for i in 1..tx.len() {
                let addr = addr7 + (i - 1) as u8;
                rx[i] = if addr == BME680_REG_STATUS { self.status } else { self.regs[self.register(addr)] };
            }
            return Ok(())
        }
        if addr7 == BME680_REG_STATUS {
            self.status = tx[1];
        } else if self.register(addr7) == BME680_REG_RESET as usize && tx[1] == BME680_SOFT_RESET_CMD {
            // -- reset brings the latch back to page 0
            self.status &= !SPI_MEM_PAGE_BIT;
        } else {
            let reg = self.register(addr7);
            self.regs[reg] = tx[1];
        }
        Ok(())
    }
}
