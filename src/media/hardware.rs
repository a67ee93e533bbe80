//! Hardware backend: a blocking SPI NOR flash and a blocking SPI FRAM chip,
//! each behind a chip-select pin, driven with `embedded-hal` 0.2 traits.
//!
//! A small command set, a chip-select toggle around each transaction, and
//! a busy-poll after anything that takes time on the device (erase, page
//! program). `PAGE`/`SECTION` are const generics rather than an
//! associated-const trait because there is exactly one axis of per-device
//! variation here (geometry), not a whole timing/config struct.

use embedded_hal::blocking::spi::{Transfer, Write};
use embedded_hal::digital::v2::OutputPin;

use super::{FlashMedia, FlashPartition, FramMedia};
use crate::error::MediaError;

/// Standard SPI NOR flash opcodes (JEDEC-common; matches e.g. Winbond
/// W25Qxx and Macronix MX25 parts).
#[derive(Clone, Copy)]
#[repr(u8)]
enum NorCommand {
    Read = 0x03,
    WriteEnable = 0x06,
    PageProgram = 0x02,
    SectorErase = 0xD8,
    ReadStatus1 = 0x05,
}

const STATUS_BUSY_BIT: u8 = 0x01;

/// A SPI NOR flash chip wired to the FMC^-1... no FMC here: a plain SPI bus
/// plus a chip-select pin. `PAGE` and `SECTION` describe the device's
/// program/erase granularity.
pub struct SpiNorFlash<SPI, CS, const PAGE: u32, const SECTION: u32> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS, E, PE, const PAGE: u32, const SECTION: u32> SpiNorFlash<SPI, CS, PAGE, SECTION>
where
    SPI: Transfer<u8, Error = E> + Write<u8, Error = E>,
    CS: OutputPin<Error = PE>,
{
    /// Wraps an already-initialized SPI bus and chip-select pin.
    pub fn new(spi: SPI, cs: CS) -> Self {
        SpiNorFlash { spi, cs }
    }

    /// Releases the underlying SPI bus and chip-select pin.
    pub fn free(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn select(&mut self) -> Result<(), MediaError> {
        self.cs.set_low().map_err(|_| MediaError::Flash(None))
    }

    fn deselect(&mut self) -> Result<(), MediaError> {
        self.cs.set_high().map_err(|_| MediaError::Flash(None))
    }

    fn write_enable(&mut self) -> Result<(), MediaError> {
        self.select()?;
        let r = self.spi.write(&[NorCommand::WriteEnable as u8]);
        self.deselect()?;
        r.map_err(|_| MediaError::Flash(None))
    }

    fn wait_until_idle(&mut self) -> Result<(), MediaError> {
        loop {
            self.select()?;
            let mut buf = [NorCommand::ReadStatus1 as u8, 0];
            let r = self.spi.transfer(&mut buf);
            self.deselect()?;
            let status = r.map_err(|_| MediaError::Flash(None))?;
            if status[1] & STATUS_BUSY_BIT == 0 {
                return Ok(());
            }
        }
    }

    fn addr_bytes(addr: u32) -> [u8; 3] {
        [(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
    }
}

impl<SPI, CS, E, PE, const PAGE: u32, const SECTION: u32> FlashMedia
    for SpiNorFlash<SPI, CS, PAGE, SECTION>
where
    SPI: Transfer<u8, Error = E> + Write<u8, Error = E>,
    CS: OutputPin<Error = PE>,
{
    const PAGE: u32 = PAGE;
    const SECTION: u32 = SECTION;

    fn flash_read(&mut self, _partition: FlashPartition, addr: u32, buf: &mut [u8]) -> Result<(), MediaError> {
        let a = Self::addr_bytes(addr);
        self.select()?;
        let header = self.spi.write(&[NorCommand::Read as u8, a[0], a[1], a[2]]);
        let result = header.and_then(|_| self.spi.transfer(buf).map(|_| ()));
        self.deselect()?;
        result.map_err(|_| MediaError::Flash(None))
    }

    fn flash_write(&mut self, _partition: FlashPartition, addr: u32, buf: &[u8]) -> Result<(), MediaError> {
        storage_debug!("flash_write addr={} len={}", addr, buf.len());
        self.write_enable()?;
        let a = Self::addr_bytes(addr);
        self.select()?;
        let header = self.spi.write(&[NorCommand::PageProgram as u8, a[0], a[1], a[2]]);
        let result = header.and_then(|_| self.spi.write(buf));
        self.deselect()?;
        result.map_err(|_| MediaError::Flash(None))?;
        self.wait_until_idle()
    }

    fn flash_erase(&mut self, partition: FlashPartition, section_base: u32) -> Result<(), MediaError> {
        storage_debug!("flash_erase section_base={}", section_base);
        let _ = partition;
        self.write_enable()?;
        let a = Self::addr_bytes(section_base);
        self.select()?;
        let r = self.spi.write(&[NorCommand::SectorErase as u8, a[0], a[1], a[2]]);
        self.deselect()?;
        r.map_err(|_| MediaError::Flash(None))?;
        self.wait_until_idle()
    }
}

/// SPI FRAM opcodes (matches common FM25xx / MB85RSxx parts).
#[derive(Clone, Copy)]
#[repr(u8)]
enum FramCommand {
    Read = 0x03,
    WriteEnable = 0x06,
    Write = 0x02,
}

/// A SPI FRAM chip wired to a plain SPI bus and chip-select pin.
pub struct SpiFram<SPI, CS, const SIZE: u32> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS, E, PE, const SIZE: u32> SpiFram<SPI, CS, SIZE>
where
    SPI: Transfer<u8, Error = E> + Write<u8, Error = E>,
    CS: OutputPin<Error = PE>,
{
    /// Wraps an already-initialized SPI bus and chip-select pin.
    pub fn new(spi: SPI, cs: CS) -> Self {
        SpiFram { spi, cs }
    }

    /// Releases the underlying SPI bus and chip-select pin.
    pub fn free(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn select(&mut self) -> Result<(), MediaError> {
        self.cs.set_low().map_err(|_| MediaError::Fram(None))
    }

    fn deselect(&mut self) -> Result<(), MediaError> {
        self.cs.set_high().map_err(|_| MediaError::Fram(None))
    }

    fn addr_bytes(addr: u32) -> [u8; 2] {
        // 16-bit address: matches a 32 KiB FRAM's address space exactly.
        [(addr >> 8) as u8, addr as u8]
    }
}

impl<SPI, CS, E, PE, const SIZE: u32> FramMedia for SpiFram<SPI, CS, SIZE>
where
    SPI: Transfer<u8, Error = E> + Write<u8, Error = E>,
    CS: OutputPin<Error = PE>,
{
    const SIZE: u32 = SIZE;

    fn fram_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MediaError> {
        let a = Self::addr_bytes(addr);
        self.select()?;
        let header = self.spi.write(&[FramCommand::Read as u8, a[0], a[1]]);
        let result = header.and_then(|_| self.spi.transfer(buf).map(|_| ()));
        self.deselect()?;
        result.map_err(|_| MediaError::Fram(None))
    }

    fn fram_write(&mut self, addr: u32, buf: &[u8]) -> Result<(), MediaError> {
        self.select()?;
        let r = self.spi.write(&[FramCommand::WriteEnable as u8]);
        self.deselect()?;
        r.map_err(|_| MediaError::Fram(None))?;

        let a = Self::addr_bytes(addr);
        self.select()?;
        let header = self.spi.write(&[FramCommand::Write as u8, a[0], a[1]]);
        let result = header.and_then(|_| self.spi.write(buf));
        self.deselect()?;
        result.map_err(|_| MediaError::Fram(None))
    }
}
