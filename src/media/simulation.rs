//! Simulation backend: two in-memory byte arrays standing in for NOR flash
//! and FRAM, so the storage core runs identically under a hosted simulator
//! as it does on hardware.
//!
//! Two shapes are provided. [`SimulatedMedia`] (requires the `std` feature)
//! owns heap-allocated buffers sized at construction time, matching how a
//! hosted test harness would normally spin one up. [`FixedSimulatedMedia`]
//! is `no_std`-friendly: the caller supplies the backing arrays (e.g.
//! `static mut` buffers or stack arrays sized via const generics), which is
//! the shape a bare-metal integration test without an allocator would use.

use super::{FlashMedia, FlashPartition, FramMedia};
use crate::error::MediaError;

/// Simulated media over caller-supplied, fixed-size byte slices. Erased
/// bytes read back as `0xFF`, matching real NOR flash.
pub struct FixedSimulatedMedia<'a, const PAGE: u32, const SECTION: u32> {
    flash: &'a mut [u8],
    fram: &'a mut [u8],
}

impl<'a, const PAGE: u32, const SECTION: u32> FixedSimulatedMedia<'a, PAGE, SECTION> {
    /// Wraps caller-owned flash and FRAM buffers. `flash.len()` must be a
    /// multiple of `SECTION`.
    pub fn new(flash: &'a mut [u8], fram: &'a mut [u8]) -> Self {
        assert_eq!(flash.len() as u32 % SECTION, 0, "flash buffer must be a whole number of sections");
        FixedSimulatedMedia { flash, fram }
    }

    /// Resets the whole simulated flash to the erased state (`0xFF`).
    pub fn erase_all_flash(&mut self) {
        for b in self.flash.iter_mut() {
            *b = 0xFF;
        }
    }

    /// Direct read-only view of the simulated flash, for test assertions.
    pub fn flash_bytes(&self) -> &[u8] {
        self.flash
    }

    /// Direct read-only view of the simulated FRAM, for test assertions.
    pub fn fram_bytes(&self) -> &[u8] {
        self.fram
    }
}

impl<'a, const PAGE: u32, const SECTION: u32> FlashMedia for FixedSimulatedMedia<'a, PAGE, SECTION> {
    const PAGE: u32 = PAGE;
    const SECTION: u32 = SECTION;

    fn flash_read(&mut self, _partition: FlashPartition, addr: u32, buf: &mut [u8]) -> Result<(), MediaError> {
        let start = addr as usize;
        let end = start + buf.len();
        let region = self.flash.get(start..end).ok_or(MediaError::Flash(None))?;
        buf.copy_from_slice(region);
        Ok(())
    }

    fn flash_write(&mut self, _partition: FlashPartition, addr: u32, buf: &[u8]) -> Result<(), MediaError> {
        if buf.len() as u32 > PAGE || addr % PAGE + buf.len() as u32 > PAGE {
            return Err(MediaError::Flash(None));
        }
        let start = addr as usize;
        let end = start + buf.len();
        let region = self.flash.get_mut(start..end).ok_or(MediaError::Flash(None))?;
        region.copy_from_slice(buf);
        Ok(())
    }

    fn flash_erase(&mut self, _partition: FlashPartition, section_base: u32) -> Result<(), MediaError> {
        if section_base % SECTION != 0 {
            return Err(MediaError::Flash(None));
        }
        let start = section_base as usize;
        let end = start + SECTION as usize;
        let region = self.flash.get_mut(start..end).ok_or(MediaError::Flash(None))?;
        for b in region.iter_mut() {
            *b = 0xFF;
        }
        Ok(())
    }
}

impl<'a, const PAGE: u32, const SECTION: u32> FramMedia for FixedSimulatedMedia<'a, PAGE, SECTION> {
    const SIZE: u32 = u32::MAX; // bounded only by the caller-supplied slice.

    fn fram_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MediaError> {
        let start = addr as usize;
        let end = start + buf.len();
        let region = self.fram.get(start..end).ok_or(MediaError::Fram(None))?;
        buf.copy_from_slice(region);
        Ok(())
    }

    fn fram_write(&mut self, addr: u32, buf: &[u8]) -> Result<(), MediaError> {
        let start = addr as usize;
        let end = start + buf.len();
        let region = self.fram.get_mut(start..end).ok_or(MediaError::Fram(None))?;
        region.copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(feature = "std")]
mod owned {
    use super::*;
    extern crate std;
    use std::vec;
    use std::vec::Vec;

    /// Heap-owned simulated media, sized at construction time. Flash starts
    /// fully erased (`0xFF`); FRAM starts zeroed, matching a blank FRAM chip.
    pub struct SimulatedMedia<const PAGE: u32, const SECTION: u32> {
        flash: Vec<u8>,
        fram: Vec<u8>,
    }

    impl<const PAGE: u32, const SECTION: u32> SimulatedMedia<PAGE, SECTION> {
        /// Builds a simulated flash of `flash_size` bytes (a multiple of
        /// `SECTION`) and a simulated FRAM of `fram_size` bytes.
        pub fn new(flash_size: u32, fram_size: u32) -> Self {
            assert_eq!(flash_size % SECTION, 0, "flash size must be a whole number of sections");
            SimulatedMedia {
                flash: vec![0xFFu8; flash_size as usize],
                fram: vec![0u8; fram_size as usize],
            }
        }

        /// Resets the whole simulated flash to the erased state (`0xFF`).
        pub fn erase_all_flash(&mut self) {
            self.flash.iter_mut().for_each(|b| *b = 0xFF);
        }

        /// Direct read-only view of the simulated flash, for test assertions.
        pub fn flash_bytes(&self) -> &[u8] {
            &self.flash
        }

        /// Direct read-only view of the simulated FRAM, for test assertions.
        pub fn fram_bytes(&self) -> &[u8] {
            &self.fram
        }

        /// Flips a single bit in the simulated flash, to model an upset or
        /// externally corrupted copy in tests.
        pub fn corrupt_flash_byte(&mut self, addr: u32, new_value: u8) {
            self.flash[addr as usize] = new_value;
        }

        /// Flips a single byte in the simulated FRAM.
        pub fn corrupt_fram_byte(&mut self, addr: u32, new_value: u8) {
            self.fram[addr as usize] = new_value;
        }
    }

    impl<const PAGE: u32, const SECTION: u32> FlashMedia for SimulatedMedia<PAGE, SECTION> {
        const PAGE: u32 = PAGE;
        const SECTION: u32 = SECTION;

        fn flash_read(&mut self, _partition: FlashPartition, addr: u32, buf: &mut [u8]) -> Result<(), MediaError> {
            let start = addr as usize;
            let end = start + buf.len();
            let region = self.flash.get(start..end).ok_or(MediaError::Flash(None))?;
            buf.copy_from_slice(region);
            Ok(())
        }

        fn flash_write(&mut self, _partition: FlashPartition, addr: u32, buf: &[u8]) -> Result<(), MediaError> {
            if buf.len() as u32 > PAGE || addr % PAGE + buf.len() as u32 > PAGE {
                return Err(MediaError::Flash(None));
            }
            let start = addr as usize;
            let end = start + buf.len();
            let region = self.flash.get_mut(start..end).ok_or(MediaError::Flash(None))?;
            region.copy_from_slice(buf);
            Ok(())
        }

        fn flash_erase(&mut self, _partition: FlashPartition, section_base: u32) -> Result<(), MediaError> {
            if section_base % SECTION != 0 {
                return Err(MediaError::Flash(None));
            }
            let start = section_base as usize;
            let end = start + SECTION as usize;
            let region = self.flash.get_mut(start..end).ok_or(MediaError::Flash(None))?;
            region.iter_mut().for_each(|b| *b = 0xFF);
            Ok(())
        }
    }

    impl<const PAGE: u32, const SECTION: u32> FramMedia for SimulatedMedia<PAGE, SECTION> {
        const SIZE: u32 = u32::MAX;

        fn fram_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MediaError> {
            let start = addr as usize;
            let end = start + buf.len();
            let region = self.fram.get(start..end).ok_or(MediaError::Fram(None))?;
            buf.copy_from_slice(region);
            Ok(())
        }

        fn fram_write(&mut self, addr: u32, buf: &[u8]) -> Result<(), MediaError> {
            let start = addr as usize;
            let end = start + buf.len();
            let region = self.fram.get_mut(start..end).ok_or(MediaError::Fram(None))?;
            region.copy_from_slice(buf);
            Ok(())
        }
    }
}

#[cfg(feature = "std")]
pub use owned::SimulatedMedia;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_media_rejects_straddling_write() {
        let mut flash = [0xFFu8; 2048];
        let mut fram = [0u8; 256];
        let mut media = FixedSimulatedMedia::<512, 2048>::new(&mut flash, &mut fram);
        // 400 bytes at offset 200 would span 200..600, crossing the page at 512.
        let buf = [0u8; 400];
        let err = media.flash_write(FlashPartition::FlightPlan, 200, &buf).unwrap_err();
        assert_eq!(err, MediaError::Flash(None));
    }

    #[test]
    fn fixed_media_erase_resets_section_to_0xff() {
        let mut flash = [0x00u8; 2048];
        let mut fram = [0u8; 256];
        let mut media = FixedSimulatedMedia::<512, 2048>::new(&mut flash, &mut fram);
        media.flash_erase(FlashPartition::FlightPlan, 0).unwrap();
        assert!(media.flash_bytes().iter().all(|&b| b == 0xFF));
    }

    #[cfg(feature = "std")]
    #[test]
    fn owned_media_read_after_write_roundtrips() {
        let mut media = SimulatedMedia::<512, 2048>::new(2048 * 2, 1024);
        let data = [1u8, 2, 3, 4];
        media.flash_write(FlashPartition::Payload(0), 0, &data).unwrap();
        let mut out = [0u8; 4];
        media.flash_read(FlashPartition::Payload(0), 0, &mut out).unwrap();
        assert_eq!(out, data);
    }
}
