//! Media backend: uniform read/write/erase over flash sections and FRAM
//! bytes.
//!
//! Two operations against two address spaces, exposed as traits so the
//! backend is a type selected at construction time rather than a
//! compile-time preprocessor branch. [`hardware`] delegates to a vendor
//! SPI-NOR and FRAM driver pair via `embedded-hal`; [`simulation`] is
//! backed by in-memory byte arrays and is what the test suite in this
//! crate (and any hosted simulator built on top of it) uses.

pub mod hardware;
pub mod simulation;

use crate::error::MediaError;

/// Which logical region a flash access targets. Carried through purely for
/// backend diagnostics (e.g. per-region wear or transaction logging); it
/// does not affect how an address is interpreted, since the address map
/// already computes flat offsets across one contiguous flash region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashPartition {
    /// The flight-plan TLB backup section (only used when
    /// `FpTlbLocation::Flash`).
    Tlb,
    /// The flight-plan entry sections.
    FlightPlan,
    /// A payload's sample sections (`p` = payload index).
    Payload(u32),
}

/// NOR flash access: page-granular writes, section-granular erase.
///
/// Implementors must treat `addr` as a flat byte offset from the start of
/// the flash region they own. A write or read that would straddle a page
/// boundary is a caller bug the address map and payload store are
/// responsible for preventing; a `FlashMedia` implementation may assert on
/// it but is not required to detect it.
pub trait FlashMedia {
    /// Flash page size in bytes. All writes must be of at most this length
    /// and must not cross a multiple-of-this-length boundary.
    const PAGE: u32;
    /// Flash erase-section size in bytes.
    const SECTION: u32;

    /// Reads `buf.len()` bytes starting at `addr`.
    fn flash_read(&mut self, partition: FlashPartition, addr: u32, buf: &mut [u8]) -> Result<(), MediaError>;

    /// Writes `buf` starting at `addr`. `buf.len()` must not cross a page
    /// boundary when added to `addr`.
    fn flash_write(&mut self, partition: FlashPartition, addr: u32, buf: &[u8]) -> Result<(), MediaError>;

    /// Erases the whole section containing `section_base`. May block for
    /// hundreds of milliseconds on real hardware.
    fn flash_erase(&mut self, partition: FlashPartition, section_base: u32) -> Result<(), MediaError>;
}

/// Byte-addressable FRAM access.
pub trait FramMedia {
    /// Total FRAM capacity in bytes.
    const SIZE: u32;

    /// Reads `buf.len()` bytes starting at `addr`.
    fn fram_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MediaError>;

    /// Writes `buf` starting at `addr`.
    fn fram_write(&mut self, addr: u32, buf: &[u8]) -> Result<(), MediaError>;
}
