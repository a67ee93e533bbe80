//! Compile-time-shaped configuration.
//!
//! `STORAGE_MODE`, `STORAGE_TRIPLE_WR`, `FP_TLB_LOCATION` and the various
//! sizes are bundled into one `Copy` value, [`MediaGeometry`], built once
//! at `storage_init` time and threaded through the address map, engines
//! and façade, rather than living as scattered global state.

/// Where the flight-plan TLB is backed up between resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpTlbLocation {
    /// TLB lives at the top of FRAM (`FRAM_SIZE - size_of::<Tlb>()`).
    Fram,
    /// TLB lives in its own dedicated flash section at `FLASH_INIT`.
    Flash,
}

/// Default NOR flash erase-section size: 256 KiB.
pub const DEFAULT_SECTION: u32 = 262_144;
/// Flash write-page size. Writes must never straddle this boundary.
pub const DEFAULT_PAGE: u32 = 512;
/// Default FRAM capacity: 32 KiB.
pub const DEFAULT_FRAM_SIZE: u32 = 32_768;

/// Upper bound on `P * SECTIONS_PER_PAYLOAD` the address map can hold
/// without allocating. This is the "configured maximum" `payload_init`
/// validates `P*K` against; raise it if a deployment needs more payload
/// sections than this.
pub const MAX_PAYLOAD_SECTIONS: usize = 64;

/// Upper bound on `N_max` (flight-plan capacity) the in-RAM TLB can hold
/// without allocating. One extra slot beyond this is reserved for the
/// TLB's own metadata slot.
pub const MAX_FP_ENTRIES: usize = 64;

/// Upper bound on `N_vars` (status table length) the in-RAM mirror used by
/// `status_init`'s RAM-only mode can hold without allocating.
pub const MAX_STATUS_VARS: usize = 128;

/// The geometry of the media underneath the storage core, and the handful
/// of policy switches (`STORAGE_TRIPLE_WR`, `FP_TLB_LOCATION`) that change
/// how the engines use that media.
///
/// Constructed once at `storage_init` time and copied into every engine;
/// never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaGeometry {
    /// Flash erase-section size in bytes. Must be a multiple of `page`.
    pub section: u32,
    /// Flash write-page size in bytes. All writes must be page-aligned and
    /// must not cross a page boundary.
    pub page: u32,
    /// FRAM capacity in bytes.
    pub fram_size: u32,
    /// Base byte address of the flash region this storage core owns.
    pub flash_init: u32,
    /// Maximum number of live flight-plan entries (`N_max`).
    pub fp_max_entries: u32,
    /// Number of flash sections reserved per payload.
    pub sections_per_payload: u32,
    /// Number of distinct payloads (`P`).
    pub n_payloads: u32,
    /// Enables triple-modular redundancy on the status table.
    pub triple_write: bool,
    /// Where the flight-plan TLB is persisted.
    pub fp_tlb_location: FpTlbLocation,
}

impl MediaGeometry {
    /// A reasonable default geometry: 256 KiB sections, 512-byte pages,
    /// 32 KiB of FRAM, TLB persisted to FRAM, triple-write disabled.
    pub const fn new(flash_init: u32, fp_max_entries: u32, sections_per_payload: u32, n_payloads: u32) -> Self {
        MediaGeometry {
            section: DEFAULT_SECTION,
            page: DEFAULT_PAGE,
            fram_size: DEFAULT_FRAM_SIZE,
            flash_init,
            fp_max_entries,
            sections_per_payload,
            n_payloads,
            triple_write: false,
            fp_tlb_location: FpTlbLocation::Fram,
        }
    }

    /// Enables triple-modular redundancy on the status table.
    pub const fn with_triple_write(mut self, enabled: bool) -> Self {
        self.triple_write = enabled;
        self
    }

    /// Overrides where the flight-plan TLB is persisted.
    pub const fn with_fp_tlb_location(mut self, location: FpTlbLocation) -> Self {
        self.fp_tlb_location = location;
        self
    }

    /// Overrides the flash section size (must stay a multiple of `page`).
    pub const fn with_section(mut self, section: u32) -> Self {
        self.section = section;
        self
    }

    /// Overrides the flash page size.
    pub const fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Overrides the FRAM capacity.
    pub const fn with_fram_size(mut self, fram_size: u32) -> Self {
        self.fram_size = fram_size;
        self
    }

    /// Number of flash sections the flight-plan region occupies:
    /// `ceil(N_max * 512 / SECTION) + 1`.
    pub fn fp_sections(&self) -> u32 {
        let entries_bytes = self.fp_max_entries * self.page;
        let whole = (entries_bytes + self.section - 1) / self.section;
        whole + 1
    }

    /// Number of `fp_entry` slots that fit in one live flight-plan section.
    pub fn commands_per_section(&self) -> u32 {
        self.section / self.page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fp_sections_rounds_up_and_adds_one() {
        let g = MediaGeometry::new(0, 3, 1, 1).with_section(2048).with_page(512);
        // 3 entries * 512 bytes = 1536 bytes, one 2048-byte section holds that,
        // plus one extra section per the "+1" in the address map formula.
        assert_eq!(g.fp_sections(), 2);
    }

    #[test]
    fn commands_per_section_is_section_over_page() {
        let g = MediaGeometry::new(0, 3, 1, 1).with_section(2048).with_page(512);
        assert_eq!(g.commands_per_section(), 4);
    }
}
