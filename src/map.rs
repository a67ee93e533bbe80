//! Static partition plan from a single base address: TLB section,
//! flight-plan sections, then `N x K` payload sections.

use crate::config::{FpTlbLocation, MediaGeometry};

/// Addresses computed once from a [`MediaGeometry`] at init time and never
/// recomputed afterwards.
#[derive(Debug, Clone)]
pub struct AddressMap {
    /// Base of the (optional) flight-plan TLB backup section in flash.
    pub tlb_base: u32,
    /// Base of the flight-plan entry region.
    pub fp_base: u32,
    /// Number of sections the flight-plan region occupies.
    pub fp_sections: u32,
    /// Base of the payload region (first byte after the flight-plan region).
    pub payload_base: u32,
    /// Flat section base address for every payload section, indexed
    /// `p * sections_per_payload + k`.
    pub payload_addr: heapless::Vec<u32, { crate::config::MAX_PAYLOAD_SECTIONS }>,
    /// Where the FRAM-resident TLB backup lives, if configured for FRAM.
    pub tlb_fram_base: Option<u32>,
}

impl AddressMap {
    /// Computes the partition plan for the given geometry.
    pub fn compute(geometry: &MediaGeometry) -> Self {
        let tlb_base = geometry.flash_init;
        let fp_base = tlb_base + geometry.section;
        let fp_sections = geometry.fp_sections();
        let payload_base = fp_base + fp_sections * geometry.section;

        let total_payload_sections = geometry.n_payloads * geometry.sections_per_payload;
        let mut payload_addr = heapless::Vec::new();
        for i in 0..total_payload_sections {
            // Capacity is a compile-time bound; construction-time geometry is
            // expected to respect it (validated by `payload_init`).
            let _ = payload_addr.push(payload_base + i * geometry.section);
        }

        let tlb_fram_base = match geometry.fp_tlb_location {
            FpTlbLocation::Fram => {
                let tlb_bytes = (geometry.fp_max_entries + 1) * crate::flight_plan::tlb::TLB_SLOT_BYTES;
                Some(geometry.fram_size - tlb_bytes)
            }
            FpTlbLocation::Flash => None,
        };

        AddressMap {
            tlb_base,
            fp_base,
            fp_sections,
            payload_base,
            payload_addr,
            tlb_fram_base,
        }
    }

    /// Flat flash address of section `k` (0-indexed) within the flight-plan
    /// region.
    pub fn fp_section_addr(&self, geometry: &MediaGeometry, k: u32) -> u32 {
        self.fp_base + k * geometry.section
    }

    /// Flat flash address of payload `p`'s section `k` (0-indexed within
    /// that payload's run of sections).
    pub fn payload_section_addr(&self, geometry: &MediaGeometry, p: u32, k: u32) -> Option<u32> {
        let idx = p * geometry.sections_per_payload + k;
        self.payload_addr.get(idx as usize).copied()
    }
}
