//! The flight-plan engine: `fp_init`, `fp_set`, `fp_get`, `fp_delete`,
//! `fp_reset`, and the compaction (rebuild) algorithm.
//!
//! Live entries are appended to the current flight-plan section in order;
//! deletion only tombstones the TLB slot, it never erases flash (erase is
//! section-granular and would destroy neighboring live entries). Once the
//! live section fills up (at `>= commands_per_section` appends), every live
//! entry is read back, re-appended to the next section in TLB order, and the
//! old section is erased. This is the only place flash is ever erased
//! outside of `fp_reset`.

use crate::config::MediaGeometry;
use crate::error::{StorageError, StorageResult};
use crate::flight_plan::entry::{self, FlightPlanEntry, ENTRY_SIZE, FP_NULL};
use crate::flight_plan::tlb::Tlb;
use crate::map::AddressMap;
use crate::media::{FlashMedia, FlashPartition, FramMedia};

/// Owns the flight-plan TLB, which in turn carries the append cursor
/// (`live_section`, `next_offset`) across reboots. One instance per open
/// storage core.
pub struct FlightPlanEngine {
    tlb: Tlb,
}

impl FlightPlanEngine {
    /// `fp_init`: asserts the layout invariant and loads the TLB (and with
    /// it, the append cursor) from its backing store.
    pub fn init<M: FlashMedia, F: FramMedia>(
        geometry: &MediaGeometry,
        map: &AddressMap,
        flash: &mut M,
        fram: &mut F,
    ) -> StorageResult<Self> {
        entry::assert_entry_fits_page(geometry);
        crate::flight_plan::tlb::assert_tlb_packs_pages(geometry);

        let mut tlb = Tlb::new(geometry.fp_max_entries as usize);
        match geometry.fp_tlb_location {
            crate::config::FpTlbLocation::Fram => {
                let base = map.tlb_fram_base.expect("fp_tlb_location=Fram implies tlb_fram_base is Some");
                tlb.load_from_fram(fram, base)?;
            }
            crate::config::FpTlbLocation::Flash => {
                tlb.load_from_flash(flash, map.tlb_base)?;
            }
        }

        Ok(FlightPlanEngine { tlb })
    }

    fn persist_cursor<M: FlashMedia, F: FramMedia>(
        &self,
        geometry: &MediaGeometry,
        map: &AddressMap,
        flash: &mut M,
        fram: &mut F,
    ) -> StorageResult<()> {
        let idx = self.tlb.metadata_index();
        self.tlb
            .dump(geometry, map.tlb_base, map.tlb_fram_base.unwrap_or(0), flash, fram, Some(idx))
    }

    /// Looks up the entry scheduled at exactly `unixtime`, if any.
    pub fn fp_get<M: FlashMedia>(
        &self,
        geometry: &MediaGeometry,
        flash: &mut M,
        unixtime: i32,
    ) -> StorageResult<Option<FlightPlanEntry>> {
        match self.tlb.find_index(unixtime) {
            None => Ok(None),
            Some(k) => self.fp_get_idx(geometry, flash, k),
        }
    }

    /// Reads the entry stored at logical TLB slot `k`, if live.
    pub fn fp_get_idx<M: FlashMedia>(
        &self,
        _geometry: &MediaGeometry,
        flash: &mut M,
        k: usize,
    ) -> StorageResult<Option<FlightPlanEntry>> {
        let Some((_, addr)) = self.tlb.get(k) else {
            return Ok(None);
        };
        let mut buf = [0u8; ENTRY_SIZE];
        flash.flash_read(FlashPartition::FlightPlan, addr, &mut buf)?;
        Ok(Some(FlightPlanEntry::decode(&buf)))
    }

    /// Appends a new entry, compacting first if the live section is full.
    /// Returns the logical TLB slot index the entry was stored at.
    ///
    /// Compaction (when triggered) writes the new entry as part of the same
    /// rebuild rather than afterwards: relocating only the existing live
    /// entries would leave the freshly rebuilt section already full,
    /// with no room left for the entry that triggered the rebuild.
    pub fn fp_set<M: FlashMedia, F: FramMedia>(
        &mut self,
        geometry: &MediaGeometry,
        map: &AddressMap,
        flash: &mut M,
        fram: &mut F,
        entry: &FlightPlanEntry,
    ) -> StorageResult<usize> {
        let k = self.tlb.find_index(FP_NULL).ok_or(StorageError::Full)?;

        let commands_per_section = geometry.commands_per_section();
        let (live_section, next_offset) = self.tlb.cursor();
        if next_offset >= commands_per_section {
            return self.compact(geometry, map, flash, fram, Some((k, entry)));
        }

        let section_addr = map.fp_section_addr(geometry, live_section);
        let addr = section_addr + next_offset * geometry.page;

        let mut buf = [0u8; ENTRY_SIZE];
        entry.encode(&mut buf);
        flash.flash_write(FlashPartition::FlightPlan, addr, &buf)?;

        self.tlb.update_in_memory(k, entry.unixtime, addr)?;
        self.tlb.set_cursor(live_section, next_offset + 1);
        self.tlb.dump(geometry, map.tlb_base, map.tlb_fram_base.unwrap_or(0), flash, fram, Some(k))?;
        self.persist_cursor(geometry, map, flash, fram)?;

        Ok(k)
    }

    /// Tombstones the entry scheduled at `unixtime`, if any. Does not erase
    /// flash; the slot is reclaimed on the next compaction.
    pub fn fp_delete<F: FramMedia, M: FlashMedia>(
        &mut self,
        geometry: &MediaGeometry,
        map: &AddressMap,
        flash: &mut M,
        fram: &mut F,
        unixtime: i32,
    ) -> StorageResult<bool> {
        match self.tlb.find_index(unixtime) {
            None => Ok(false),
            Some(k) => {
                self.fp_delete_idx(geometry, map, flash, fram, k)?;
                Ok(true)
            }
        }
    }

    /// Tombstones logical TLB slot `k` directly.
    pub fn fp_delete_idx<F: FramMedia, M: FlashMedia>(
        &mut self,
        geometry: &MediaGeometry,
        map: &AddressMap,
        flash: &mut M,
        fram: &mut F,
        k: usize,
    ) -> StorageResult<()> {
        self.tlb.erase_in_memory(k)?;
        self.tlb.dump(geometry, map.tlb_base, map.tlb_fram_base.unwrap_or(0), flash, fram, Some(k))?;
        Ok(())
    }

    /// Erases every flight-plan section and resets the TLB (and cursor) to
    /// empty.
    pub fn fp_reset<M: FlashMedia, F: FramMedia>(
        &mut self,
        geometry: &MediaGeometry,
        map: &AddressMap,
        flash: &mut M,
        fram: &mut F,
    ) -> StorageResult<()> {
        for s in 0..geometry.fp_sections() {
            flash.flash_erase(FlashPartition::FlightPlan, map.fp_section_addr(geometry, s))?;
        }
        self.tlb.reset_in_memory();
        self.tlb.dump(geometry, map.tlb_base, map.tlb_fram_base.unwrap_or(0), flash, fram, None)?;
        Ok(())
    }

    /// Number of live (non-tombstoned) flight-plan entries.
    pub fn live_count(&self) -> usize {
        self.tlb.live_count()
    }

    /// Iterates live `(slot_index, unixtime, addr)` triples, lowest index
    /// first. Exposed for the repository façade's `fp_purge`, which needs
    /// to find every entry due at or before a given time without going
    /// through the by-time/by-index accessors one at a time.
    pub fn live_entries(&self) -> impl Iterator<Item = (usize, i32, u32)> + '_ {
        self.tlb.live_entries()
    }

    /// Reads back every live entry (in TLB slot order), re-appends them to
    /// the next section, optionally appending `insert` (a not-yet-written
    /// new entry and the TLB slot it belongs in) right after them, erases
    /// the section they came from, and advances the live-section cursor.
    /// Returns the TLB slot index `insert` was written to. Triggered by
    /// `fp_set` once a section fills.
    fn compact<M: FlashMedia, F: FramMedia>(
        &mut self,
        geometry: &MediaGeometry,
        map: &AddressMap,
        flash: &mut M,
        fram: &mut F,
        insert: Option<(usize, &FlightPlanEntry)>,
    ) -> StorageResult<usize> {
        let commands_per_section = geometry.commands_per_section();
        let (old_section, _) = self.tlb.cursor();
        let new_section = (old_section + 1) % geometry.fp_sections();

        let live: heapless::Vec<(usize, FlightPlanEntry), { crate::config::MAX_FP_ENTRIES }> = {
            let mut out = heapless::Vec::new();
            for (k, _, addr) in self.tlb.live_entries() {
                let mut buf = [0u8; ENTRY_SIZE];
                flash.flash_read(FlashPartition::FlightPlan, addr, &mut buf)?;
                let _ = out.push((k, FlightPlanEntry::decode(&buf)));
            }
            out
        };

        let total = live.len() + insert.is_some() as usize;
        if total as u32 > commands_per_section {
            // More live entries than fit in one section; a correctly sized
            // geometry bounds N_max against commands_per_section so this is
            // never reached, but surface it rather than silently drop data
            // that can't fit after compaction.
            return Err(StorageError::Full);
        }

        let new_section_addr = map.fp_section_addr(geometry, new_section);
        for (offset, (k, e)) in live.iter().enumerate() {
            let addr = new_section_addr + (offset as u32) * geometry.page;
            let mut buf = [0u8; ENTRY_SIZE];
            e.encode(&mut buf);
            flash.flash_write(FlashPartition::FlightPlan, addr, &buf)?;
            self.tlb.relocate_in_memory(*k, addr);
        }

        let inserted_k = if let Some((k, e)) = insert {
            let addr = new_section_addr + (live.len() as u32) * geometry.page;
            let mut buf = [0u8; ENTRY_SIZE];
            e.encode(&mut buf);
            flash.flash_write(FlashPartition::FlightPlan, addr, &buf)?;
            self.tlb.update_in_memory(k, e.unixtime, addr)?;
            k
        } else {
            0
        };

        flash.flash_erase(FlashPartition::FlightPlan, map.fp_section_addr(geometry, old_section))?;
        self.tlb.set_cursor(new_section, total as u32);
        self.tlb.dump(geometry, map.tlb_base, map.tlb_fram_base.unwrap_or(0), flash, fram, None)?;
        Ok(inserted_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaGeometry;
    use crate::media::simulation::FixedSimulatedMedia;

    fn geometry() -> MediaGeometry {
        // 2 commands per 1024-byte section at 512 bytes each; N_max=4 so
        // fp_sections() = ceil(4*512/1024)+1 = 2+1 = 3, comfortably more
        // than the live count ever reaches, so compaction always succeeds.
        // fram_size shrunk to fit the small fixed buffers these tests use.
        MediaGeometry::new(0, 4, 1, 1).with_section(1024).with_page(512).with_fram_size(256)
    }

    // `FixedSimulatedMedia` implements both `FlashMedia` and `FramMedia`, so
    // a single instance can't be borrowed mutably for both parameters of one
    // call. Each test below builds two disjoint instances, flash-only and
    // fram-only, over separate backing buffers, the same way lib.rs's own
    // doc example does.

    #[test]
    fn set_then_get_roundtrips() {
        let g = geometry();
        let map = AddressMap::compute(&g);
        let mut flash_buf = [0xFFu8; 1024 * 4];
        let mut fram_buf = [0u8; 256];
        let mut flash = FixedSimulatedMedia::<512, 1024>::new(&mut flash_buf, &mut []);
        let mut fram = FixedSimulatedMedia::<512, 1024>::new(&mut [], &mut fram_buf);

        let mut engine = FlightPlanEngine::init(&g, &map, &mut flash, &mut fram).unwrap();
        let (entry, _) = FlightPlanEntry::new(100, 0, 0, 1, "ping", "");
        engine.fp_set(&g, &map, &mut flash, &mut fram, &entry).unwrap();

        let got = engine.fp_get(&g, &mut flash, 100).unwrap().unwrap();
        assert_eq!(got.cmd.as_str(), "ping");
    }

    #[test]
    fn delete_then_get_returns_none() {
        let g = geometry();
        let map = AddressMap::compute(&g);
        let mut flash_buf = [0xFFu8; 1024 * 4];
        let mut fram_buf = [0u8; 256];
        let mut flash = FixedSimulatedMedia::<512, 1024>::new(&mut flash_buf, &mut []);
        let mut fram = FixedSimulatedMedia::<512, 1024>::new(&mut [], &mut fram_buf);

        let mut engine = FlightPlanEngine::init(&g, &map, &mut flash, &mut fram).unwrap();
        let (entry, _) = FlightPlanEntry::new(100, 0, 0, 1, "ping", "");
        engine.fp_set(&g, &map, &mut flash, &mut fram, &entry).unwrap();
        assert!(engine.fp_delete(&g, &map, &mut flash, &mut fram, 100).unwrap());
        assert!(engine.fp_get(&g, &mut flash, 100).unwrap().is_none());
    }

    #[test]
    fn filling_a_section_triggers_compaction_and_preserves_live_entries() {
        // N_max == commands_per_section == 2: the live section can hold at
        // most two entries at a time, so a compaction is only reachable by
        // first tombstoning one to free a TLB slot and room in the section.
        let g = MediaGeometry::new(0, 2, 1, 1).with_section(1024).with_page(512).with_fram_size(256);
        let map = AddressMap::compute(&g);
        let mut flash_buf = [0xFFu8; 1024 * 4];
        let mut fram_buf = [0u8; 256];
        let mut flash = FixedSimulatedMedia::<512, 1024>::new(&mut flash_buf, &mut []);
        let mut fram = FixedSimulatedMedia::<512, 1024>::new(&mut [], &mut fram_buf);

        let mut engine = FlightPlanEngine::init(&g, &map, &mut flash, &mut fram).unwrap();
        let (e100, _) = FlightPlanEntry::new(100, 0, 0, 1, "ping", "");
        let (e101, _) = FlightPlanEntry::new(101, 0, 0, 1, "ping", "");
        let (e102, _) = FlightPlanEntry::new(102, 0, 0, 1, "ping", "");
        engine.fp_set(&g, &map, &mut flash, &mut fram, &e100).unwrap();
        engine.fp_set(&g, &map, &mut flash, &mut fram, &e101).unwrap();
        engine.fp_delete(&g, &map, &mut flash, &mut fram, 100).unwrap();
        // The section is full (cursor offset == commands_per_section), so
        // this append must compact: relocate 101, drop tombstoned 100,
        // append 102, all into the next section.
        engine.fp_set(&g, &map, &mut flash, &mut fram, &e102).unwrap();

        assert!(engine.fp_get(&g, &mut flash, 100).unwrap().is_none());
        assert!(engine.fp_get(&g, &mut flash, 101).unwrap().is_some());
        assert!(engine.fp_get(&g, &mut flash, 102).unwrap().is_some());
        assert_eq!(engine.live_count(), 2);
    }

    #[test]
    fn reset_clears_all_entries() {
        let g = geometry();
        let map = AddressMap::compute(&g);
        let mut flash_buf = [0xFFu8; 1024 * 4];
        let mut fram_buf = [0u8; 256];
        let mut flash = FixedSimulatedMedia::<512, 1024>::new(&mut flash_buf, &mut []);
        let mut fram = FixedSimulatedMedia::<512, 1024>::new(&mut [], &mut fram_buf);

        let mut engine = FlightPlanEngine::init(&g, &map, &mut flash, &mut fram).unwrap();
        let (entry, _) = FlightPlanEntry::new(100, 0, 0, 1, "ping", "");
        engine.fp_set(&g, &map, &mut flash, &mut fram, &entry).unwrap();
        engine.fp_reset(&g, &map, &mut flash, &mut fram).unwrap();
        assert_eq!(engine.live_count(), 0);
        assert!(engine.fp_get(&g, &mut flash, 100).unwrap().is_none());
    }
}
