//! `fp_tlb`: the flight-plan translation look-aside buffer.
//!
//! A RAM index from logical flight-plan slot to flash address plus
//! scheduled time, backed up to FRAM or flash. Flash erase is expensive and
//! destroys a whole section; this index lets lookups and deletes (tombstone
//! writes) avoid touching flash entirely. The TLB is the single source of
//! truth for which physical entries are live.

use crate::config::{FpTlbLocation, MediaGeometry, MAX_FP_ENTRIES};
use crate::error::{StorageError, StorageResult};
use crate::flight_plan::entry::FP_NULL;
use crate::media::{FlashMedia, FlashPartition, FramMedia};

/// On-disk size of one TLB slot: `i32 unixtime` + `i32 addr`.
pub const TLB_SLOT_BYTES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TlbSlot {
    unixtime: i32,
    addr: i32,
}

impl TlbSlot {
    const EMPTY: TlbSlot = TlbSlot { unixtime: FP_NULL, addr: FP_NULL };

    fn encode(&self) -> [u8; TLB_SLOT_BYTES] {
        let mut out = [0u8; TLB_SLOT_BYTES];
        out[0..4].copy_from_slice(&self.unixtime.to_le_bytes());
        out[4..8].copy_from_slice(&self.addr.to_le_bytes());
        out
    }

    fn decode(buf: &[u8]) -> Self {
        TlbSlot {
            unixtime: i32::from_le_bytes(buf[0..4].try_into().unwrap()),
            addr: i32::from_le_bytes(buf[4..8].try_into().unwrap()),
        }
    }
}

/// The in-RAM flight-plan index. Slot `k < n_max` holds `{unixtime,
/// flash_addr}` for the k-th logical entry, or `{-1,-1}` if empty. Slot
/// `n_max` is metadata: its `addr` field is the next-free-append counter
/// within the live flight-plan section; its `unixtime` field is unused.
pub struct Tlb {
    slots: heapless::Vec<TlbSlot, { MAX_FP_ENTRIES + 1 }>,
    n_max: usize,
}

impl Tlb {
    /// Builds an all-empty TLB for `n_max` logical entries (plus the one
    /// metadata slot).
    pub fn new(n_max: usize) -> Self {
        assert!(n_max <= MAX_FP_ENTRIES, "n_max exceeds MAX_FP_ENTRIES");
        let mut slots = heapless::Vec::new();
        for _ in 0..=n_max {
            let _ = slots.push(TlbSlot::EMPTY);
        }
        Tlb { slots, n_max }
    }

    /// Index of the metadata slot. Its `unixtime` field holds the index of
    /// the flight-plan section currently being appended to; its `addr`
    /// field holds the number of entries (live or tombstoned) already
    /// written into that section. Exposed so the engine can persist the
    /// cursor via `dump(..., Some(tlb.metadata_index()))`.
    pub fn metadata_index(&self) -> usize {
        self.n_max
    }

    /// `(live_section, next_offset)`: which flight-plan section is being
    /// appended to, and how many entries have been written into it so far.
    pub fn cursor(&self) -> (u32, u32) {
        let meta = self.slots[self.metadata_index()];
        (meta.unixtime.max(0) as u32, meta.addr.max(0) as u32)
    }

    /// Sets the append cursor. Does not persist; call `dump` afterwards.
    pub fn set_cursor(&mut self, live_section: u32, next_offset: u32) {
        let idx = self.metadata_index();
        self.slots[idx] = TlbSlot { unixtime: live_section as i32, addr: next_offset as i32 };
    }

    /// Reads `sizeof(tlb)` bytes from FRAM into RAM (`load_tlb`). An
    /// all-`0xFF` medium (cold boot) is interpreted as the empty TLB.
    pub fn load_from_fram<F: FramMedia>(&mut self, fram: &mut F, fram_base: u32) -> StorageResult<()> {
        let mut buf = [0u8; TLB_SLOT_BYTES];
        let mut all_ff = true;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            fram.fram_read(fram_base + (i * TLB_SLOT_BYTES) as u32, &mut buf)?;
            if buf.iter().any(|&b| b != 0xFF) {
                all_ff = false;
            }
            *slot = TlbSlot::decode(&buf);
        }
        if all_ff {
            for slot in self.slots.iter_mut() {
                *slot = TlbSlot::EMPTY;
            }
        }
        Ok(())
    }

    /// Reads the TLB back from its flash backup section (`load_tlb`,
    /// `FP_TLB_LOCATION=FLASH` mode).
    pub fn load_from_flash<M: FlashMedia>(&mut self, flash: &mut M, tlb_base: u32) -> StorageResult<()> {
        let mut buf = [0u8; TLB_SLOT_BYTES];
        let mut all_ff = true;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            flash.flash_read(FlashPartition::Tlb, tlb_base + (i * TLB_SLOT_BYTES) as u32, &mut buf)?;
            if buf.iter().any(|&b| b != 0xFF) {
                all_ff = false;
            }
            *slot = TlbSlot::decode(&buf);
        }
        if all_ff {
            for slot in self.slots.iter_mut() {
                *slot = TlbSlot::EMPTY;
            }
        }
        Ok(())
    }

    /// Persists slot `k` (or the whole table if `k` is `None`) back to FRAM.
    pub fn dump_to_fram<F: FramMedia>(&self, fram: &mut F, fram_base: u32, k: Option<usize>) -> StorageResult<()> {
        match k {
            Some(k) => fram.fram_write(fram_base + (k * TLB_SLOT_BYTES) as u32, &self.slots[k].encode())?,
            None => {
                for (i, slot) in self.slots.iter().enumerate() {
                    fram.fram_write(fram_base + (i * TLB_SLOT_BYTES) as u32, &slot.encode())?;
                }
            }
        }
        Ok(())
    }

    /// Persists the whole TLB to its flash backup section. The section is
    /// erased and rewritten in page-sized chunks; `PAGE mod
    /// sizeof(tlb_entry) == 0` is required so slot boundaries coincide with
    /// page boundaries (asserted by `assert_tlb_packs_pages`).
    pub fn dump_to_flash<M: FlashMedia>(&self, flash: &mut M, tlb_base: u32, geometry: &MediaGeometry) -> StorageResult<()> {
        flash.flash_erase(FlashPartition::Tlb, tlb_base)?;
        let slots_per_page = (geometry.page as usize) / TLB_SLOT_BYTES;
        let mut page = [0u8; 4096];
        let page_bytes = geometry.page as usize;
        assert!(page_bytes <= page.len(), "flight-plan page size exceeds scratch buffer");

        let mut i = 0;
        while i < self.slots.len() {
            let chunk_end = (i + slots_per_page).min(self.slots.len());
            let chunk = &mut page[..page_bytes];
            chunk.fill(0xFF);
            for (offset, slot) in self.slots[i..chunk_end].iter().enumerate() {
                let start = offset * TLB_SLOT_BYTES;
                chunk[start..start + TLB_SLOT_BYTES].copy_from_slice(&slot.encode());
            }
            flash.flash_write(FlashPartition::Tlb, tlb_base + (i * TLB_SLOT_BYTES) as u32, chunk)?;
            i = chunk_end;
        }
        Ok(())
    }

    /// Persists the whole TLB to whichever backing the geometry specifies.
    pub fn dump<M: FlashMedia, F: FramMedia>(
        &self,
        geometry: &MediaGeometry,
        tlb_base: u32,
        fram_base: u32,
        flash: &mut M,
        fram: &mut F,
        k: Option<usize>,
    ) -> StorageResult<()> {
        match geometry.fp_tlb_location {
            FpTlbLocation::Fram => self.dump_to_fram(fram, fram_base, k),
            FpTlbLocation::Flash => self.dump_to_flash(flash, tlb_base, geometry),
        }
    }

    /// Linear scan for the first slot whose `unixtime` matches. Passing
    /// `FP_NULL` finds the first free slot.
    pub fn find_index(&self, unixtime: i32) -> Option<usize> {
        self.slots[..self.n_max].iter().position(|s| s.unixtime == unixtime)
    }

    /// `true` if slot `k` is tombstoned or out of range.
    pub fn is_empty_slot(&self, k: usize) -> bool {
        self.slots.get(k).map(|s| s.unixtime == FP_NULL).unwrap_or(true)
    }

    /// The `(unixtime, addr)` recorded at slot `k`, if live.
    pub fn get(&self, k: usize) -> Option<(i32, u32)> {
        let slot = self.slots.get(k)?;
        if slot.unixtime == FP_NULL {
            None
        } else {
            Some((slot.unixtime, slot.addr as u32))
        }
    }

    /// Sets slot `k` to `{unixtime, addr}`. Does not touch the append
    /// cursor or persist; call `set_cursor` and `dump` afterwards.
    pub fn update_in_memory(&mut self, k: usize, unixtime: i32, addr: u32) -> StorageResult<()> {
        if k >= self.n_max {
            return Err(StorageError::Bounds { what: "tlb slot index" });
        }
        self.slots[k] = TlbSlot { unixtime, addr: addr as i32 };
        Ok(())
    }

    /// Tombstones slot `k` in memory. Does not persist or touch flash.
    pub fn erase_in_memory(&mut self, k: usize) -> StorageResult<()> {
        if k >= self.n_max {
            return Err(StorageError::Bounds { what: "tlb slot index" });
        }
        self.slots[k] = TlbSlot::EMPTY;
        Ok(())
    }

    /// Resets every logical slot to empty and the counter to 0. Does not
    /// persist; call `dump` afterwards.
    pub fn reset_in_memory(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = TlbSlot::EMPTY;
        }
    }

    /// Iterates live `(slot_index, unixtime, addr)` triples, lowest index
    /// first, used by compaction and by `fp_purge`.
    pub fn live_entries(&self) -> impl Iterator<Item = (usize, i32, u32)> + '_ {
        self.slots[..self.n_max]
            .iter()
            .enumerate()
            .filter(|(_, s)| s.unixtime != FP_NULL)
            .map(|(i, s)| (i, s.unixtime, s.addr as u32))
    }

    /// Number of live (non-tombstoned) entries.
    pub fn live_count(&self) -> usize {
        self.live_entries().count()
    }

    /// Logical capacity (`N_max`), excluding the metadata slot.
    pub fn capacity(&self) -> usize {
        self.n_max
    }

    /// Sets slot `k`'s addr directly (used by compaction, which recomputes
    /// addresses without changing `unixtime`). Does not touch the counter.
    pub fn relocate_in_memory(&mut self, k: usize, new_addr: u32) {
        self.slots[k].addr = new_addr as i32;
    }
}

/// Asserts `PAGE mod sizeof(tlb_entry) == 0`, so TLB slot boundaries
/// coincide with flash page boundaries when the TLB is backed up to flash.
pub fn assert_tlb_packs_pages(geometry: &MediaGeometry) {
    assert_eq!(
        geometry.page as usize % TLB_SLOT_BYTES,
        0,
        "PAGE must be a multiple of the TLB slot size"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tlb_is_all_empty() {
        let tlb = Tlb::new(3);
        assert_eq!(tlb.find_index(FP_NULL), Some(0));
        assert_eq!(tlb.live_count(), 0);
        assert_eq!(tlb.cursor(), (0, 0));
    }

    #[test]
    fn update_sets_slot_and_is_findable() {
        let mut tlb = Tlb::new(3);
        tlb.update_in_memory(0, 100, 0x1000).unwrap();
        tlb.set_cursor(0, 1);
        assert_eq!(tlb.cursor(), (0, 1));
        assert_eq!(tlb.find_index(100), Some(0));
        assert_eq!(tlb.get(0), Some((100, 0x1000)));
    }

    #[test]
    fn erase_tombstones_without_touching_cursor() {
        let mut tlb = Tlb::new(3);
        tlb.update_in_memory(0, 100, 0x1000).unwrap();
        tlb.set_cursor(0, 1);
        tlb.erase_in_memory(0).unwrap();
        assert_eq!(tlb.cursor(), (0, 1));
        assert_eq!(tlb.find_index(100), None);
        assert_eq!(tlb.get(0), None);
    }

    #[test]
    fn find_index_returns_lowest_match() {
        let mut tlb = Tlb::new(3);
        tlb.update_in_memory(0, 100, 0).unwrap();
        tlb.update_in_memory(1, 100, 512).unwrap();
        assert_eq!(tlb.find_index(100), Some(0));
    }
}
