//! Repository façade: serializes every storage call through one mutex and
//! maintains the derived counters (`fpl_queue`, per-payload write cursors)
//! that the individual engines have no reason to know about themselves.
//!
//! One lock, one owning value: every public entry point takes the mutex
//! for the duration of the call and releases it on return, so the status,
//! flight-plan and payload tables never see a partially-applied operation
//! from another caller.

use crate::config::MediaGeometry;
use crate::error::{StorageError, StorageResult};
use crate::flight_plan::entry::CMD_MAX_STR_PARAMS;
use crate::flight_plan::{FlightPlanEngine, FlightPlanEntry, FP_NULL};
use crate::map::AddressMap;
use crate::media::{FlashMedia, FramMedia};
use crate::payload::schema::PayloadSchema;
use crate::payload::store::PayloadStore;
use crate::status::StatusTable;
use crate::value32::Value32;

struct Inner<M, F> {
    geometry: MediaGeometry,
    map: AddressMap,
    flash: M,
    fram: F,
    open: bool,
    status: Option<StatusTable>,
    flight_plan: Option<FlightPlanEngine>,
    fpl_queue_index: Option<u32>,
    payload: Option<PayloadStore>,
    payload_next_index: heapless::Vec<u32, { crate::config::MAX_PAYLOAD_SECTIONS }>,
    payload_sys_index: heapless::Vec<u32, { crate::config::MAX_PAYLOAD_SECTIONS }>,
}

/// The single entry point the rest of the satellite software talks to.
/// Every method takes the internal mutex for its whole duration; there is
/// no finer-grained locking.
pub struct Repository<M, F> {
    inner: spin::Mutex<Inner<M, F>>,
}

impl<M: FlashMedia, F: FramMedia> Repository<M, F> {
    /// `storage_init(descriptor)`: takes ownership of the media backends
    /// and computes the address map once. The three typed tables (status,
    /// flight-plan, payload) are not yet usable until their own `*_init`
    /// is called; `storage_init` only opens the backend.
    pub fn storage_init(geometry: MediaGeometry, flash: M, fram: F) -> Self {
        let map = AddressMap::compute(&geometry);
        Repository {
            inner: spin::Mutex::new(Inner {
                geometry,
                map,
                flash,
                fram,
                open: true,
                status: None,
                flight_plan: None,
                fpl_queue_index: None,
                payload: None,
                payload_next_index: heapless::Vec::new(),
                payload_sys_index: heapless::Vec::new(),
            }),
        }
    }

    /// `storage_close()`: no operation after this point succeeds until a
    /// new `Repository` is constructed.
    pub fn storage_close(&self) {
        self.inner.lock().open = false;
    }

    /// Releases the underlying flash and FRAM media, consuming this
    /// repository. Mirrors the `free(self)` pattern the hardware media
    /// backends use to hand their bus and chip-select pin back to the
    /// caller. A cold-boot or reset simulation reopens a fresh
    /// `Repository` over the same two media values, so the engines'
    /// `*_init` methods re-run `load_tlb` against already-persisted
    /// bytes exactly as they would after a real power cycle.
    pub fn into_media(self) -> (M, F) {
        let inner = self.inner.into_inner();
        (inner.flash, inner.fram)
    }

    fn with_open<R>(&self, f: impl FnOnce(&mut Inner<M, F>) -> StorageResult<R>) -> StorageResult<R> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(StorageError::NotOpen);
        }
        f(&mut inner)
    }

    // --- status table -----------------------------------------------

    /// `storage_table_status_init(name, len, drop)`.
    pub fn storage_table_status_init(&self, n_vars: u32, defaults: &[Value32], drop: bool) -> StorageResult<()> {
        self.with_open(|inner| {
            let table = StatusTable::init(&inner.geometry, &mut inner.fram, n_vars, defaults, drop)?;
            inner.status = Some(table);
            Ok(())
        })
    }

    /// `status_get_value_idx(index)`.
    pub fn status_get_value_idx(&self, index: u32) -> StorageResult<Value32> {
        self.with_open(|inner| {
            let table = inner.status.as_ref().ok_or(StorageError::NotOpen)?;
            table.status_get(&mut inner.fram, index)
        })
    }

    /// `status_set_value_idx(index, v)`.
    pub fn status_set_value_idx(&self, index: u32, v: Value32) -> StorageResult<()> {
        self.with_open(|inner| {
            let table = inner.status.as_ref().ok_or(StorageError::NotOpen)?;
            table.status_set(&mut inner.fram, index, v)
        })
    }

    // --- flight plan --------------------------------------------------

    /// `storage_table_flight_plan_init(name, N_max, drop)`. `fpl_queue_index`
    /// is the status-table slot the façade mirrors the live-entry count
    /// into; a concrete façade has to be told where to put the counter it
    /// maintains. When `drop` is set, any existing flight-plan contents
    /// are wiped (mirrors the status table's own `drop` semantics).
    pub fn storage_table_flight_plan_init(&self, n_max: u32, drop: bool, fpl_queue_index: u32) -> StorageResult<()> {
        self.with_open(|inner| {
            let engine = FlightPlanEngine::init(&inner.geometry, &inner.map, &mut inner.flash, &mut inner.fram)?;
            inner.flight_plan = Some(engine);
            inner.fpl_queue_index = Some(fpl_queue_index);
            if drop {
                let geometry = inner.geometry;
                let map = inner.map.clone();
                inner
                    .flight_plan
                    .as_mut()
                    .unwrap()
                    .fp_reset(&geometry, &map, &mut inner.flash, &mut inner.fram)?;
            }
            Self::write_fpl_queue(inner)
        })
    }

    fn write_fpl_queue(inner: &mut Inner<M, F>) -> StorageResult<()> {
        if let (Some(idx), Some(engine)) = (inner.fpl_queue_index, inner.flight_plan.as_ref()) {
            let count = engine.live_count() as i32;
            if let Some(status) = inner.status.as_ref() {
                status.status_set(&mut inner.fram, idx, Value32::from_i32(count))?;
            }
        }
        Ok(())
    }

    fn adjust_fpl_queue(inner: &mut Inner<M, F>, delta: i32) -> StorageResult<()> {
        if let (Some(idx), Some(status)) = (inner.fpl_queue_index, inner.status.as_ref()) {
            let current = status.status_get(&mut inner.fram, idx)?.as_i32();
            status.status_set(&mut inner.fram, idx, Value32::from_i32(current + delta))?;
        }
        Ok(())
    }

    /// `flight_plan_set(entry)`. Increments `fpl_queue` on success.
    pub fn flight_plan_set(&self, entry: &FlightPlanEntry) -> StorageResult<usize> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let map = inner.map.clone();
            let k = inner
                .flight_plan
                .as_mut()
                .ok_or(StorageError::NotOpen)?
                .fp_set(&geometry, &map, &mut inner.flash, &mut inner.fram, entry)?;
            Self::adjust_fpl_queue(inner, 1)?;
            Ok(k)
        })
    }

    /// `flight_plan_get_st(t)`. Decrements `fpl_queue` on a successful hit.
    pub fn flight_plan_get_st(&self, unixtime: i32) -> StorageResult<Option<FlightPlanEntry>> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let found = inner
                .flight_plan
                .as_ref()
                .ok_or(StorageError::NotOpen)?
                .fp_get(&geometry, &mut inner.flash, unixtime)?;
            if found.is_some() {
                Self::adjust_fpl_queue(inner, -1)?;
            }
            Ok(found)
        })
    }

    /// `flight_plan_get_idx(k)`.
    pub fn flight_plan_get_idx(&self, k: usize) -> StorageResult<Option<FlightPlanEntry>> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let found = inner
                .flight_plan
                .as_ref()
                .ok_or(StorageError::NotOpen)?
                .fp_get_idx(&geometry, &mut inner.flash, k)?;
            if found.is_some() {
                Self::adjust_fpl_queue(inner, -1)?;
            }
            Ok(found)
        })
    }

    /// `flight_plan_get_args(t)`: returns the entry's arguments and a
    /// best-effort truncation flag, in fixed-capacity buffers sized
    /// `CMD_MAX_STR_PARAMS`.
    pub fn flight_plan_get_args(&self, unixtime: i32) -> StorageResult<Option<(heapless::String<CMD_MAX_STR_PARAMS>, bool)>> {
        let entry = self.flight_plan_get_st(unixtime)?;
        Ok(entry.map(|e| {
            let truncated = e.args_may_be_truncated();
            (e.args, truncated)
        }))
    }

    /// `flight_plan_delete_row(t)`. Decrements `fpl_queue` on success.
    pub fn flight_plan_delete_row(&self, unixtime: i32) -> StorageResult<bool> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let map = inner.map.clone();
            let deleted = inner
                .flight_plan
                .as_mut()
                .ok_or(StorageError::NotOpen)?
                .fp_delete(&geometry, &map, &mut inner.flash, &mut inner.fram, unixtime)?;
            if deleted {
                Self::adjust_fpl_queue(inner, -1)?;
            }
            Ok(deleted)
        })
    }

    /// `flight_plan_delete_row_idx(k)`.
    pub fn flight_plan_delete_row_idx(&self, k: usize) -> StorageResult<()> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let map = inner.map.clone();
            let was_live = inner
                .flight_plan
                .as_ref()
                .ok_or(StorageError::NotOpen)?
                .fp_get_idx(&geometry, &mut inner.flash, k)?
                .is_some();
            inner
                .flight_plan
                .as_mut()
                .ok_or(StorageError::NotOpen)?
                .fp_delete_idx(&geometry, &map, &mut inner.flash, &mut inner.fram, k)?;
            if was_live {
                Self::adjust_fpl_queue(inner, -1)?;
            }
            Ok(())
        })
    }

    /// `flight_plan_reset()`. Sets `fpl_queue` to 0 unconditionally.
    pub fn flight_plan_reset(&self) -> StorageResult<()> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let map = inner.map.clone();
            inner
                .flight_plan
                .as_mut()
                .ok_or(StorageError::NotOpen)?
                .fp_reset(&geometry, &map, &mut inner.flash, &mut inner.fram)?;
            Self::write_fpl_queue(inner)
        })
    }

    /// `fp_purge()`: deletes every entry whose `unixtime` is non-empty
    /// and at or before `now`, then recounts and rewrites `fpl_queue`.
    pub fn fp_purge(&self, now: i32) -> StorageResult<usize> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let map = inner.map.clone();
            let engine = inner.flight_plan.as_ref().ok_or(StorageError::NotOpen)?;
            let due: heapless::Vec<usize, { crate::config::MAX_FP_ENTRIES }> = engine
                .live_entries()
                .filter(|&(_, t, _)| t != FP_NULL && t <= now)
                .map(|(k, _, _)| k)
                .collect();

            let mut purged = 0usize;
            for k in due {
                inner
                    .flight_plan
                    .as_mut()
                    .unwrap()
                    .fp_delete_idx(&geometry, &map, &mut inner.flash, &mut inner.fram, k)?;
                purged += 1;
            }
            Self::write_fpl_queue(inner)?;
            Ok(purged)
        })
    }

    // --- payload store -------------------------------------------------

    /// `storage_table_payload_init(name, schemas, P, drop)`. When `drop`,
    /// every payload's sections are erased and its write cursor (mirrored
    /// into the status table at `schema.sys_index`) reset to 0; otherwise
    /// the cursor is read back from the status table so appends resume
    /// where they left off.
    pub fn storage_table_payload_init(&self, schemas: &[PayloadSchema], drop: bool) -> StorageResult<()> {
        self.with_open(|inner| {
            let store = PayloadStore::init(&inner.geometry, schemas)?;
            inner.payload = Some(store);
            inner.payload_next_index = heapless::Vec::new();
            inner.payload_sys_index = heapless::Vec::new();
            for schema in schemas {
                let _ = inner.payload_sys_index.push(schema.sys_index as u32);
            }

            if drop {
                let geometry = inner.geometry;
                let map = inner.map.clone();
                inner.payload.as_ref().unwrap().payload_reset(&geometry, &map, &mut inner.flash)?;
                for _ in schemas {
                    let _ = inner.payload_next_index.push(0);
                }
                Self::write_payload_cursors(inner)?;
            } else {
                for &sys_index in inner.payload_sys_index.clone().iter() {
                    let cursor = match inner.status.as_ref() {
                        Some(status) => status.status_get(&mut inner.fram, sys_index)?.as_i32().max(0) as u32,
                        None => 0,
                    };
                    let _ = inner.payload_next_index.push(cursor);
                }
            }
            Ok(())
        })
    }

    fn write_payload_cursors(inner: &mut Inner<M, F>) -> StorageResult<()> {
        if let Some(status) = inner.status.as_ref() {
            for (sys_index, cursor) in inner.payload_sys_index.iter().zip(inner.payload_next_index.iter()) {
                status.status_set(&mut inner.fram, *sys_index, Value32::from_i32(*cursor as i32))?;
            }
        }
        Ok(())
    }

    /// `payload_set_data(p, i, data, schema)`: writes an explicit sample
    /// index, bypassing the façade's auto-append cursor. Useful for
    /// rewriting a known slot; most callers want [`Self::payload_append`].
    pub fn payload_set_data(&self, p: u32, i: u32, data: &[u8]) -> StorageResult<()> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let map = inner.map.clone();
            inner
                .payload
                .as_ref()
                .ok_or(StorageError::NotOpen)?
                .payload_set_data(&geometry, &map, &mut inner.flash, p, i, data)
        })
    }

    /// Writes `data` at the next free sample index for payload `p` and
    /// advances (and mirrors to the status table) that payload's write
    /// cursor. Returns the index written.
    pub fn payload_append(&self, p: u32, data: &[u8]) -> StorageResult<u32> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let map = inner.map.clone();
            let i = *inner
                .payload_next_index
                .get(p as usize)
                .ok_or(StorageError::Bounds { what: "payload index" })?;
            inner
                .payload
                .as_ref()
                .ok_or(StorageError::NotOpen)?
                .payload_set_data(&geometry, &map, &mut inner.flash, p, i, data)?;
            inner.payload_next_index[p as usize] = i + 1;
            Self::write_payload_cursors(inner)?;
            Ok(i)
        })
    }

    /// `payload_get_data(p, i, buf, schema)`.
    pub fn payload_get_data(&self, p: u32, i: u32, buf: &mut [u8]) -> StorageResult<()> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let map = inner.map.clone();
            inner
                .payload
                .as_ref()
                .ok_or(StorageError::NotOpen)?
                .payload_get_data(&geometry, &map, &mut inner.flash, p, i, buf)
        })
    }

    /// `payload_reset_table(p)`. Resets that payload's write cursor to 0.
    pub fn payload_reset_table(&self, p: u32) -> StorageResult<()> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let map = inner.map.clone();
            inner
                .payload
                .as_ref()
                .ok_or(StorageError::NotOpen)?
                .payload_reset_table(&geometry, &map, &mut inner.flash, p)?;
            if let Some(slot) = inner.payload_next_index.get_mut(p as usize) {
                *slot = 0;
            }
            Self::write_payload_cursors(inner)
        })
    }

    /// `payload_reset()`. Resets every payload's write cursor to 0.
    pub fn payload_reset(&self) -> StorageResult<()> {
        self.with_open(|inner| {
            let geometry = inner.geometry;
            let map = inner.map.clone();
            inner
                .payload
                .as_ref()
                .ok_or(StorageError::NotOpen)?
                .payload_reset(&geometry, &map, &mut inner.flash)?;
            for slot in inner.payload_next_index.iter_mut() {
                *slot = 0;
            }
            Self::write_payload_cursors(inner)
        })
    }
}

/// `ST_OK`/`ST_ERROR`-shaped compatibility layer for callers (e.g. a thin
/// FFI edge or a legacy command handler) that still expect `i32` status
/// codes instead of `Result`.
pub mod status_codes {
    use crate::error::StorageResult;

    /// Operation succeeded.
    pub const ST_OK: i32 = 0;
    /// Operation failed; see the logged `StorageError` for the reason.
    pub const ST_ERROR: i32 = -1;

    /// Collapses any `StorageResult` into `ST_OK`/`ST_ERROR`.
    pub fn to_code<T>(result: &StorageResult<T>) -> i32 {
        if result.is_ok() {
            ST_OK
        } else {
            ST_ERROR
        }
    }

    /// ORs several sub-operations' outcomes together, matching how the
    /// façade combines multi-step operations' statuses.
    pub fn or_codes(codes: &[i32]) -> i32 {
        if codes.iter().all(|&c| c == ST_OK) {
            ST_OK
        } else {
            ST_ERROR
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::media::simulation::SimulatedMedia;

    // The heap-owned simulation backend (`std` feature) sidesteps the
    // borrowed-buffer lifetime `FixedSimulatedMedia` would otherwise tie to
    // the enclosing test function, which is all these façade tests need:
    // exercising the locking and counter bookkeeping, not the media layer
    // itself (already covered in `media::simulation`'s own tests).
    type Flash = SimulatedMedia<512, 1024>;
    type Fram = SimulatedMedia<512, 1024>;

    fn geometry() -> MediaGeometry {
        MediaGeometry::new(0, 4, 1, 2).with_section(1024).with_page(512).with_fram_size(512)
    }

    fn repo() -> Repository<Flash, Fram> {
        let g = geometry();
        let flash = SimulatedMedia::<512, 1024>::new(1024 * 8, 0);
        let fram = SimulatedMedia::<512, 1024>::new(1024, 512);
        Repository::storage_init(g, flash, fram)
    }

    const FPL_QUEUE_INDEX: u32 = 0;

    #[test]
    fn flight_plan_set_increments_and_get_decrements_fpl_queue() {
        let repo = repo();
        repo.storage_table_status_init(4, &[], true).unwrap();
        repo.storage_table_flight_plan_init(4, true, FPL_QUEUE_INDEX).unwrap();

        let (entry, _) = FlightPlanEntry::new(100, 0, 0, 1, "ping", "");
        repo.flight_plan_set(&entry).unwrap();
        assert_eq!(repo.status_get_value_idx(FPL_QUEUE_INDEX).unwrap().as_i32(), 1);

        repo.flight_plan_get_st(100).unwrap();
        assert_eq!(repo.status_get_value_idx(FPL_QUEUE_INDEX).unwrap().as_i32(), 0);
    }

    #[test]
    fn fp_purge_removes_due_entries_and_recomputes_fpl_queue() {
        let repo = repo();
        repo.storage_table_status_init(4, &[], true).unwrap();
        repo.storage_table_flight_plan_init(4, true, FPL_QUEUE_INDEX).unwrap();

        for t in [500, 1500, 2500] {
            let (entry, _) = FlightPlanEntry::new(t, 0, 0, 1, "ping", "");
            repo.flight_plan_set(&entry).unwrap();
        }

        let purged = repo.fp_purge(1000).unwrap();
        assert_eq!(purged, 1);
        assert!(repo.flight_plan_get_idx(0).unwrap().is_none());
        assert_eq!(repo.status_get_value_idx(FPL_QUEUE_INDEX).unwrap().as_i32(), 2);
    }

    #[test]
    fn operations_fail_after_storage_close() {
        let repo = repo();
        repo.storage_table_status_init(4, &[], true).unwrap();
        repo.storage_close();
        assert_eq!(repo.status_get_value_idx(0), Err(StorageError::NotOpen));
    }

    #[test]
    fn payload_append_advances_cursor_and_persists_it() {
        let repo = repo();
        repo.storage_table_status_init(4, &[], true).unwrap();
        let schema = PayloadSchema::new(4, 2, "%d", "count").unwrap();
        repo.storage_table_payload_init(core::slice::from_ref(&schema), true).unwrap();

        let i0 = repo.payload_append(0, &1i32.to_le_bytes()).unwrap();
        let i1 = repo.payload_append(0, &2i32.to_le_bytes()).unwrap();
        assert_eq!((i0, i1), (0, 1));
        assert_eq!(repo.status_get_value_idx(2).unwrap().as_i32(), 2);

        let mut buf = [0u8; 4];
        repo.payload_get_data(0, 1, &mut buf).unwrap();
        assert_eq!(i32::from_le_bytes(buf), 2);
    }

    #[test]
    fn status_codes_round_trip() {
        let ok: StorageResult<()> = Ok(());
        let err: StorageResult<()> = Err(StorageError::NotOpen);
        assert_eq!(status_codes::to_code(&ok), status_codes::ST_OK);
        assert_eq!(status_codes::to_code(&err), status_codes::ST_ERROR);
        assert_eq!(status_codes::or_codes(&[status_codes::ST_OK, status_codes::ST_OK]), status_codes::ST_OK);
        assert_eq!(status_codes::or_codes(&[status_codes::ST_OK, status_codes::ST_ERROR]), status_codes::ST_ERROR);
    }
}
