//! Status table: a fixed-index array of [`Value32`](crate::value32::Value32)
//! in FRAM, optionally triple-written for voting.

use crate::config::{MediaGeometry, MAX_STATUS_VARS};
use crate::error::{StorageError, StorageResult};
use crate::media::FramMedia;
use crate::value32::Value32;

/// Byte offset within FRAM where the status table's first copy begins.
/// The flight-plan TLB backup (when FRAM-resident) lives at the opposite
/// end of FRAM, at `FRAM_SIZE - sizeof(tlb)`.
pub const FRAM_STATUS_BASE: u32 = 0;

/// Fixed-index array of `value32`s mirrored in FRAM, 1 or 3 physical
/// copies per logical index depending on [`MediaGeometry::triple_write`].
pub struct StatusTable {
    n_vars: u32,
    triple_write: bool,
}

impl StatusTable {
    /// `status_init(len, drop)`: if `drop`, (re)writes every variable's
    /// default value across its copies; otherwise FRAM contents are left
    /// as-is, since values are expected to survive a reset.
    pub fn init<F: FramMedia>(
        geometry: &MediaGeometry,
        fram: &mut F,
        n_vars: u32,
        defaults: &[Value32],
        drop: bool,
    ) -> StorageResult<Self> {
        if n_vars as usize > MAX_STATUS_VARS {
            return Err(StorageError::Bounds { what: "status table length" });
        }
        let copies = if geometry.triple_write { 3 } else { 1 };
        if n_vars as usize * copies * 4 > geometry.fram_size as usize {
            return Err(StorageError::Bounds { what: "status table exceeds FRAM capacity" });
        }

        let table = StatusTable { n_vars, triple_write: geometry.triple_write };
        if drop {
            for i in 0..n_vars {
                let v = defaults.get(i as usize).copied().unwrap_or_default();
                table.status_set(fram, i, v)?;
            }
        }
        Ok(table)
    }

    fn copy_addr(&self, index: u32, copy: u32) -> u32 {
        FRAM_STATUS_BASE + (copy * self.n_vars + index) * 4
    }

    fn read_copy<F: FramMedia>(&self, fram: &mut F, index: u32, copy: u32) -> StorageResult<Value32> {
        let mut buf = [0u8; 4];
        fram.fram_read(self.copy_addr(index, copy), &mut buf)?;
        Ok(Value32::from_bits(u32::from_le_bytes(buf)))
    }

    fn write_copy<F: FramMedia>(&self, fram: &mut F, index: u32, copy: u32, v: Value32) -> StorageResult<()> {
        fram.fram_write(self.copy_addr(index, copy), &v.to_bits().to_le_bytes())?;
        Ok(())
    }

    /// `status_get(index) -> value32`: in triple-write mode, reads all
    /// three copies and returns the majority value; with no majority, logs
    /// and reports [`StorageError::Voting`] rather than silently returning
    /// an arbitrary copy.
    pub fn status_get<F: FramMedia>(&self, fram: &mut F, index: u32) -> StorageResult<Value32> {
        if index >= self.n_vars {
            return Err(StorageError::Bounds { what: "status index" });
        }
        let v1 = self.read_copy(fram, index, 0)?;
        if !self.triple_write {
            return Ok(v1);
        }
        let v2 = self.read_copy(fram, index, 1)?;
        let v3 = self.read_copy(fram, index, 2)?;

        if v1 == v2 || v1 == v3 {
            Ok(v1)
        } else if v2 == v3 {
            Ok(v2)
        } else {
            crate::storage_error!("status index {} has no majority among its three copies", index);
            Err(StorageError::Voting)
        }
    }

    /// `status_set(index, v)`: writes one copy, or all three, depending on
    /// `triple_write`.
    pub fn status_set<F: FramMedia>(&self, fram: &mut F, index: u32, v: Value32) -> StorageResult<()> {
        if index >= self.n_vars {
            return Err(StorageError::Bounds { what: "status index" });
        }
        self.write_copy(fram, index, 0, v)?;
        if self.triple_write {
            self.write_copy(fram, index, 1, v)?;
            self.write_copy(fram, index, 2, v)?;
        }
        Ok(())
    }

    /// Number of logical status variables.
    pub fn len(&self) -> u32 {
        self.n_vars
    }

    /// `true` if this table has zero variables.
    pub fn is_empty(&self) -> bool {
        self.n_vars == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::simulation::FixedSimulatedMedia;

    fn geometry(triple_write: bool) -> MediaGeometry {
        MediaGeometry::new(0, 0, 1, 0).with_fram_size(256).with_triple_write(triple_write)
    }

    #[test]
    fn single_copy_roundtrips() {
        let g = geometry(false);
        let mut flash_buf = [0xFFu8; 1024];
        let mut fram_buf = [0u8; 256];
        let mut media = FixedSimulatedMedia::<512, 1024>::new(&mut flash_buf, &mut fram_buf);

        let table = StatusTable::init(&g, &mut media, 4, &[], false).unwrap();
        table.status_set(&mut media, 2, Value32::from_i32(0xA5)).unwrap();
        assert_eq!(table.status_get(&mut media, 2).unwrap().as_i32(), 0xA5);
    }

    #[test]
    fn triple_write_tolerates_single_corruption() {
        let g = geometry(true);
        let mut flash_buf = [0xFFu8; 1024];
        let mut fram_buf = [0u8; 256];
        let mut media = FixedSimulatedMedia::<512, 1024>::new(&mut flash_buf, &mut fram_buf);

        let table = StatusTable::init(&g, &mut media, 4, &[], false).unwrap();
        table.status_set(&mut media, 2, Value32::from_i32(0xA5)).unwrap();

        // Flip the first copy only; majority among copies 2 and 3 wins.
        let addr = table.copy_addr(2, 0);
        media.fram_write(addr, &0u32.to_le_bytes()).unwrap();

        assert_eq!(table.status_get(&mut media, 2).unwrap().as_i32(), 0xA5);
    }

    #[test]
    fn triple_write_reports_voting_error_on_double_corruption() {
        let g = geometry(true);
        let mut flash_buf = [0xFFu8; 1024];
        let mut fram_buf = [0u8; 256];
        let mut media = FixedSimulatedMedia::<512, 1024>::new(&mut flash_buf, &mut fram_buf);

        let table = StatusTable::init(&g, &mut media, 4, &[], false).unwrap();
        table.status_set(&mut media, 2, Value32::from_i32(0xA5)).unwrap();

        media.fram_write(table.copy_addr(2, 0), &0u32.to_le_bytes()).unwrap();
        media.fram_write(table.copy_addr(2, 1), &1u32.to_le_bytes()).unwrap();

        assert_eq!(table.status_get(&mut media, 2), Err(StorageError::Voting));
    }
}
