//! Payload store: per-payload append sequence with schema-driven record
//! placement and strict page-boundary checks.

use core::fmt;

use crate::config::{MediaGeometry, MAX_PAYLOAD_SECTIONS};
use crate::error::{StorageError, StorageResult};
use crate::map::AddressMap;
use crate::media::{FlashMedia, FlashPartition};
use crate::payload::schema::PayloadSchema;

/// Owns one [`PayloadSchema`] per payload and places/retrieves samples
/// against the flash sections the address map reserved for each.
pub struct PayloadStore {
    schemas: heapless::Vec<PayloadSchema, { crate::config::MAX_PAYLOAD_SECTIONS }>,
}

impl PayloadStore {
    /// `payload_init`: validates `P*K <= configured maximum` and stores
    /// the per-payload schemas.
    pub fn init(geometry: &MediaGeometry, schemas: &[PayloadSchema]) -> StorageResult<Self> {
        if schemas.len() as u32 != geometry.n_payloads {
            return Err(StorageError::Bounds { what: "schema count must equal n_payloads" });
        }
        let total_sections = geometry.n_payloads * geometry.sections_per_payload;
        if total_sections as usize > MAX_PAYLOAD_SECTIONS {
            return Err(StorageError::Bounds { what: "P*K exceeds configured maximum" });
        }

        let mut out = heapless::Vec::new();
        for s in schemas {
            out.push(s.clone()).map_err(|_| StorageError::Bounds { what: "too many payload schemas" })?;
        }
        Ok(PayloadStore { schemas: out })
    }

    fn schema(&self, p: u32) -> StorageResult<&PayloadSchema> {
        self.schemas.get(p as usize).ok_or(StorageError::Bounds { what: "payload index" })
    }

    /// Computes the flat flash address of sample `i` of payload `p`, and
    /// validates that the record does not straddle a page.
    fn sample_address(&self, geometry: &MediaGeometry, map: &AddressMap, p: u32, i: u32) -> StorageResult<u32> {
        let schema = self.schema(p)?;
        let size = schema.size as u32;
        let samples_per_page = geometry.page / size;
        if samples_per_page == 0 {
            return Err(StorageError::Alignment { offset: 0, size: schema.size });
        }
        let pages_per_section = geometry.section / geometry.page;
        let samples_per_section = samples_per_page * pages_per_section;

        let section_in_payload = i / samples_per_section;
        let section_addr = map
            .payload_section_addr(geometry, p, section_in_payload)
            .ok_or(StorageError::Bounds { what: "payload sample index" })?;

        let page_in_section = (i / samples_per_page) % pages_per_section;
        let offset_in_page = (i % samples_per_page) * size;
        let addr = section_addr + page_in_section * geometry.page + offset_in_page;

        if offset_in_page + size > geometry.page {
            return Err(StorageError::Alignment { offset: offset_in_page, size: schema.size });
        }
        Ok(addr)
    }

    /// `payload_set(p, i, data, schema)`: writes one record of `schema.size`
    /// bytes. `data.len()` must equal the schema's record size exactly.
    pub fn payload_set_data<M: FlashMedia>(
        &self,
        geometry: &MediaGeometry,
        map: &AddressMap,
        flash: &mut M,
        p: u32,
        i: u32,
        data: &[u8],
    ) -> StorageResult<()> {
        let schema = self.schema(p)?;
        if data.len() != schema.size as usize {
            return Err(StorageError::Bounds { what: "payload record length" });
        }
        let addr = self.sample_address(geometry, map, p, i)?;
        flash.flash_write(FlashPartition::Payload(p), addr, data)?;
        Ok(())
    }

    /// `payload_get(p, i, buf, schema)`: reads one record into `buf`, which
    /// must be exactly `schema.size` bytes.
    pub fn payload_get_data<M: FlashMedia>(
        &self,
        geometry: &MediaGeometry,
        map: &AddressMap,
        flash: &mut M,
        p: u32,
        i: u32,
        buf: &mut [u8],
    ) -> StorageResult<()> {
        let schema = self.schema(p)?;
        if buf.len() != schema.size as usize {
            return Err(StorageError::Bounds { what: "payload record length" });
        }
        let addr = self.sample_address(geometry, map, p, i)?;
        flash.flash_read(FlashPartition::Payload(p), addr, buf)?;
        Ok(())
    }

    /// `payload_reset_table(p)`: erases all `K` sections reserved for
    /// payload `p`.
    pub fn payload_reset_table<M: FlashMedia>(
        &self,
        geometry: &MediaGeometry,
        map: &AddressMap,
        flash: &mut M,
        p: u32,
    ) -> StorageResult<()> {
        for k in 0..geometry.sections_per_payload {
            let addr = map
                .payload_section_addr(geometry, p, k)
                .ok_or(StorageError::Bounds { what: "payload section index" })?;
            flash.flash_erase(FlashPartition::Payload(p), addr)?;
        }
        Ok(())
    }

    /// `payload_reset()`: resets every payload.
    pub fn payload_reset<M: FlashMedia>(&self, geometry: &MediaGeometry, map: &AddressMap, flash: &mut M) -> StorageResult<()> {
        for p in 0..geometry.n_payloads {
            self.payload_reset_table(geometry, map, flash, p)?;
        }
        Ok(())
    }

    /// Number of payloads this store was initialized with.
    pub fn n_payloads(&self) -> u32 {
        self.schemas.len() as u32
    }
}

/// `payload_fprint(stream, data, schema)`: walks `schema.data_order`,
/// consuming bytes from `data` per token (`%f`→4-byte float, `%d`/`%u`/`%i`→
/// 4-byte integer, `%hi`→2-byte short, `%s`→the remaining bytes as a
/// string), writing comma-separated values to `out`. A single trailing `%s`
/// token consumes whatever bytes remain in the record, since the schema
/// does not separately size string fields.
pub fn payload_fprint<W: fmt::Write>(out: &mut W, data: &[u8], schema: &PayloadSchema) -> Result<(), StorageError> {
    let mut cursor = 0usize;
    let mut first = true;
    for token in schema.data_order.split_whitespace() {
        if !first {
            out.write_char(',').map_err(|_| StorageError::Bounds { what: "fprint sink" })?;
        }
        first = false;

        match token {
            "%f" => {
                let bytes = data.get(cursor..cursor + 4).ok_or(StorageError::Bounds { what: "fprint record" })?;
                let v = f32::from_le_bytes(bytes.try_into().unwrap());
                write!(out, "{}", v).map_err(|_| StorageError::Bounds { what: "fprint sink" })?;
                cursor += 4;
            }
            "%d" | "%u" | "%i" => {
                let bytes = data.get(cursor..cursor + 4).ok_or(StorageError::Bounds { what: "fprint record" })?;
                let v = i32::from_le_bytes(bytes.try_into().unwrap());
                write!(out, "{}", v).map_err(|_| StorageError::Bounds { what: "fprint sink" })?;
                cursor += 4;
            }
            "%hi" => {
                let bytes = data.get(cursor..cursor + 2).ok_or(StorageError::Bounds { what: "fprint record" })?;
                let v = i16::from_le_bytes(bytes.try_into().unwrap());
                write!(out, "{}", v).map_err(|_| StorageError::Bounds { what: "fprint sink" })?;
                cursor += 2;
            }
            "%s" => {
                let bytes = data.get(cursor..).ok_or(StorageError::Bounds { what: "fprint record" })?;
                let nul = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let text = core::str::from_utf8(&bytes[..nul]).unwrap_or("");
                write!(out, "{}", text).map_err(|_| StorageError::Bounds { what: "fprint sink" })?;
                cursor = data.len();
            }
            _ => return Err(StorageError::Bounds { what: "unrecognized data_order token" }),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::simulation::FixedSimulatedMedia;

    fn geometry() -> MediaGeometry {
        MediaGeometry::new(0, 0, 2, 1).with_section(1024).with_page(512)
    }

    #[test]
    fn samples_never_straddle_a_page() {
        // PAGE=512, size=200: only 2 of the 200-byte records fit per page
        // (floor(512/200)), leaving 112 bytes of padding; every computed
        // address must therefore land inside a single page, for any index.
        let g = geometry();
        let map = AddressMap::compute(&g);
        let schema = PayloadSchema::new(200, 0, "%f", "x").unwrap();
        let store = PayloadStore::init(&g, core::slice::from_ref(&schema)).unwrap();

        for i in 0..8u32 {
            let addr = store.sample_address(&g, &map, 0, i).unwrap();
            assert!(addr % g.page + 200 <= g.page, "index {} straddles a page at addr {}", i, addr);
        }
        // Consecutive samples within a page are packed back-to-back.
        let a0 = store.sample_address(&g, &map, 0, 0).unwrap();
        let a1 = store.sample_address(&g, &map, 0, 1).unwrap();
        assert_eq!(a1, a0 + 200);
        // The third sample does not fit in the first page (2*200=400 used
        // of 512, but a third 200-byte record would reach 600), so it is
        // placed at the start of the next page instead of straddling.
        let a2 = store.sample_address(&g, &map, 0, 2).unwrap();
        assert_eq!(a2, a0 + g.page);
    }

    #[test]
    fn set_then_get_roundtrips() {
        let g = geometry();
        let map = AddressMap::compute(&g);
        let schema = PayloadSchema::new(4, 0, "%d", "x").unwrap();
        let store = PayloadStore::init(&g, core::slice::from_ref(&schema)).unwrap();

        let mut flash_buf = [0xFFu8; 1024 * 4];
        let mut fram_buf = [0u8; 256];
        let mut media = FixedSimulatedMedia::<512, 1024>::new(&mut flash_buf, &mut fram_buf);

        store.payload_set_data(&g, &map, &mut media, 0, 0, &42i32.to_le_bytes()).unwrap();
        let mut buf = [0u8; 4];
        store.payload_get_data(&g, &map, &mut media, 0, 0, &mut buf).unwrap();
        assert_eq!(i32::from_le_bytes(buf), 42);
    }

    #[test]
    fn fprint_formats_mixed_record_as_csv() {
        let schema = PayloadSchema::new(10, 0, "%f %hi %s", "temp flags label").unwrap();
        let mut data = [0u8; 10];
        data[0..4].copy_from_slice(&1.5f32.to_le_bytes());
        data[4..6].copy_from_slice(&(-3i16).to_le_bytes());
        data[6..10].copy_from_slice(b"ok\0\0");

        let mut out = heapless::String::<64>::new();
        payload_fprint(&mut out, &data, &schema).unwrap();
        assert_eq!(out.as_str(), "1.5,-3,ok");
    }
}
