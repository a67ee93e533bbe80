//! `payload_schema`: the binary layout description for one payload's
//! samples.

use crate::error::{StorageError, StorageResult};

/// Maximum length of the `data_order`/`var_names` token strings.
pub const SCHEMA_STRING_MAX: usize = 64;

/// Describes one payload's record layout: its size in bytes, which status
/// variable it is conceptually tied to, and the printf-style token sequence
/// used to serialize/deserialize it for CSV output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSchema {
    /// Record size in bytes. Must satisfy `size <= 512`.
    pub size: u16,
    /// Index into the status table this payload logically corresponds to,
    /// opaque to the payload store itself.
    pub sys_index: u16,
    /// Whitespace-separated printf-style type tokens describing the
    /// record's binary layout, e.g. `"%f %d %hi"`.
    pub data_order: heapless::String<SCHEMA_STRING_MAX>,
    /// Human-readable column names, in the same order as `data_order`.
    pub var_names: heapless::String<SCHEMA_STRING_MAX>,
}

impl PayloadSchema {
    /// Builds a schema, validating `size <= 512` eagerly so a bad schema
    /// is rejected at `payload_init` time rather than on first access.
    pub fn new(size: u16, sys_index: u16, data_order: &str, var_names: &str) -> StorageResult<Self> {
        if size == 0 || size > 512 {
            return Err(StorageError::Bounds { what: "payload schema size" });
        }
        let mut data_order_buf = heapless::String::new();
        data_order_buf.push_str(data_order).map_err(|_| StorageError::Bounds { what: "data_order too long" })?;
        let mut var_names_buf = heapless::String::new();
        var_names_buf.push_str(var_names).map_err(|_| StorageError::Bounds { what: "var_names too long" })?;

        Ok(PayloadSchema {
            size,
            sys_index,
            data_order: data_order_buf,
            var_names: var_names_buf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_record() {
        assert!(PayloadSchema::new(513, 0, "%f", "x").is_err());
    }

    #[test]
    fn rejects_zero_size() {
        assert!(PayloadSchema::new(0, 0, "%f", "x").is_err());
    }

    #[test]
    fn accepts_valid_schema() {
        let s = PayloadSchema::new(200, 3, "%f %d %hi", "temp count flags").unwrap();
        assert_eq!(s.size, 200);
        assert_eq!(s.data_order.as_str(), "%f %d %hi");
    }
}
