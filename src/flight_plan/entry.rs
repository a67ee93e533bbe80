//! `fp_entry`: a flight-plan command record.
//!
//! Binary layout, little-endian, exactly 512 bytes:
//! `i32 unixtime; i32 executions; i32 periodical; i32 node; u8 cmd[248]; u8 args[248]`.
//! One entry occupies exactly one flash page, so a write never straddles a
//! page boundary. `cmd`/`args` are copied into fixed 248-byte buffers at
//! write time and returned as owned `heapless::String`s at read time, so
//! callers never have to keep a backing buffer alive across a call.

use crate::config::MediaGeometry;

/// Sentinel `unixtime`/`addr` value meaning "empty" (`FP_NULL`).
pub const FP_NULL: i32 = -1;

/// Maximum length of `cmd` and `args`, including the implicit terminator.
pub const CMD_MAX_STR_NAME: usize = 248;
/// Maximum length of `cmd` and `args`, including the implicit terminator.
pub const CMD_MAX_STR_PARAMS: usize = 248;

/// On-disk size of one flight-plan entry. Must equal [`MediaGeometry::page`]
/// for the "one record per page" invariant to hold; `fp_init` asserts this.
pub const ENTRY_SIZE: usize = 512;

const _: () = assert!(
    4 * 4 + CMD_MAX_STR_NAME + CMD_MAX_STR_PARAMS == ENTRY_SIZE,
    "fp_entry layout must be exactly 512 bytes"
);

/// A single flight-plan command: a destination node, a command name, its
/// arguments, and when (and how often) to execute it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightPlanEntry {
    /// Scheduled UTC execution time. `FP_NULL` marks an empty slot.
    pub unixtime: i32,
    /// Number of times this entry has already executed.
    pub executions: i32,
    /// Repeat interval in seconds; `0` means "run once".
    pub periodical: i32,
    /// Destination node address for the command.
    pub node: i32,
    /// Command name, truncated to [`CMD_MAX_STR_NAME`] bytes.
    pub cmd: heapless::String<CMD_MAX_STR_NAME>,
    /// Command arguments, truncated to [`CMD_MAX_STR_PARAMS`] bytes.
    pub args: heapless::String<CMD_MAX_STR_PARAMS>,
}

impl FlightPlanEntry {
    /// Builds a new entry, truncating `cmd`/`args` if they exceed their
    /// fixed capacity. Returns whether either string was truncated, so the
    /// caller is not required to pre-clear their buffers defensively.
    pub fn new(unixtime: i32, executions: i32, periodical: i32, node: i32, cmd: &str, args: &str) -> (Self, bool) {
        let (cmd, cmd_truncated) = truncate_to(cmd);
        let (args, args_truncated) = truncate_to(args);
        (
            FlightPlanEntry {
                unixtime,
                executions,
                periodical,
                node,
                cmd,
                args,
            },
            cmd_truncated || args_truncated,
        )
    }

    /// An empty (tombstoned) entry placeholder; never written to flash as
    /// such, but useful for default-initializing buffers.
    pub fn empty() -> Self {
        FlightPlanEntry {
            unixtime: FP_NULL,
            executions: 0,
            periodical: 0,
            node: 0,
            cmd: heapless::String::new(),
            args: heapless::String::new(),
        }
    }

    /// Serializes this entry into a caller-supplied 512-byte page buffer.
    /// Trailing bytes after each string's content are written as zero.
    pub fn encode(&self, out: &mut [u8; ENTRY_SIZE]) {
        out[0..4].copy_from_slice(&self.unixtime.to_le_bytes());
        out[4..8].copy_from_slice(&self.executions.to_le_bytes());
        out[8..12].copy_from_slice(&self.periodical.to_le_bytes());
        out[12..16].copy_from_slice(&self.node.to_le_bytes());

        let cmd_field = &mut out[16..16 + CMD_MAX_STR_NAME];
        cmd_field.fill(0);
        cmd_field[..self.cmd.len()].copy_from_slice(self.cmd.as_bytes());

        let args_field = &mut out[16 + CMD_MAX_STR_NAME..ENTRY_SIZE];
        args_field.fill(0);
        args_field[..self.args.len()].copy_from_slice(self.args.as_bytes());
    }

    /// Deserializes an entry from a 512-byte page buffer. Non-UTF8 bytes in
    /// `cmd`/`args` (e.g. unwritten `0xFF` flash) are lossily replaced, since
    /// such a read is already "garbage" the caller is expected to purge.
    pub fn decode(buf: &[u8; ENTRY_SIZE]) -> Self {
        let unixtime = i32::from_le_bytes(buf[0..4].try_into().unwrap());
        let executions = i32::from_le_bytes(buf[4..8].try_into().unwrap());
        let periodical = i32::from_le_bytes(buf[8..12].try_into().unwrap());
        let node = i32::from_le_bytes(buf[12..16].try_into().unwrap());

        let cmd_field = &buf[16..16 + CMD_MAX_STR_NAME];
        let args_field = &buf[16 + CMD_MAX_STR_NAME..ENTRY_SIZE];

        FlightPlanEntry {
            unixtime,
            executions,
            periodical,
            node,
            cmd: decode_field(cmd_field),
            args: decode_field(args_field),
        }
    }
}

impl FlightPlanEntry {
    /// Reports whether `cmd` fills the entire 248-byte field with no spare
    /// capacity, the only signal available on a plain read that the
    /// original string may have been truncated at write time.
    pub fn cmd_may_be_truncated(&self) -> bool {
        self.cmd.len() == CMD_MAX_STR_NAME
    }

    /// Same as `cmd_may_be_truncated`, for `args`.
    pub fn args_may_be_truncated(&self) -> bool {
        self.args.len() == CMD_MAX_STR_PARAMS
    }
}

fn truncate_to<const N: usize>(s: &str) -> (heapless::String<N>, bool) {
    if s.len() <= N {
        let mut out = heapless::String::new();
        // `s.len() <= N` was just checked, so this cannot fail on capacity;
        // it can only fail if `s` isn't valid UTF-8 at the push boundary,
        // which it is, since `s` is already a `&str`.
        let _ = out.push_str(s);
        (out, false)
    } else {
        let mut end = N;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut out = heapless::String::new();
        let _ = out.push_str(&s[..end]);
        (out, true)
    }
}

fn decode_field<const N: usize>(field: &[u8]) -> heapless::String<N> {
    let nul = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let mut end = nul.min(N);
    while end > 0 && core::str::from_utf8(&field[..end]).is_err() {
        end -= 1;
    }
    let text = core::str::from_utf8(&field[..end]).unwrap_or("");
    let mut out = heapless::String::new();
    let _ = out.push_str(text);
    out
}

/// `fp_init` asserts `sizeof(fp_entry) == PAGE`; this is that check,
/// promoted from a runtime assertion to one performed once at construction.
pub fn assert_entry_fits_page(geometry: &MediaGeometry) {
    assert_eq!(
        ENTRY_SIZE as u32, geometry.page,
        "fp_entry must be exactly one flash page"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_encode_decode() {
        let (entry, truncated) = FlightPlanEntry::new(100, 0, 0, 5, "ping", "");
        assert!(!truncated);
        let mut buf = [0u8; ENTRY_SIZE];
        entry.encode(&mut buf);
        let decoded = FlightPlanEntry::decode(&buf);
        assert_eq!(decoded, entry);
    }

    #[test]
    fn trailing_bytes_are_zero_padded() {
        let (entry, _) = FlightPlanEntry::new(1, 0, 0, 0, "x", "");
        let mut buf = [0xAAu8; ENTRY_SIZE];
        entry.encode(&mut buf);
        assert_eq!(buf[16 + 1], 0);
        assert_eq!(buf[ENTRY_SIZE - 1], 0);
    }

    #[test]
    fn overlong_strings_are_truncated_and_reported() {
        let long: heapless::String<300> = {
            let mut s = heapless::String::new();
            for _ in 0..300 {
                let _ = s.push('a');
            }
            s
        };
        let (entry, truncated) = FlightPlanEntry::new(1, 0, 0, 0, &long, "");
        assert!(truncated);
        assert_eq!(entry.cmd.len(), CMD_MAX_STR_NAME);
    }
}
