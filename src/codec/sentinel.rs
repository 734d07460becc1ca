//! The null sentinel: the exact 14-byte sequence that stands in for a nil
//! pointer field or an empty variable-length array on the native wire.

/// `"%@#ANULLSTR$%\0"`, 14 bytes.
pub const NULL_SENTINEL: &[u8; 14] = b"%@#ANULLSTR$%\0";

/// Does `buf` begin with the null sentinel?
///
/// Only the first 13 bytes are compared. For strings, `buf` is the bytes
/// already scanned up to and including the `\0` terminator, so a 13-byte
/// prefix match implies the scan consumed exactly the 14-byte sentinel.
/// For slices (no terminator to scan for), callers peek 13 bytes ahead
/// without consuming, and on a match skip the full 14.
pub fn is_null_sentinel(buf: &[u8]) -> bool {
    buf.len() >= NULL_SENTINEL.len() - 1 && buf[..NULL_SENTINEL.len() - 1] == NULL_SENTINEL[..13]
}
