//! Native binary codec primitives (spec §4.3): big-endian fixed-width
//! integers, null-terminated strings, fixed-size base64 fields, and
//! length-prefixed inline arrays, all built around the 14-byte null
//! sentinel that stands in for an absent pointer or an empty slice.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::error::Error;
use super::sentinel::{is_null_sentinel, NULL_SENTINEL};

/// Accumulates a struct's native-encoded bytes.
#[derive(Debug, Default)]
pub struct NativeWriter {
    buf: Vec<u8>,
}

impl NativeWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_string(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    pub fn write_null_sentinel(&mut self) {
        self.buf.extend_from_slice(NULL_SENTINEL);
    }

    /// Encodes a nilable pointer field: `None` writes the sentinel in
    /// place of descending into the value.
    pub fn write_optional<T>(&mut self, value: Option<&T>, encode: impl FnOnce(&mut Self, &T)) {
        match value {
            Some(v) => encode(self, v),
            None => self.write_null_sentinel(),
        }
    }

    /// Convenience wrapper of [`write_optional`](Self::write_optional) for
    /// string pointer fields.
    pub fn write_optional_string(&mut self, s: Option<&str>) {
        self.write_optional(s, |w, s| w.write_string(s));
    }

    /// Encodes a variable-length slice field. An empty slice writes the
    /// sentinel in place of any elements; the sibling `sizeField` int that
    /// carries the element count is a separate field the caller writes
    /// itself.
    pub fn write_slice<T>(&mut self, items: &[T], mut encode: impl FnMut(&mut Self, &T)) {
        if items.is_empty() {
            self.write_null_sentinel();
            return;
        }
        for item in items {
            encode(self, item);
        }
    }

    /// Encodes a fixed-size base64 field: `b64` is base64-decoded and
    /// exactly `n` raw bytes are written, with no terminator.
    pub fn write_base64_fixed(
        &mut self,
        b64: &str,
        n: usize,
        field: &'static str,
    ) -> Result<(), Error> {
        let raw = STANDARD.decode(b64)?;
        if raw.len() != n {
            return Err(Error::BadBase64Length {
                field,
                expected: n,
                got: raw.len(),
            });
        }
        self.buf.extend_from_slice(&raw);
        Ok(())
    }
}

/// Decodes a struct's native-encoded bytes.
pub struct NativeReader {
    buf: Vec<u8>,
    pos: usize,
}

impl NativeReader {
    /// Wraps `buf`, appending a trailing `\0` so string reads terminate
    /// even if the server omitted the final terminator.
    pub fn new(mut buf: Vec<u8>) -> Self {
        buf.push(0);
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    fn take(&mut self, n: usize) -> Result<&[u8], Error> {
        if self.pos + n > self.buf.len() {
            return Err(Error::ShortRead {
                wanted: n,
                got: self.buf.len().saturating_sub(self.pos),
            });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes(b.try_into().unwrap()))
    }

    /// Reads a string field: scans to and including `\0`. If the scanned
    /// bytes are the null sentinel, returns `None` (absent pointer);
    /// otherwise the UTF-8 content with the terminator stripped.
    pub fn read_optional_string(&mut self) -> Result<Option<String>, Error> {
        let start = self.pos;
        let nul_at = self
            .remaining()
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::ShortRead { wanted: 1, got: 0 })?;
        let scanned = &self.buf[start..=start + nul_at];
        self.pos = start + nul_at + 1;

        if is_null_sentinel(scanned) {
            return Ok(None);
        }
        let s = std::str::from_utf8(&self.buf[start..start + nul_at])?;
        Ok(Some(s.to_string()))
    }

    pub fn read_string(&mut self) -> Result<String, Error> {
        Ok(self.read_optional_string()?.unwrap_or_default())
    }

    /// Reads a nilable pointer field: consumes the sentinel and returns
    /// `None`, or decodes and returns `Some`.
    pub fn read_optional<T>(
        &mut self,
        decode: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<Option<T>, Error> {
        if self.peek_and_consume_sentinel() {
            Ok(None)
        } else {
            Ok(Some(decode(self)?))
        }
    }

    /// Peeks whether the next bytes are the null sentinel (slice and
    /// pointer-to-struct fields carry no terminator of their own); on a
    /// match, consumes the full 14 bytes.
    fn peek_and_consume_sentinel(&mut self) -> bool {
        if is_null_sentinel(self.remaining()) {
            self.pos += NULL_SENTINEL.len();
            true
        } else {
            false
        }
    }

    /// Reads a variable-length slice field whose length (from a `size` or
    /// `sizeField` wire annotation) the caller has already resolved. A
    /// resolved length of 0 means the encoder wrote the sentinel in place
    /// of any elements.
    pub fn read_slice<T>(
        &mut self,
        len: usize,
        mut decode: impl FnMut(&mut Self) -> Result<T, Error>,
    ) -> Result<Vec<T>, Error> {
        if len == 0 {
            self.peek_and_consume_sentinel();
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(decode(self)?);
        }
        Ok(out)
    }

    pub fn read_base64_fixed(&mut self, n: usize) -> Result<String, Error> {
        let raw = self.take(n)?;
        Ok(STANDARD.encode(raw))
    }
}
