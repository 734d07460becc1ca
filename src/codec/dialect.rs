//! The wire dialect selected per connection (spec §3). Dialect only
//! affects struct-typed payloads; header, raw-byte, and int32 payloads are
//! dialect-independent.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Native,
    Xml,
}
