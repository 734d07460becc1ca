//! Message codec and parallel transfer engine for an iRODS-style data-grid client.
//!
//! The connection, authentication, connection pool, and path-level API are
//! external collaborators; this crate only frames/encodes messages and
//! drives chunked, concurrent file and directory transfers over them.

pub mod api;
pub mod codec;
pub mod transfer;
