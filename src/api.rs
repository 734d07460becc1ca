//! Trait boundary for the collaborators the transfer engine and codec are
//! driven through: the path-level API, a reopenable data-object handle, and
//! the directory-entry records `Walk` yields. The connection itself, the
//! authentication handshake, and the server error-code catalogue live on
//! the other side of these traits and are not this crate's concern.

use std::fmt;
use std::time::SystemTime;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

/// Open-mode flags passed to `Api::open_data_object` and `Handle::reopen`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub create: bool,
    pub write: bool,
    pub read: bool,
    pub truncate: bool,
    pub exclusive: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Default::default()
        }
    }

    pub fn create_write_truncate() -> Self {
        Self {
            create: true,
            write: true,
            truncate: true,
            ..Default::default()
        }
    }

    pub fn with_exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

/// An error surfaced by the external API collaborator.
///
/// `code` carries the server's error-code catalogue entry (e.g.
/// `HIERARCHY_ERROR`) when the collaborator can identify one; the transfer
/// engine only ever branches on this one code (spec §4.7 step 1).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub code: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn is_hierarchy_error(&self) -> bool {
        self.code() == Some("HIERARCHY_ERROR")
    }
}

/// A remote filesystem entry yielded by `Api::walk`.
pub trait Record: fmt::Debug + Send + Sync {
    fn size(&self) -> u64;
    fn mod_time(&self) -> SystemTime;
    fn is_dir(&self) -> bool;
}

/// A reopenable data-object handle.
///
/// iRODS data-object descriptors are cursor-per-descriptor: a single handle
/// does not support concurrent random access, so every concurrent range
/// task obtains its own handle via `reopen`.
#[async_trait]
pub trait Handle: AsyncRead + AsyncWrite + AsyncSeek + Send + Unpin {
    async fn reopen(&self, flags: OpenFlags) -> Result<Self, ApiError>
    where
        Self: Sized;

    async fn touch(&self, modtime: SystemTime) -> Result<(), ApiError>;

    async fn close(self) -> Result<(), ApiError>;
}

/// Path-level primitives the transfer engine is driven through.
#[async_trait]
pub trait Api: Send + Sync {
    type Handle: Handle;
    type Record: Record;

    async fn open_data_object(
        &self,
        path: &str,
        flags: OpenFlags,
    ) -> Result<Self::Handle, ApiError>;

    async fn create_collection(&self, path: &str) -> Result<(), ApiError>;

    async fn create_collection_all(&self, path: &str) -> Result<(), ApiError>;

    async fn rename_data_object(&self, from: &str, to: &str) -> Result<(), ApiError>;

    async fn delete_data_object(&self, path: &str, force: bool) -> Result<(), ApiError>;

    async fn get_data_object(&self, path: &str) -> Result<Self::Record, ApiError>;

    async fn checksum(&self, path: &str, force: bool) -> Result<Vec<u8>, ApiError>;

    /// Walks `root`'s subtree, yielding `(path, record)` pairs in
    /// lexicographic path order. Directory reconciliation (spec §4.8)
    /// depends on this ordering.
    fn walk(&self, root: &str) -> BoxStream<'_, Result<(String, Self::Record), ApiError>>;
}
