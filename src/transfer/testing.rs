//! In-memory fake of the `api` collaborator, used by this module's own
//! tests the way `journal-client`'s tests hand-construct fixture
//! `broker::*` values instead of dialing a real service.

#![cfg(test)]

use std::collections::{BTreeMap, HashSet};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::SystemTime;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, ReadBuf};

use crate::api::{Api, ApiError, Handle, OpenFlags, Record};

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    is_dir: bool,
    modified: SystemTime,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeRecord {
    size: u64,
    modified: SystemTime,
    is_dir: bool,
}

impl Record for FakeRecord {
    fn size(&self) -> u64 {
        self.size
    }
    fn mod_time(&self) -> SystemTime {
        self.modified
    }
    fn is_dir(&self) -> bool {
        self.is_dir
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeApi {
    entries: Arc<Mutex<BTreeMap<String, Entry>>>,
    /// Paths that fail their *next* open with `HIERARCHY_ERROR`, then
    /// succeed (spec S5).
    hierarchy_trap: Arc<Mutex<HashSet<String>>>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_file(self, path: &str, bytes: Vec<u8>, modified: SystemTime) -> Self {
        self.entries.lock().unwrap().insert(
            path.to_string(),
            Entry {
                bytes,
                is_dir: false,
                modified,
            },
        );
        self
    }

    pub(crate) fn trap_next_open_with_hierarchy_error(&self, path: &str) {
        self.hierarchy_trap.lock().unwrap().insert(path.to_string());
    }

    pub(crate) fn rename_log(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub(crate) fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(path).map(|e| e.bytes.clone())
    }
}

#[async_trait]
impl Api for FakeApi {
    type Handle = FakeHandle;
    type Record = FakeRecord;

    async fn open_data_object(
        &self,
        path: &str,
        flags: OpenFlags,
    ) -> Result<Self::Handle, ApiError> {
        if self.hierarchy_trap.lock().unwrap().remove(path) {
            return Err(ApiError::new("hierarchy mismatch").with_code("HIERARCHY_ERROR"));
        }
        if flags.create {
            let mut entries = self.entries.lock().unwrap();
            if flags.truncate || !entries.contains_key(path) {
                entries.insert(
                    path.to_string(),
                    Entry {
                        bytes: Vec::new(),
                        is_dir: false,
                        modified: SystemTime::now(),
                    },
                );
            }
        }
        Ok(FakeHandle {
            path: path.to_string(),
            entries: Arc::clone(&self.entries),
            position: 0,
        })
    }

    async fn create_collection(&self, path: &str) -> Result<(), ApiError> {
        self.entries.lock().unwrap().entry(path.to_string()).or_insert(Entry {
            bytes: Vec::new(),
            is_dir: true,
            modified: SystemTime::now(),
        });
        Ok(())
    }

    async fn create_collection_all(&self, path: &str) -> Result<(), ApiError> {
        self.create_collection(path).await
    }

    async fn rename_data_object(&self, from: &str, to: &str) -> Result<(), ApiError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.remove(from) {
            entries.insert(to.to_string(), entry);
            Ok(())
        } else {
            Err(ApiError::new(format!("no such object: {from}")))
        }
    }

    async fn delete_data_object(&self, path: &str, _force: bool) -> Result<(), ApiError> {
        self.entries.lock().unwrap().remove(path);
        Ok(())
    }

    async fn get_data_object(&self, path: &str) -> Result<Self::Record, ApiError> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(path)
            .map(|e| FakeRecord {
                size: e.bytes.len() as u64,
                modified: e.modified,
                is_dir: e.is_dir,
            })
            .ok_or_else(|| ApiError::new(format!("no such object: {path}")))
    }

    async fn checksum(&self, path: &str, _force: bool) -> Result<Vec<u8>, ApiError> {
        let entries = self.entries.lock().unwrap();
        let entry = entries
            .get(path)
            .ok_or_else(|| ApiError::new(format!("no such object: {path}")))?;
        let mut hasher = Sha256::new();
        hasher.update(&entry.bytes);
        Ok(hasher.finalize().to_vec())
    }

    fn walk(&self, root: &str) -> BoxStream<'_, Result<(String, Self::Record), ApiError>> {
        let prefix = format!("{root}/");
        let items: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix) || *path == root)
            .map(|(path, entry)| {
                Ok((
                    path.clone(),
                    FakeRecord {
                        size: entry.bytes.len() as u64,
                        modified: entry.modified,
                        is_dir: entry.is_dir,
                    },
                ))
            })
            .collect();
        Box::pin(stream::iter(items))
    }
}

pub(crate) struct FakeHandle {
    path: String,
    entries: Arc<Mutex<BTreeMap<String, Entry>>>,
    position: usize,
}

impl AsyncRead for FakeHandle {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let entries = this.entries.lock().unwrap();
        let bytes = entries.get(&this.path).map(|e| e.bytes.as_slice()).unwrap_or(&[]);
        let available = bytes.len().saturating_sub(this.position);
        let n = available.min(buf.remaining());
        buf.put_slice(&bytes[this.position..this.position + n]);
        this.position += n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for FakeHandle {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let mut entries = this.entries.lock().unwrap();
        let entry = entries.entry(this.path.clone()).or_insert(Entry {
            bytes: Vec::new(),
            is_dir: false,
            modified: SystemTime::now(),
        });
        if entry.bytes.len() < this.position + buf.len() {
            entry.bytes.resize(this.position + buf.len(), 0);
        }
        entry.bytes[this.position..this.position + buf.len()].copy_from_slice(buf);
        this.position += buf.len();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for FakeHandle {
    fn start_seek(self: Pin<&mut Self>, position: std::io::SeekFrom) -> std::io::Result<()> {
        let this = self.get_mut();
        let len = this
            .entries
            .lock()
            .unwrap()
            .get(&this.path)
            .map(|e| e.bytes.len())
            .unwrap_or(0);
        this.position = match position {
            std::io::SeekFrom::Start(n) => n as usize,
            std::io::SeekFrom::End(n) => (len as i64 + n).max(0) as usize,
            std::io::SeekFrom::Current(n) => (this.position as i64 + n).max(0) as usize,
        };
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<u64>> {
        Poll::Ready(Ok(self.position as u64))
    }
}

#[async_trait]
impl Handle for FakeHandle {
    async fn reopen(&self, _flags: OpenFlags) -> Result<Self, ApiError>
    where
        Self: Sized,
    {
        Ok(FakeHandle {
            path: self.path.clone(),
            entries: Arc::clone(&self.entries),
            position: 0,
        })
    }

    async fn touch(&self, modtime: SystemTime) -> Result<(), ApiError> {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&self.path) {
            entry.modified = modtime;
        }
        Ok(())
    }

    async fn close(self) -> Result<(), ApiError> {
        Ok(())
    }
}
