//! Range-restricted I/O over a remote handle (spec §4.6): a
//! position-addressable view for handles that support absolute offsets
//! directly, and a reopenable view for handles that only support a single
//! sequential cursor per descriptor.

use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::api::{ApiError, Handle, OpenFlags};

/// A reader/writer restricted to `[offset, offset+length)` of a handle
/// that already supports absolute-offset read/write. Writes beyond
/// `length` are truncated; the caller sees a short write.
pub struct PositionRange<H> {
    handle: H,
    length: u64,
    position: u64,
}

impl<H> PositionRange<H>
where
    H: tokio::io::AsyncRead + tokio::io::AsyncWrite + tokio::io::AsyncSeek + Unpin,
{
    pub async fn new(mut handle: H, offset: u64, length: u64) -> std::io::Result<Self> {
        handle.seek(SeekFrom::Start(offset)).await?;
        Ok(Self {
            handle,
            length,
            position: 0,
        })
    }

    fn remaining(&self) -> u64 {
        self.length - self.position
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let cap = self.remaining().min(buf.len() as u64) as usize;
        if cap == 0 {
            return Ok(0);
        }
        let n = self.handle.read(&mut buf[..cap]).await?;
        self.position += n as u64;
        Ok(n)
    }

    pub async fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let cap = self.remaining().min(buf.len() as u64) as usize;
        let n = self.handle.write(&buf[..cap]).await?;
        self.position += n as u64;
        Ok(n)
    }
}

/// Wraps a sequential handle and hands out one range view per call: the
/// first is served by the original handle, every later one reopens a
/// fresh descriptor. Remote iRODS data-object descriptors are
/// cursor-per-descriptor, so concurrent ranges cannot share one (spec
/// §4.6, §9).
///
/// Each issued handle gets its own `Mutex`, so one range's reads/writes
/// never block another's — the outer `handles` list is locked only to
/// push a newly reopened handle or to iterate at `close`, never held
/// across I/O. The only contention point is the origin handle (index 0),
/// whose mutex is briefly taken both by whichever range is doing I/O
/// through it and by every `reopen` call made off of it.
pub struct ReopenableRange<H> {
    flags: OpenFlags,
    handles: Mutex<Vec<Arc<Mutex<H>>>>,
    started: AtomicBool,
}

impl<H: Handle + 'static> ReopenableRange<H> {
    pub fn new(original: H, flags: OpenFlags) -> Self {
        Self {
            flags,
            handles: Mutex::new(vec![Arc::new(Mutex::new(original))]),
            started: AtomicBool::new(false),
        }
    }

    /// Returns a view over `[offset, offset+length)`, seeking the handle
    /// it obtains to `offset` first.
    pub async fn range(&self, offset: u64, length: u64) -> Result<ReopenedRange<H>, ApiError> {
        let handle = if !self.started.swap(true, Ordering::SeqCst) {
            let handles = self.handles.lock().await;
            Arc::clone(&handles[0])
        } else {
            let origin = {
                let handles = self.handles.lock().await;
                Arc::clone(&handles[0])
            };
            let fresh = {
                let guard = origin.lock().await;
                guard.reopen(self.flags).await?
            };
            let fresh = Arc::new(Mutex::new(fresh));
            let mut handles = self.handles.lock().await;
            handles.push(Arc::clone(&fresh));
            fresh
        };

        {
            let mut guard = handle.lock().await;
            guard
                .seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| ApiError::new(e.to_string()))?;
        }

        Ok(ReopenedRange {
            handle,
            length,
            position: 0,
        })
    }

    /// Closes every opened handle concurrently, aggregating errors.
    /// Errors if any `range` view is still outstanding.
    pub async fn close(self) -> Result<(), ApiError> {
        let handles = self.handles.into_inner();

        let mut tasks = JoinSet::new();
        for handle in handles {
            tasks.spawn(async move {
                let handle = Arc::try_unwrap(handle)
                    .map_err(|_| ApiError::new("range view still outstanding at close"))?
                    .into_inner();
                handle.close().await
            });
        }

        let mut first_error = None;
        while let Some(res) = tasks.join_next().await {
            let result = res.unwrap_or_else(|e| Err(ApiError::new(e.to_string())));
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// A range view produced by [`ReopenableRange::range`], holding sole
/// ownership of its own handle so concurrent ranges run without
/// contending on each other's I/O.
pub struct ReopenedRange<H> {
    handle: Arc<Mutex<H>>,
    length: u64,
    position: u64,
}

impl<H> ReopenedRange<H>
where
    H: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    fn remaining(&self) -> u64 {
        self.length - self.position
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let cap = self.remaining().min(buf.len() as u64) as usize;
        if cap == 0 {
            return Ok(0);
        }
        let mut guard = self.handle.lock().await;
        let n = guard.read(&mut buf[..cap]).await?;
        drop(guard);
        self.position += n as u64;
        Ok(n)
    }

    pub async fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let cap = self.remaining().min(buf.len() as u64) as usize;
        let mut guard = self.handle.lock().await;
        let n = guard.write(&buf[..cap]).await?;
        drop(guard);
        self.position += n as u64;
        Ok(n)
    }
}
