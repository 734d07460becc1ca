//! File-level transfer orchestration (spec §4.7): `Upload`/`Download` are
//! thin wrappers over `from_reader`/`to_writer`, which split the file into
//! ranges, copy each concurrently, and supervise the group to completion.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncSeekExt;
use tokio::task::JoinSet;

use crate::api::{Api, Handle, OpenFlags, Record};

use super::checksum;
use super::error::Error;
use super::range::{PositionRange, ReopenableRange};
use super::sizing::calculate_range_size;
use super::worker::Worker;

/// Uploads `local` to `remote`, creating/truncating the remote object.
pub async fn upload<A: Api>(
    worker: &Worker,
    api: &A,
    local: &Path,
    remote: &str,
) -> Result<(), Error> {
    let size = tokio::fs::metadata(local).await?.len();
    let source_label = local.display().to_string();

    let result = from_reader(worker, api, local, size, remote, &source_label).await;
    if result.is_err() {
        let _ = api.delete_data_object(remote, true).await;
    }
    result
}

/// Downloads `remote` to `local`, creating/truncating the local file.
pub async fn download<A: Api>(
    worker: &Worker,
    api: &A,
    remote: &str,
    local: &Path,
) -> Result<(), Error> {
    let result = to_writer(worker, api, remote, local).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(local).await;
    }
    result
}

/// Copies `local` into the remote object at `remote`, opening it
/// `CREATE|WRONLY|TRUNC` (plus `EXCL` if `Exclusive`). A `HIERARCHY_ERROR`
/// on open triggers exactly one rename-and-retry (spec §4.7 step 1, §9
/// open question — no other error code gets this treatment).
async fn from_reader<A: Api>(
    worker: &Worker,
    api: &A,
    local: &Path,
    size: u64,
    remote: &str,
    label: &str,
) -> Result<(), Error> {
    let mut flags = OpenFlags::create_write_truncate();
    if worker.options.exclusive {
        flags = flags.with_exclusive();
    }

    let remote_handle = match api.open_data_object(remote, flags).await {
        Ok(h) => h,
        Err(e) if e.is_hierarchy_error() => {
            tracing::info!(remote, "hierarchy error on open, renaming and retrying once");
            let bad = format!("{remote}.bad");
            api.rename_data_object(remote, &bad).await?;
            let retry_flags = flags.with_exclusive();
            api.open_data_object(remote, retry_flags).await?
        }
        Err(e) => return Err(e.into()),
    };

    worker.progress.registered(label, size);

    let range_size = calculate_range_size(size, worker.options.max_threads);
    let remote_ranges = ReopenableRange::new(remote_handle, flags);

    let mut tasks = JoinSet::new();
    let mut offset = 0u64;
    while offset < size || size == 0 {
        let length = range_size.min(size.saturating_sub(offset));
        let local = local.to_path_buf();
        let progress = worker.progress.clone();
        let label = label.to_string();
        let buffer_size = worker.options.buffer_size;
        let writer = remote_ranges.range(offset, length).await?;

        tasks.spawn(async move {
            let mut reader = open_local_range(&local, offset, length, false).await?;
            let mut writer = writer;
            copy_range(&mut reader, &mut writer, buffer_size, &progress, &label).await
        });

        if size == 0 {
            break;
        }
        offset += length;
    }

    let failed = drain(&mut tasks).await;

    remote_ranges.close().await?;
    if worker.options.sync_mod_time {
        let modtime = tokio::fs::metadata(local).await?.modified()?;
        touch_best_effort(api, remote, modtime).await;
    }

    if failed.is_empty() {
        worker.progress.finished(label);
        Ok(())
    } else {
        let failed_count = failed.len();
        worker
            .progress
            .failed(label, failed[0].to_string());
        Err(Error::RangeTasksFailed {
            failed: failed_count,
            total: failed_count,
            errors: failed,
        })
    }
}

/// Copies the remote object at `remote` into `local`, discovering its
/// size by opening read-only and seeking to the end.
async fn to_writer<A: Api>(
    worker: &Worker,
    api: &A,
    remote: &str,
    local: &Path,
) -> Result<(), Error> {
    let mut remote_handle = api
        .open_data_object(remote, OpenFlags::read_only())
        .await?;
    let size = remote_handle.seek(std::io::SeekFrom::End(0)).await?;
    remote_handle.seek(std::io::SeekFrom::Start(0)).await?;

    let label = remote.to_string();
    worker.progress.registered(label.as_str(), size);

    tokio::fs::File::create(local).await?.set_len(size).await?;

    let range_size = calculate_range_size(size, worker.options.max_threads);
    let remote_ranges = ReopenableRange::new(remote_handle, OpenFlags::read_only());

    let mut tasks = JoinSet::new();
    let mut offset = 0u64;
    while offset < size || size == 0 {
        let length = range_size.min(size.saturating_sub(offset));
        let local = local.to_path_buf();
        let progress = worker.progress.clone();
        let label = label.clone();
        let buffer_size = worker.options.buffer_size;
        let reader = remote_ranges.range(offset, length).await?;

        tasks.spawn(async move {
            let mut reader = reader;
            let mut writer = open_local_range(&local, offset, length, true).await?;
            copy_range(&mut reader, &mut writer, buffer_size, &progress, &label).await
        });

        if size == 0 {
            break;
        }
        offset += length;
    }

    let failed = drain(&mut tasks).await;
    remote_ranges.close().await?;

    if worker.options.sync_mod_time {
        if let Ok(record) = api.get_data_object(remote).await {
            let _ = filetime_touch(local, record.mod_time()).await;
        }
    }

    if failed.is_empty() {
        worker.progress.finished(label.as_str());
        Ok(())
    } else {
        let failed_count = failed.len();
        worker.progress.failed(label.as_str(), failed[0].to_string());
        Err(Error::RangeTasksFailed {
            failed: failed_count,
            total: failed_count,
            errors: failed,
        })
    }
}

/// A trait-free stand-in for "open a fresh positional handle to `path`":
/// every concurrent range task gets its own file descriptor so ranges
/// never contend on a shared cursor, mirroring the remote side's
/// `Reopen` semantics.
async fn open_local_range(
    path: &Path,
    offset: u64,
    length: u64,
    write: bool,
) -> Result<PositionRange<File>, Error> {
    let file = if write {
        tokio::fs::OpenOptions::new().write(true).open(path).await?
    } else {
        File::open(path).await?
    };
    Ok(PositionRange::new(file, offset, length).await?)
}

async fn copy_range<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: u64,
    progress: &super::progress::ProgressSink,
    label: &str,
) -> Result<(), Error>
where
    R: RangeIo,
    W: RangeIo,
{
    let mut buf = vec![0u8; buffer_size.max(1) as usize];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let mut written = 0;
        while written < n {
            let w = writer.write(&buf[written..n]).await?;
            if w == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "remote write returned 0 bytes",
                )));
            }
            written += w;
        }
        progress.advanced(label, n as u64);
    }
    Ok(())
}

/// Unifies `PositionRange`/`ReopenedRange`'s identical read/write method
/// shapes so `copy_range` can be written once for both directions.
#[async_trait::async_trait]
trait RangeIo: Send {
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    async fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;
}

#[async_trait::async_trait]
impl<H> RangeIo for PositionRange<H>
where
    H: tokio::io::AsyncRead + tokio::io::AsyncWrite + tokio::io::AsyncSeek + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        PositionRange::read(self, buf).await
    }
    async fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        PositionRange::write(self, buf).await
    }
}

#[async_trait::async_trait]
impl<H> RangeIo for super::range::ReopenedRange<H>
where
    H: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        super::range::ReopenedRange::read(self, buf).await
    }
    async fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        super::range::ReopenedRange::write(self, buf).await
    }
}

async fn drain(tasks: &mut JoinSet<Result<(), Error>>) -> Vec<Error> {
    let mut errors = Vec::new();
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => errors.push(e),
            Err(join_err) => errors.push(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                join_err.to_string(),
            ))),
        }
    }
    errors
}

async fn touch_best_effort<A: Api>(api: &A, remote: &str, modtime: std::time::SystemTime) {
    if let Ok(handle) = api.open_data_object(remote, OpenFlags::read_only()).await {
        if handle.touch(modtime).await.is_err() {
            tracing::warn!(remote, "failed to sync mod time after upload");
        }
        let _ = handle.close().await;
    }
}

async fn filetime_touch(path: &Path, modtime: std::time::SystemTime) -> std::io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::OpenOptions::new().write(true).open(&path)?;
        file.set_modified(modtime)
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
    Ok(())
}

/// Runs [`checksum::verify`] between a local path and a remote path,
/// used by directory reconciliation (spec §4.8 comparison policy).
pub async fn verify_checksums<A: Api>(
    worker: &Worker,
    api: &A,
    local: &Path,
    remote: &str,
) -> Result<(), Error> {
    let file = File::open(local).await?;
    checksum::verify(api, file, remote, false, &worker.cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::testing::FakeApi;
    use crate::transfer::worker::WorkerOptions;
    use std::io::Write;

    #[tokio::test]
    async fn upload_then_download_round_trips_small_file() {
        let mut local_in = tempfile::NamedTempFile::new().unwrap();
        local_in.write_all(b"hello range world").unwrap();

        let api = FakeApi::new();
        let worker = Worker::new(WorkerOptions::default().with_max_threads(2));

        upload(&worker, &api, local_in.path(), "/z/h").await.unwrap();
        assert_eq!(api.contents("/z/h").unwrap(), b"hello range world");

        let local_out = tempfile::NamedTempFile::new().unwrap();
        download(&worker, &api, "/z/h", local_out.path()).await.unwrap();
        let got = tokio::fs::read(local_out.path()).await.unwrap();
        assert_eq!(got, b"hello range world");

        worker.close().await.unwrap();
    }

    /// S5 — upload with `HIERARCHY_ERROR` retry.
    #[tokio::test]
    async fn s5_upload_retries_once_after_hierarchy_error() {
        let mut local_in = tempfile::NamedTempFile::new().unwrap();
        local_in.write_all(b"payload").unwrap();

        let api = FakeApi::new().with_file(
            "/z/h",
            b"stale".to_vec(),
            std::time::SystemTime::now(),
        );
        api.trap_next_open_with_hierarchy_error("/z/h");

        let worker = Worker::new(WorkerOptions::default());
        upload(&worker, &api, local_in.path(), "/z/h").await.unwrap();

        // The stale object was renamed out of the way; the retry created
        // the new object under the original name.
        assert!(api.rename_log().contains(&"/z/h.bad".to_string()));
        assert_eq!(api.contents("/z/h").unwrap(), b"payload");

        worker.close().await.unwrap();
    }
}
