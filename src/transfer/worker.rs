//! Transfer worker configuration (spec §6 "Worker options", §4.9 tuning
//! knobs) and the `Worker` handle that owns a file or directory transfer's
//! scheduling group.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::Error;
use super::progress::{ProgressSink, Reporter};
use super::sizing::BUFFER_SIZE;

/// Returning `None` swallows the error and keeps the worker running;
/// `Some(e)` propagates it as the worker's terminal error (spec §7).
pub type ErrorHandlerFn = Arc<dyn Fn(Error) -> Option<Error> + Send + Sync>;

/// Tuning and policy for one `Upload`/`Download`/`UploadDir`/`DownloadDir`
/// call, built the way the teacher builds `ExponentialBackoff` — a
/// `with_*`-method builder over a struct of plain fields.
#[derive(Clone)]
pub struct WorkerOptions {
    pub exclusive: bool,
    pub sync_mod_time: bool,
    pub max_threads: u64,
    pub max_queued: usize,
    pub verify_checksums: bool,
    pub buffer_size: u64,
    pub render_progress: bool,
    pub error_handler: Option<ErrorHandlerFn>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            exclusive: false,
            sync_mod_time: false,
            max_threads: 1,
            max_queued: 16,
            verify_checksums: false,
            buffer_size: BUFFER_SIZE,
            render_progress: false,
            error_handler: None,
        }
    }
}

impl WorkerOptions {
    pub fn with_exclusive(mut self, v: bool) -> Self {
        self.exclusive = v;
        self
    }

    pub fn with_sync_mod_time(mut self, v: bool) -> Self {
        self.sync_mod_time = v;
        self
    }

    pub fn with_max_threads(mut self, v: u64) -> Self {
        self.max_threads = v.max(1);
        self
    }

    pub fn with_max_queued(mut self, v: usize) -> Self {
        self.max_queued = v;
        self
    }

    pub fn with_verify_checksums(mut self, v: bool) -> Self {
        self.verify_checksums = v;
        self
    }

    pub fn with_buffer_size(mut self, v: u64) -> Self {
        self.buffer_size = v;
        self
    }

    pub fn with_render_progress(mut self, v: bool) -> Self {
        self.render_progress = v;
        self
    }

    pub fn with_error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(Error) -> Option<Error> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(f));
        self
    }

    /// Invokes the configured error handler, or propagates `err` unchanged
    /// if none is set.
    pub(super) fn handle_error(&self, err: Error) -> Option<Error> {
        match &self.error_handler {
            Some(f) => f(err),
            None => Some(err),
        }
    }
}

/// Owns one transfer's scheduling group: cancellation, progress, and the
/// options it was built with.
pub struct Worker {
    pub(super) options: WorkerOptions,
    pub(super) cancel: CancellationToken,
    pub(super) progress: ProgressSink,
    reporter: Option<Reporter>,
}

impl Worker {
    pub fn new(options: WorkerOptions) -> Self {
        let (reporter, progress) = Reporter::spawn(options.render_progress);
        Self {
            options,
            cancel: CancellationToken::new(),
            progress,
            reporter: Some(reporter),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stops the progress reporter and reports how many files were left
    /// mid-transfer when it closed.
    pub async fn close(mut self) -> Result<(), usize> {
        if let Some(reporter) = self.reporter.take() {
            reporter.close().await
        } else {
            Ok(())
        }
    }
}
