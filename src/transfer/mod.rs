//! Parallel transfer engine: range I/O, file and directory upload/download,
//! checksum verification, and progress reporting (spec §4.6–§4.11).

mod checksum;
mod dir;
mod error;
mod file;
mod progress;
mod range;
mod sizing;
#[cfg(test)]
mod testing;
mod worker;

pub use checksum::verify as verify_checksum;
pub use dir::{download_dir, upload_dir};
pub use error::{Error, ErrorHandler};
pub use file::{download, upload};
pub use progress::{Progress, ProgressEvent, ProgressSink, Reporter};
pub use range::{PositionRange, ReopenableRange, ReopenedRange};
pub use sizing::{calculate_range_size, BUFFER_SIZE, MINIMUM_RANGE_SIZE};
pub use worker::{Worker, WorkerOptions};
