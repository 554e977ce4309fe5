//! Built-in scheduler: an interval ticker feeding a single pipeline processor.

mod error;
pub mod paths;
mod runtime;
pub mod summary;

pub use error::DaemonError;
pub use runtime::{init_tracing, pipeline_runner, run, run_with_shutdown, start_blocking, Runner};
pub use summary::{RunStatus, RunSummary};
