//! # outagewatch-sync
//!
//! Transform, diff and publish stages of the outage pipeline.
//!
//! Call [`pipeline::run`] for a full fetch → commit cycle. The stages are
//! public on their own for the CLI's `transform` and `diff` commands.

pub mod diff;
pub mod error;
pub mod hash_store;
pub mod pipeline;
pub mod publish;
pub mod transform;
pub mod writer;

pub use diff::{diff, ChangeSet, FieldChange, Modification};
pub use error::{DiffError, SyncError, TransformError};
pub use pipeline::{RunOptions, RunOutcome, RunReport};
pub use publish::GitRepo;
pub use transform::{transform, DEFAULT_LOCALE};
pub use writer::WriteResult;
