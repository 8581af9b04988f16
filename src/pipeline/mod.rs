//! Pipeline entry points.
//!
//! - `SyncEngine`: keep the cache fresh from the remote source
//! - `IndexReconciler`: converge the search index onto the cache
//! - `search_documents`: answer a query string with one page of results
//! - `run_pipeline`: sync followed by reconcile

pub mod diff;
#[allow(clippy::module_inception)]
mod pipeline;
pub mod reconcile;
mod search;
pub mod sync;

pub use diff::{DiffCalculator, DiffResult, calculate_diff, orphan_ids};
pub use pipeline::{PipelineReport, run_pipeline};
pub use reconcile::{IndexReconciler, ReconcileReport};
pub use search::search_documents;
pub use sync::{ArchiveReport, SyncEngine};
