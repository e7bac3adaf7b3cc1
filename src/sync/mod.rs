//! Versioned synchronization and publication engine.
//!
//! ## Architecture
//! ```text
//! [Importer] --fetch forms--> [ContentSource]
//!     |
//!     +--> [GlobalReconciler]  one unit of work, commits before any form
//!     |         |
//!     |         v  global snapshot id
//!     +--> [FormReconciler] x N   bounded by pool size, one unit of work each
//!               |
//!               +--> normalize -> upsert per key -> publish_form
//! ```
//!
//! Each reconciler returns an explicit outcome which the [`Importer`] folds
//! into the [`RunSummary`].

mod coordinator;
mod form;
mod global;
pub mod publication;
mod summary;
pub mod upsert;

#[cfg(all(test, feature = "sqlite"))]
mod tests;

pub use coordinator::{Importer, DEFAULT_CONCURRENCY};
pub use form::{FormImport, FormReconciler};
pub use global::{GlobalReconciler, VALIDATION_TAG};
pub use publication::{PublicationOutcome, SnapshotOutcome};
pub use summary::{
    FormOutcome, FormStatus, GlobalOutcome, RunSummary, SummaryCounts, TooLongTranslation,
    TranslationCount,
};
pub use upsert::{OversizedValue, Upsert, UpsertOutcome};

use crate::source::SourceError;
use crate::storage::StorageError;

/// Errors that end a unit of work.
///
/// Validation rejections are not errors; they are recorded in the outcome.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Content source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StorageError),

    #[error("Global translation persistence failure: {0}")]
    GlobalPersistence(#[source] StorageError),
}
