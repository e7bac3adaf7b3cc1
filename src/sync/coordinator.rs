//! Run coordination.
//!
//! Global translations are committed first so every form published in the
//! run links to the same global snapshot. Forms then run concurrently, each
//! in its own unit of work, at most `concurrency` at a time.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info, info_span, warn, Instrument};

use super::form::FormReconciler;
use super::global::GlobalReconciler;
use super::summary::RunSummary;
use super::ImportError;
use crate::config::ImportConfig;
use crate::source::{ContentSource, FormProperties, SourceForm};
use crate::storage::PublicationStore;

/// Default number of forms reconciled at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Drives one import run.
pub struct Importer {
    store: Arc<dyn PublicationStore>,
    source: Arc<dyn ContentSource>,
    config: ImportConfig,
    concurrency: usize,
}

impl Importer {
    pub fn new(
        store: Arc<dyn PublicationStore>,
        source: Arc<dyn ContentSource>,
        config: ImportConfig,
    ) -> Self {
        Self {
            store,
            source,
            config,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Bound concurrent form reconciliation, normally to the pool size.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run the import. Fatal errors are reported in
    /// [`RunSummary::aborted`], never returned.
    pub async fn run(&self) -> RunSummary {
        let span = info_span!("import", dry_run = self.config.dry_run);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> RunSummary {
        let mut summary = RunSummary::new(self.config.dry_run);
        if self.config.dry_run {
            warn!("Dry run: all writes will be rolled back");
        }

        let forms = match self.source.fetch_forms().await {
            Ok(forms) => forms,
            Err(e) => {
                let e = ImportError::SourceUnavailable(e);
                error!(error = %e, "Failed to fetch forms, aborting run");
                summary.abort(&e);
                return summary;
            }
        };
        let candidates = select_forms(forms, &mut summary);
        info!(
            forms = candidates.len(),
            without_properties = summary.skipped_without_properties,
            test_forms = summary.excluded_test_forms,
            "Fetched forms"
        );

        let global = GlobalReconciler::new(self.store.as_ref(), self.source.as_ref(), &self.config);
        let global_snapshot_id = match global.reconcile().await {
            Ok(outcome) => {
                let id = outcome.snapshot_id();
                summary.record_global(outcome);
                id
            }
            Err(e) => {
                error!(error = %e, "Global translation import failed, aborting run");
                summary.abort(&e);
                return summary;
            }
        };

        let reconciler = FormReconciler::new(self.store.as_ref(), self.source.as_ref(), &self.config);
        let outcomes: Vec<_> = stream::iter(candidates.iter())
            .map(|(form, properties)| reconciler.reconcile(form, properties, global_snapshot_id))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            summary.record_form(outcome);
        }

        let counts = summary.counts();
        info!(
            succeeded = counts.succeeded,
            failed = counts.failed,
            skipped_too_long = counts.skipped_too_long,
            value_too_long = counts.value_too_long,
            "Import finished"
        );
        summary
    }
}

/// Drop forms without properties and test forms, counting both.
fn select_forms(
    forms: Vec<SourceForm>,
    summary: &mut RunSummary,
) -> Vec<(SourceForm, FormProperties)> {
    let mut selected = Vec::with_capacity(forms.len());
    for form in forms {
        let Some(properties) = form.properties() else {
            warn!(path = %form.path, "Form has no properties, skipping");
            summary.skipped_without_properties += 1;
            continue;
        };
        if properties.is_test_form() {
            summary.excluded_test_forms += 1;
            continue;
        }
        selected.push((form, properties));
    }
    selected
}
