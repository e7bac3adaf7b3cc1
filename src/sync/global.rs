//! Global translation reconciliation.

use std::collections::HashSet;

use tracing::{error, info, warn};

use super::publication;
use super::summary::GlobalOutcome;
use super::upsert::{GlobalTranslationKey, Upsert, UpsertOutcome};
use super::ImportError;
use crate::config::ImportConfig;
use crate::normalize::{group_by_tag, NormalizedTranslations};
use crate::source::{ContentSource, TranslationSubmission};
use crate::storage::{ImportTx, PublicationStore, Result, RowId};

/// Tag of validation messages. Their default-language slot stays empty.
pub const VALIDATION_TAG: &str = "validering";

/// Reconciles the global translation namespace in one unit of work.
pub struct GlobalReconciler<'a> {
    store: &'a dyn PublicationStore,
    source: &'a dyn ContentSource,
    config: &'a ImportConfig,
}

impl<'a> GlobalReconciler<'a> {
    pub fn new(
        store: &'a dyn PublicationStore,
        source: &'a dyn ContentSource,
        config: &'a ImportConfig,
    ) -> Self {
        Self {
            store,
            source,
            config,
        }
    }

    /// Upsert every global key and produce the snapshot forms will link to.
    ///
    /// Any failure rolls back the whole namespace.
    pub async fn reconcile(&self) -> std::result::Result<GlobalOutcome, ImportError> {
        let submissions = self.source.fetch_global_translations().await?;
        info!(submissions = submissions.len(), "Importing global translations");

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(ImportError::GlobalPersistence)?;

        match self.import(tx.as_mut(), &submissions).await {
            Ok(outcome) => {
                let closed = if self.config.dry_run {
                    tx.rollback().await
                } else {
                    tx.commit().await
                };
                closed.map_err(ImportError::GlobalPersistence)?;
                info!(
                    created = outcome.created,
                    existing = outcome.existing,
                    snapshot = ?outcome.snapshot,
                    "Imported global translations"
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "Failed to import global translations");
                if let Err(rollback) = tx.rollback().await {
                    error!(error = %rollback, "Rollback failed");
                }
                Err(ImportError::GlobalPersistence(e))
            }
        }
    }

    async fn import(
        &self,
        tx: &mut dyn ImportTx,
        submissions: &[TranslationSubmission],
    ) -> Result<GlobalOutcome> {
        let mut outcome = GlobalOutcome::default();
        let upsert = Upsert::new(
            self.config.max_global_value_length,
            self.config.dry_run,
            &self.config.created_by,
        );
        let mut seen: HashSet<RowId> = HashSet::new();
        let mut revision_ids: Vec<RowId> = Vec::new();

        for (tag, members) in group_by_tag(submissions) {
            let subject = format!("global.{tag}");
            let translations = NormalizedTranslations::from_submissions(&subject, members);
            for language in &translations.duplicate_languages {
                if !outcome.duplicate_languages.contains(language) {
                    outcome.duplicate_languages.push(language.clone());
                }
            }

            for key in &translations.keys {
                let candidate = GlobalTranslationKey {
                    key,
                    tag: &tag,
                    nn: translations.nn(key),
                    en: translations.en(key),
                };
                let result = upsert.apply(tx, &candidate).await?;
                match &result {
                    UpsertOutcome::Created(_) => outcome.created += 1,
                    UpsertOutcome::Existing(_) => outcome.existing += 1,
                    UpsertOutcome::Planned => outcome.planned += 1,
                    UpsertOutcome::ValueTooLarge(oversized) => {
                        warn!(
                            tag = %tag,
                            key = %oversized.too_long_key,
                            key_length = oversized.key_length,
                            "Global translation too long, skipping key"
                        );
                        outcome.too_long.push(oversized.clone());
                    }
                }
                if let Some(id) = result.revision_id() {
                    if seen.insert(id) {
                        revision_ids.push(id);
                    }
                }
            }
            outcome.tags.push(tag);
        }

        outcome.snapshot = if self.config.dry_run {
            tx.latest_global_snapshot()
                .await?
                .map(publication::SnapshotOutcome::Reused)
        } else {
            publication::global_snapshot(
                tx,
                &revision_ids,
                outcome.created > 0,
                &self.config.created_by,
            )
            .await?
        };

        Ok(outcome)
    }
}
