//! Per-form reconciliation.
//!
//! One form is one unit of work: form row, revision, translations and
//! publication commit together or not at all.

use tracing::{debug, error, info, warn};

use super::publication::{self, PublicationOutcome, PublishRequest};
use super::summary::{FormOutcome, FormStatus};
use super::upsert::{FormTranslationKey, OversizedValue, Upsert, UpsertOutcome};
use super::ImportError;
use crate::config::{ImportConfig, ReimportPolicy, DEFAULT_CREATED_BY};
use crate::normalize::{published_languages, NormalizedTranslations};
use crate::source::{ContentSource, FormProperties, SourceForm};
use crate::storage::{
    FormContent, ImportTx, NewForm, PublicationStore, RowId, StorageError,
};

/// Actor recorded on form revisions without a known modifier.
pub const UNKNOWN_MODIFIER: &str = "ukjent";

/// What a successful unit of work did.
#[derive(Debug, Clone, Default)]
pub struct FormImport {
    pub form_id: Option<RowId>,
    pub form_revision_id: Option<RowId>,
    pub form_created: bool,
    pub revision_created: Option<i64>,
    pub translations_created: usize,
    pub translations_existing: usize,
    pub translations_planned: usize,
    pub too_long: Vec<OversizedValue>,
    pub submission_count: usize,
    pub duplicate_languages: Vec<String>,
    pub publication: Option<PublicationOutcome>,
}

impl FormImport {
    fn into_outcome(self, skjemanummer: &str, path: &str) -> FormOutcome {
        let mut outcome = FormOutcome::new(skjemanummer, path, FormStatus::Imported);
        outcome.form_id = self.form_id;
        outcome.form_created = self.form_created;
        outcome.revision_created = self.revision_created;
        outcome.translations_created = self.translations_created;
        outcome.translations_existing = self.translations_existing;
        outcome.translations_planned = self.translations_planned;
        outcome.too_long = self.too_long;
        outcome.submission_count = self.submission_count;
        outcome.duplicate_languages = self.duplicate_languages;
        outcome.publication = self.publication;
        outcome
    }
}

/// Reconciles single forms against the store.
pub struct FormReconciler<'a> {
    store: &'a dyn PublicationStore,
    source: &'a dyn ContentSource,
    config: &'a ImportConfig,
}

impl<'a> FormReconciler<'a> {
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

    /// Reconcile one form.
    ///
    /// Never fails: errors roll the unit of work back and are reported in
    /// the returned outcome.
    pub async fn reconcile(
        &self,
        form: &SourceForm,
        properties: &FormProperties,
        global_snapshot_id: Option<RowId>,
    ) -> FormOutcome {
        let skjemanummer = properties.skjemanummer.as_str();

        if skjemanummer.chars().count() > self.config.max_skjemanummer_length {
            warn!(
                skjemanummer,
                path = %form.path,
                max = self.config.max_skjemanummer_length,
                "Skjemanummer too long, skipping form"
            );
            return FormOutcome::new(skjemanummer, &form.path, FormStatus::SkjemanummerTooLong);
        }

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                let e = ImportError::from(e);
                error!(skjemanummer, error = %e, "Failed to open unit of work");
                return FormOutcome::failed(skjemanummer, &form.path, &e);
            }
        };

        match self
            .import(tx.as_mut(), form, properties, global_snapshot_id)
            .await
        {
            Ok(import) => {
                let closed = if self.config.dry_run {
                    tx.rollback().await
                } else {
                    tx.commit().await
                };
                match closed {
                    Ok(()) => {
                        info!(
                            skjemanummer,
                            created = import.translations_created,
                            existing = import.translations_existing,
                            published = import.publication.is_some(),
                            "Imported form"
                        );
                        import.into_outcome(skjemanummer, &form.path)
                    }
                    Err(e) => {
                        let e = ImportError::from(e);
                        error!(skjemanummer, error = %e, "Failed to close unit of work");
                        FormOutcome::failed(skjemanummer, &form.path, &e)
                    }
                }
            }
            Err(e) => {
                error!(skjemanummer, path = %form.path, error = %e, "Failed to import form");
                if let Err(rollback) = tx.rollback().await {
                    error!(skjemanummer, error = %rollback, "Rollback failed");
                }
                FormOutcome::failed(skjemanummer, &form.path, &e)
            }
        }
    }

    async fn import(
        &self,
        tx: &mut dyn ImportTx,
        form: &SourceForm,
        properties: &FormProperties,
        global_snapshot_id: Option<RowId>,
    ) -> Result<FormImport, ImportError> {
        let mut import = FormImport::default();

        let content = FormContent {
            title: form.title.clone(),
            components: serde_json::to_string(&form.components).map_err(StorageError::from)?,
            properties: serde_json::to_string(&form.properties).map_err(StorageError::from)?,
            created_by: properties
                .modified_by
                .clone()
                .unwrap_or_else(|| UNKNOWN_MODIFIER.to_string()),
        };
        self.resolve_form(tx, properties, &form.path, &content, &mut import)
            .await?;

        let submissions = self.source.fetch_translations(&form.path).await?;
        let translations =
            NormalizedTranslations::from_submissions(&properties.skjemanummer, &submissions);
        import.submission_count = translations.submission_count;
        import.duplicate_languages = translations.duplicate_languages.clone();
        if translations.submission_count > 2 {
            warn!(
                skjemanummer = %properties.skjemanummer,
                count = translations.submission_count,
                "More than two translation resources"
            );
        }

        let upsert = Upsert::new(
            Some(self.config.max_value_length),
            self.config.dry_run,
            &self.config.created_by,
        );
        let mut revision_ids = Vec::with_capacity(translations.keys.len());
        for key in &translations.keys {
            let candidate = FormTranslationKey {
                form_id: import.form_id,
                key,
                nn: translations.nn(key),
                en: translations.en(key),
            };
            match upsert.apply(tx, &candidate).await? {
                UpsertOutcome::Created(id) => {
                    import.translations_created += 1;
                    revision_ids.push(id);
                }
                UpsertOutcome::Existing(id) => {
                    import.translations_existing += 1;
                    revision_ids.push(id);
                }
                UpsertOutcome::Planned => import.translations_planned += 1,
                UpsertOutcome::ValueTooLarge(oversized) => {
                    warn!(
                        skjemanummer = %properties.skjemanummer,
                        key = %oversized.too_long_key,
                        key_length = oversized.key_length,
                        nn_length = ?oversized.nn_length,
                        en_length = ?oversized.en_length,
                        "Translation too long, skipping key"
                    );
                    import.too_long.push(oversized);
                }
            }
        }

        if self.config.dry_run || !properties.is_published() {
            return Ok(import);
        }

        if let (Some(form_id), Some(form_revision_id)) = (import.form_id, import.form_revision_id) {
            let languages = published_languages(properties.published_languages.as_deref());
            let request = PublishRequest {
                form_id,
                form_revision_id,
                translation_revision_ids: &revision_ids,
                global_snapshot_id,
                languages,
                published_at: properties.published.as_deref(),
                published_by: properties
                    .published_by
                    .as_deref()
                    .unwrap_or(DEFAULT_CREATED_BY),
            };
            import.publication = Some(publication::publish_form(tx, request).await?);
        }

        Ok(import)
    }

    /// Find or create the form row and pick the revision to publish.
    async fn resolve_form(
        &self,
        tx: &mut dyn ImportTx,
        properties: &FormProperties,
        path: &str,
        content: &FormContent,
        import: &mut FormImport,
    ) -> Result<(), StorageError> {
        let form_id = match tx.find_form(path).await? {
            Some(id) => {
                debug!(path, form_id = id, "Form already exists");
                id
            }
            None if self.config.dry_run => {
                debug!(path, "Form would be created");
                return Ok(());
            }
            None => {
                let id = tx
                    .insert_form(&NewForm {
                        skjemanummer: properties.skjemanummer.clone(),
                        path: path.to_string(),
                        created_by: self.config.created_by.clone(),
                    })
                    .await?;
                import.form_created = true;
                id
            }
        };
        import.form_id = Some(form_id);

        let next_revision = match tx.latest_form_revision(form_id).await? {
            None => 1,
            Some(latest) => match self.config.reimport {
                ReimportPolicy::KeepExisting => {
                    import.form_revision_id = Some(latest.id);
                    return Ok(());
                }
                ReimportPolicy::AppendRevision if latest.content.same_payload(content) => {
                    import.form_revision_id = Some(latest.id);
                    return Ok(());
                }
                ReimportPolicy::AppendRevision if self.config.dry_run => {
                    debug!(path, revision = latest.revision + 1, "Revision would be appended");
                    import.form_revision_id = Some(latest.id);
                    return Ok(());
                }
                ReimportPolicy::AppendRevision => latest.revision + 1,
            },
        };

        if self.config.dry_run {
            return Ok(());
        }

        let revision_id = tx
            .insert_form_revision(form_id, next_revision, content)
            .await?;
        info!(path, revision = next_revision, "Created form revision");
        import.form_revision_id = Some(revision_id);
        import.revision_created = Some(next_revision);
        Ok(())
    }
}
