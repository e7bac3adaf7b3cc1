//! Run summary.
//!
//! Reconcilers return outcomes by value; the coordinator merges them here.
//! Serialized field names follow the report format of the import job.

use serde::Serialize;

use super::publication::{PublicationOutcome, SnapshotOutcome};
use super::upsert::OversizedValue;
use super::ImportError;
use crate::storage::RowId;

/// Final state of one form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormStatus {
    Imported,
    Failed,
    SkjemanummerTooLong,
}

/// Result of reconciling one form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormOutcome {
    pub skjemanummer: String,
    pub path: String,
    pub status: FormStatus,
    pub form_id: Option<RowId>,
    pub form_created: bool,
    /// Revision number appended by this run, if any.
    pub revision_created: Option<i64>,
    pub translations_created: usize,
    pub translations_existing: usize,
    /// Keys that would be created outside dry-run mode.
    pub translations_planned: usize,
    pub too_long: Vec<OversizedValue>,
    pub submission_count: usize,
    pub duplicate_languages: Vec<String>,
    pub publication: Option<PublicationOutcome>,
    pub error: Option<String>,
}

impl FormOutcome {
    pub fn new(skjemanummer: &str, path: &str, status: FormStatus) -> Self {
        Self {
            skjemanummer: skjemanummer.to_string(),
            path: path.to_string(),
            status,
            form_id: None,
            form_created: false,
            revision_created: None,
            translations_created: 0,
            translations_existing: 0,
            translations_planned: 0,
            too_long: Vec::new(),
            submission_count: 0,
            duplicate_languages: Vec::new(),
            publication: None,
            error: None,
        }
    }

    pub fn failed(skjemanummer: &str, path: &str, error: &ImportError) -> Self {
        let mut outcome = Self::new(skjemanummer, path, FormStatus::Failed);
        outcome.error = Some(error.to_string());
        outcome
    }
}

/// Result of the global translation reconciliation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalOutcome {
    pub tags: Vec<String>,
    pub created: usize,
    pub existing: usize,
    pub planned: usize,
    pub too_long: Vec<OversizedValue>,
    pub duplicate_languages: Vec<String>,
    pub snapshot: Option<SnapshotOutcome>,
}

impl GlobalOutcome {
    /// Global snapshot every publication in this run links to.
    pub fn snapshot_id(&self) -> Option<RowId> {
        self.snapshot.map(|s| s.id())
    }
}

/// Oversized translation value of a form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TooLongTranslation {
    pub skjemanummer: String,
    #[serde(flatten)]
    pub value: OversizedValue,
}

/// Form with an anomalous number of translation submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationCount {
    pub skjemanummer: String,
    pub number_of_translations: usize,
}

/// Aggregate counts for the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_too_long: usize,
    pub value_too_long: usize,
    pub multi_translation: usize,
}

/// Summary of one import run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub dry_run: bool,
    pub max_translation_length: usize,
    pub forms_with_too_long_translation: Vec<TooLongTranslation>,
    pub too_long_skjemanummer: Vec<String>,
    pub more_than_two_translations: Vec<TranslationCount>,
    pub failed_inserts_skjemanummer: Vec<String>,
    pub success_inserts_skjemanummer: Vec<String>,
    pub skipped_without_properties: usize,
    pub excluded_test_forms: usize,
    pub published_forms: usize,
    pub global: Option<GlobalOutcome>,
    /// Reason the run stopped before reconciling forms.
    pub aborted: Option<String>,
    #[serde(skip)]
    pub forms: Vec<FormOutcome>,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Summary of a run that could not start, e.g. with the store unreachable.
    pub fn aborted_before_start(dry_run: bool, error: &ImportError) -> Self {
        let mut summary = Self::new(dry_run);
        summary.abort(error);
        summary
    }

    /// Fold one form outcome into the summary.
    pub fn record_form(&mut self, outcome: FormOutcome) {
        match outcome.status {
            FormStatus::Imported => {
                self.success_inserts_skjemanummer.push(outcome.skjemanummer.clone());
            }
            FormStatus::Failed => {
                self.failed_inserts_skjemanummer.push(outcome.skjemanummer.clone());
            }
            FormStatus::SkjemanummerTooLong => {
                self.too_long_skjemanummer.push(outcome.skjemanummer.clone());
            }
        }

        for value in &outcome.too_long {
            self.max_translation_length = self.max_translation_length.max(value.longest());
            self.forms_with_too_long_translation.push(TooLongTranslation {
                skjemanummer: outcome.skjemanummer.clone(),
                value: value.clone(),
            });
        }

        if outcome.submission_count > 2 {
            self.more_than_two_translations.push(TranslationCount {
                skjemanummer: outcome.skjemanummer.clone(),
                number_of_translations: outcome.submission_count,
            });
        }

        if outcome.publication.is_some() {
            self.published_forms += 1;
        }

        self.forms.push(outcome);
    }

    pub fn record_global(&mut self, outcome: GlobalOutcome) {
        for value in &outcome.too_long {
            self.max_translation_length = self.max_translation_length.max(value.longest());
        }
        self.global = Some(outcome);
    }

    /// Mark the run as stopped by a fatal error.
    pub fn abort(&mut self, error: &ImportError) {
        self.aborted = Some(error.to_string());
    }

    pub fn counts(&self) -> SummaryCounts {
        let global_too_long = self.global.as_ref().map_or(0, |g| g.too_long.len());
        SummaryCounts {
            succeeded: self.success_inserts_skjemanummer.len(),
            failed: self.failed_inserts_skjemanummer.len(),
            skipped_too_long: self.too_long_skjemanummer.len(),
            value_too_long: self.forms_with_too_long_translation.len() + global_too_long,
            multi_translation: self.more_than_two_translations.len(),
        }
    }

    /// Outcome of the form at `path`.
    pub fn form(&self, path: &str) -> Option<&FormOutcome> {
        self.forms.iter().find(|f| f.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    fn oversized(key_length: usize, en_length: Option<usize>) -> OversizedValue {
        OversizedValue {
            too_long_key: "k".repeat(key_length.min(40)),
            key_length,
            nn_length: None,
            en_length,
        }
    }

    #[test]
    fn test_record_form_statuses() {
        let mut summary = RunSummary::new(false);
        summary.record_form(FormOutcome::new("NAV 01", "a", FormStatus::Imported));
        summary.record_form(FormOutcome::new("NAV 02", "b", FormStatus::Failed));
        summary.record_form(FormOutcome::new(
            "NAV 03-00.00-with-a-long-suffix",
            "c",
            FormStatus::SkjemanummerTooLong,
        ));

        let counts = summary.counts();
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.skipped_too_long, 1);
        assert_eq!(summary.success_inserts_skjemanummer, ["NAV 01"]);
        assert_eq!(summary.failed_inserts_skjemanummer, ["NAV 02"]);
        assert!(summary.form("c").is_some());
    }

    #[test]
    fn test_record_form_anomalies() {
        let mut summary = RunSummary::new(false);
        let mut outcome = FormOutcome::new("NAV 01", "a", FormStatus::Imported);
        outcome.submission_count = 3;
        outcome.too_long = vec![oversized(10, Some(6000)), oversized(5200, None)];
        summary.record_form(outcome);

        let counts = summary.counts();
        assert_eq!(counts.multi_translation, 1);
        assert_eq!(counts.value_too_long, 2);
        assert_eq!(summary.max_translation_length, 6000);
        assert_eq!(summary.more_than_two_translations[0].number_of_translations, 3);
    }

    #[test]
    fn test_global_too_long_counted() {
        let mut summary = RunSummary::new(false);
        summary.record_global(GlobalOutcome {
            too_long: vec![oversized(7000, None)],
            ..Default::default()
        });

        assert_eq!(summary.counts().value_too_long, 1);
        assert_eq!(summary.max_translation_length, 7000);
    }

    #[test]
    fn test_aborted_before_start_is_reported() {
        let error = ImportError::Persistence(StorageError::UnknownBackend("oracle".to_string()));
        let summary = RunSummary::aborted_before_start(false, &error);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["aborted"], "Persistence failure: Unknown storage type: oracle");
        assert_eq!(json["successInsertsSkjemanummer"], serde_json::json!([]));
        assert_eq!(summary.counts(), SummaryCounts::default());
    }

    #[test]
    fn test_summary_json_shape() {
        let mut summary = RunSummary::new(true);
        let mut outcome = FormOutcome::new("NAV 01", "a", FormStatus::Imported);
        outcome.too_long = vec![oversized(6000, None)];
        summary.record_form(outcome);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["dryRun"], true);
        assert_eq!(json["successInsertsSkjemanummer"][0], "NAV 01");
        let entry = &json["formsWithTooLongTranslation"][0];
        assert_eq!(entry["skjemanummer"], "NAV 01");
        assert_eq!(entry["keyLength"], 6000);
        assert!(json.get("forms").is_none());
    }
}
