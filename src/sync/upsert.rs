//! Idempotent lookup-or-insert of translation rows by natural key.

use async_trait::async_trait;
use serde::Serialize;

use crate::storage::{ImportTx, Result, RowId, TranslationValues};

/// Characters of an oversized key kept in reports.
pub const KEY_PREFIX_LENGTH: usize = 40;

/// Translation value rejected by the length policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OversizedValue {
    pub too_long_key: String,
    pub key_length: usize,
    pub nn_length: Option<usize>,
    pub en_length: Option<usize>,
}

impl OversizedValue {
    /// Check `key`, `nn` and `en` against `ceiling`, counted in characters.
    pub fn check(key: &str, nn: Option<&str>, en: Option<&str>, ceiling: usize) -> Option<Self> {
        let key_length = key.chars().count();
        let nn_length = nn.map(|v| v.chars().count());
        let en_length = en.map(|v| v.chars().count());

        let exceeds = |len: Option<usize>| len.is_some_and(|l| l > ceiling);
        if key_length <= ceiling && !exceeds(nn_length) && !exceeds(en_length) {
            return None;
        }

        Some(Self {
            too_long_key: key.chars().take(KEY_PREFIX_LENGTH).collect(),
            key_length,
            nn_length,
            en_length,
        })
    }

    /// Longest of the measured values.
    pub fn longest(&self) -> usize {
        self.key_length
            .max(self.nn_length.unwrap_or_default())
            .max(self.en_length.unwrap_or_default())
    }
}

/// Outcome of one upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Row already present; latest revision id.
    Existing(RowId),
    /// Row and revision 1 inserted.
    Created(RowId),
    /// Row absent, insert suppressed by dry-run.
    Planned,
    /// Row absent and rejected by the length policy.
    ValueTooLarge(OversizedValue),
}

impl UpsertOutcome {
    /// Revision id to include in a snapshot.
    pub fn revision_id(&self) -> Option<RowId> {
        match self {
            UpsertOutcome::Existing(id) | UpsertOutcome::Created(id) => Some(*id),
            UpsertOutcome::Planned | UpsertOutcome::ValueTooLarge(_) => None,
        }
    }
}

/// A row identified by a natural key.
#[async_trait]
pub trait NaturalKey: Send + Sync {
    fn key(&self) -> &str;

    /// Translated values subject to the length policy.
    fn translated(&self) -> (Option<&str>, Option<&str>);

    /// Latest revision id of the existing row.
    async fn lookup(&self, tx: &mut dyn ImportTx) -> Result<Option<RowId>>;

    /// Insert row and revision 1, returning the revision id.
    async fn create(&self, tx: &mut dyn ImportTx, created_by: &str) -> Result<RowId>;
}

/// Form translation keyed by `(form_id, key)`.
///
/// `form_id` is `None` when the form itself is only planned (dry run).
#[derive(Debug, Clone)]
pub struct FormTranslationKey<'a> {
    pub form_id: Option<RowId>,
    pub key: &'a str,
    pub nn: Option<&'a str>,
    pub en: Option<&'a str>,
}

#[async_trait]
impl NaturalKey for FormTranslationKey<'_> {
    fn key(&self) -> &str {
        self.key
    }

    fn translated(&self) -> (Option<&str>, Option<&str>) {
        (self.nn, self.en)
    }

    async fn lookup(&self, tx: &mut dyn ImportTx) -> Result<Option<RowId>> {
        match self.form_id {
            Some(form_id) => tx.find_form_translation(form_id, self.key).await,
            None => Ok(None),
        }
    }

    async fn create(&self, tx: &mut dyn ImportTx, created_by: &str) -> Result<RowId> {
        let form_id = self.form_id.ok_or_else(|| {
            crate::storage::StorageError::MissingParent(format!("form of translation {}", self.key))
        })?;
        let values = TranslationValues {
            nb: Some(self.key.to_string()),
            nn: self.nn.map(str::to_string),
            en: self.en.map(str::to_string),
        };
        tx.insert_form_translation(form_id, self.key, &values, created_by).await
    }
}

/// Global translation keyed by `key`.
#[derive(Debug, Clone)]
pub struct GlobalTranslationKey<'a> {
    pub key: &'a str,
    pub tag: &'a str,
    pub nn: Option<&'a str>,
    pub en: Option<&'a str>,
}

impl GlobalTranslationKey<'_> {
    /// Stored values. Validation messages have no default-language text.
    pub fn values(&self) -> TranslationValues {
        let nb = if self.tag == super::VALIDATION_TAG {
            None
        } else {
            Some(self.key.to_string())
        };
        TranslationValues {
            nb,
            nn: self.nn.map(str::to_string),
            en: self.en.map(str::to_string),
        }
    }
}

#[async_trait]
impl NaturalKey for GlobalTranslationKey<'_> {
    fn key(&self) -> &str {
        self.key
    }

    fn translated(&self) -> (Option<&str>, Option<&str>) {
        (self.nn, self.en)
    }

    async fn lookup(&self, tx: &mut dyn ImportTx) -> Result<Option<RowId>> {
        tx.find_global_translation(self.key).await
    }

    async fn create(&self, tx: &mut dyn ImportTx, created_by: &str) -> Result<RowId> {
        tx.insert_global_translation(self.key, self.tag, &self.values(), created_by)
            .await
    }
}

/// Lookup-then-insert with an optional length ceiling.
///
/// Existing rows win regardless of their values; the ceiling only guards
/// new inserts.
#[derive(Debug, Clone, Copy)]
pub struct Upsert<'a> {
    ceiling: Option<usize>,
    dry_run: bool,
    created_by: &'a str,
}

impl<'a> Upsert<'a> {
    pub fn new(ceiling: Option<usize>, dry_run: bool, created_by: &'a str) -> Self {
        Self {
            ceiling,
            dry_run,
            created_by,
        }
    }

    pub async fn apply<K>(&self, tx: &mut dyn ImportTx, candidate: &K) -> Result<UpsertOutcome>
    where
        K: NaturalKey + ?Sized,
    {
        if let Some(id) = candidate.lookup(tx).await? {
            return Ok(UpsertOutcome::Existing(id));
        }

        if let Some(ceiling) = self.ceiling {
            let (nn, en) = candidate.translated();
            if let Some(oversized) = OversizedValue::check(candidate.key(), nn, en, ceiling) {
                return Ok(UpsertOutcome::ValueTooLarge(oversized));
            }
        }

        if self.dry_run {
            return Ok(UpsertOutcome::Planned);
        }

        let id = candidate.create(tx, self.created_by).await?;
        Ok(UpsertOutcome::Created(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_within_ceiling() {
        assert_eq!(OversizedValue::check("Ja", Some("Ja"), Some("Yes"), 5120), None);
    }

    #[test]
    fn test_check_boundary_is_inclusive() {
        let at_ceiling = "a".repeat(5120);
        assert_eq!(OversizedValue::check(&at_ceiling, None, None, 5120), None);

        let over = "a".repeat(5121);
        let oversized = OversizedValue::check(&over, None, None, 5120).unwrap();
        assert_eq!(oversized.key_length, 5121);
        assert_eq!(oversized.too_long_key.chars().count(), KEY_PREFIX_LENGTH);
    }

    #[test]
    fn test_check_counts_characters_not_bytes() {
        let text = "ø".repeat(10);
        assert_eq!(text.len(), 20);
        assert_eq!(OversizedValue::check("k", Some(&text), None, 10), None);
        assert!(OversizedValue::check("k", Some(&text), None, 9).is_some());
    }

    #[test]
    fn test_check_reports_translated_lengths() {
        let en = "e".repeat(30);
        let oversized = OversizedValue::check("key", Some("nn"), Some(&en), 20).unwrap();
        assert_eq!(oversized.too_long_key, "key");
        assert_eq!(oversized.key_length, 3);
        assert_eq!(oversized.nn_length, Some(2));
        assert_eq!(oversized.en_length, Some(30));
        assert_eq!(oversized.longest(), 30);
    }

    #[test]
    fn test_global_values_validation_tag() {
        let candidate = GlobalTranslationKey {
            key: "required",
            tag: "validering",
            nn: Some("påkravd"),
            en: Some("required"),
        };
        assert_eq!(candidate.values().nb, None);

        let candidate = GlobalTranslationKey {
            tag: "skjematekster",
            ..candidate
        };
        assert_eq!(candidate.values().nb.as_deref(), Some("required"));
    }

    #[test]
    fn test_revision_id() {
        assert_eq!(UpsertOutcome::Created(3).revision_id(), Some(3));
        assert_eq!(UpsertOutcome::Existing(4).revision_id(), Some(4));
        assert_eq!(UpsertOutcome::Planned.revision_id(), None);
    }
}
