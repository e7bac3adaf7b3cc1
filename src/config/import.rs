//! Import policy: limits, dry-run and re-import behaviour.

use serde::Deserialize;

/// Default ceiling for translation keys and values, in characters.
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 5120;

/// Default ceiling for `skjemanummer`, in characters.
pub const DEFAULT_MAX_SKJEMANUMMER_LENGTH: usize = 24;

/// Creation actor stamped on imported rows.
pub const DEFAULT_CREATED_BY: &str = "IMPORT";

/// What to do when a form with the same path has already been imported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReimportPolicy {
    /// Reuse the stored form and its latest revision untouched.
    #[default]
    KeepExisting,
    /// Append a new form revision when title, components or properties
    /// differ from the latest stored revision.
    AppendRevision,
}

/// Import policy configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Perform reads and validation only; every write is rolled back.
    pub dry_run: bool,
    /// Ceiling applied to form translation keys and both translated values.
    pub max_value_length: usize,
    /// Ceiling applied to global translations. `None` disables the check.
    pub max_global_value_length: Option<usize>,
    /// Forms whose skjemanummer is longer than this are rejected outright.
    pub max_skjemanummer_length: usize,
    /// Behaviour for forms that already exist in the store.
    pub reimport: ReimportPolicy,
    /// Actor recorded in `created_by` for imported rows.
    pub created_by: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
            max_global_value_length: None,
            max_skjemanummer_length: DEFAULT_MAX_SKJEMANUMMER_LENGTH,
            reimport: ReimportPolicy::KeepExisting,
            created_by: DEFAULT_CREATED_BY.to_string(),
        }
    }
}
