//! Content source boundary.
//!
//! The importer reads forms and translation submissions from a form.io
//! deployment. This module owns the wire types and the [`ContentSource`]
//! trait; [`FormioSource`] talks HTTP, [`MockSource`] serves canned data.

mod formio;
mod mock;

pub use formio::FormioSource;
pub use mock::MockSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type for content source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors from the content source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{resource} request failed with status {status}")]
    Status {
        resource: String,
        status: reqwest::StatusCode,
    },

    #[error("Invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Content source configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the form.io project.
    pub base_url: String,
    /// Upper bound on the number of forms listed.
    pub max_forms: u32,
    /// Tag selecting the forms to import.
    pub form_tag: String,
    /// Upper bound on translation submissions per request.
    pub translation_limit: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            max_forms: 1000,
            form_tag: "nav-skjema".to_string(),
            translation_limit: 1000,
            timeout_secs: 30,
        }
    }
}

/// A form as listed by the content source.
///
/// `components` and `properties` are kept as opaque JSON and stored verbatim;
/// [`SourceForm::properties`] gives typed access to the few fields the
/// importer reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceForm {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub components: serde_json::Value,
    #[serde(default)]
    pub properties: Option<serde_json::Value>,
}

impl SourceForm {
    /// Typed view of the properties bag.
    ///
    /// Returns `None` when the form has no properties or they cannot be read.
    pub fn properties(&self) -> Option<FormProperties> {
        let raw = self.properties.as_ref().filter(|p| p.is_object())?;
        match serde_json::from_value(raw.clone()) {
            Ok(props) => Some(props),
            Err(e) => {
                tracing::warn!(path = %self.path, error = %e, "Unreadable form properties");
                None
            }
        }
    }
}

/// Fields of the form properties bag the importer needs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormProperties {
    pub skjemanummer: String,
    pub published: Option<String>,
    pub published_by: Option<String>,
    pub unpublished: Option<String>,
    pub unpublished_by: Option<String>,
    pub published_languages: Option<Vec<String>>,
    pub is_test_form: Option<bool>,
    pub modified_by: Option<String>,
}

impl FormProperties {
    pub fn is_test_form(&self) -> bool {
        self.is_test_form == Some(true)
    }

    /// Whether the form is live: a publish timestamp and no unpublish
    /// timestamp at all. Test forms are never published.
    pub fn is_published(&self) -> bool {
        !self.is_test_form() && self.published.is_some() && self.unpublished.is_none()
    }
}

/// One per-language translation submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationSubmission {
    pub data: SubmissionData,
}

/// Payload of a translation submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionData {
    /// Resource name (`global` or `global.<path>`).
    pub name: String,
    pub language: String,
    /// Key to translated text, in source order.
    pub i18n: serde_json::Map<String, serde_json::Value>,
    /// Classification tag, present on global submissions.
    pub tag: Option<String>,
    /// Owning form, present on form submissions.
    pub form: Option<String>,
}

impl TranslationSubmission {
    pub fn new(language: &str, entries: &[(&str, &str)]) -> Self {
        let i18n = entries
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        Self {
            data: SubmissionData {
                language: language.to_string(),
                i18n,
                ..Default::default()
            },
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.data.tag = Some(tag.to_string());
        self
    }

    pub fn with_form(mut self, form: &str) -> Self {
        self.data.form = Some(form.to_string());
        self
    }
}

/// Read-only access to forms and translations.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// List importable forms.
    async fn fetch_forms(&self) -> Result<Vec<SourceForm>>;

    /// List translation submissions for one form path.
    async fn fetch_translations(&self, form_path: &str) -> Result<Vec<TranslationSubmission>>;

    /// List global translation submissions.
    async fn fetch_global_translations(&self) -> Result<Vec<TranslationSubmission>>;
}
