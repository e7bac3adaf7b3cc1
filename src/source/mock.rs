//! Mock ContentSource implementation for testing.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ContentSource, Result, SourceError, SourceForm, TranslationSubmission};

/// Mock content source that serves forms and translations from memory.
#[derive(Default)]
pub struct MockSource {
    forms: RwLock<Vec<SourceForm>>,
    translations: RwLock<HashMap<String, Vec<TranslationSubmission>>>,
    global: RwLock<Vec<TranslationSubmission>>,
    failing_paths: RwLock<HashSet<String>>,
    fail_on_forms: RwLock<bool>,
    fail_on_global: RwLock<bool>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_form(&self, form: SourceForm) {
        self.forms.write().await.push(form);
    }

    pub async fn set_translations(&self, form_path: &str, submissions: Vec<TranslationSubmission>) {
        self.translations
            .write()
            .await
            .insert(form_path.to_string(), submissions);
    }

    pub async fn set_global_translations(&self, submissions: Vec<TranslationSubmission>) {
        *self.global.write().await = submissions;
    }

    /// Make translation requests for `form_path` fail.
    pub async fn set_fail_on_translations(&self, form_path: &str) {
        self.failing_paths.write().await.insert(form_path.to_string());
    }

    pub async fn set_fail_on_forms(&self, fail: bool) {
        *self.fail_on_forms.write().await = fail;
    }

    pub async fn set_fail_on_global(&self, fail: bool) {
        *self.fail_on_global.write().await = fail;
    }
}

#[async_trait]
impl ContentSource for MockSource {
    async fn fetch_forms(&self) -> Result<Vec<SourceForm>> {
        if *self.fail_on_forms.read().await {
            return Err(SourceError::Unavailable("forms".to_string()));
        }
        Ok(self.forms.read().await.clone())
    }

    async fn fetch_translations(&self, form_path: &str) -> Result<Vec<TranslationSubmission>> {
        if self.failing_paths.read().await.contains(form_path) {
            return Err(SourceError::Unavailable(format!(
                "translations for {}",
                form_path
            )));
        }
        Ok(self
            .translations
            .read()
            .await
            .get(form_path)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_global_translations(&self) -> Result<Vec<TranslationSubmission>> {
        if *self.fail_on_global.read().await {
            return Err(SourceError::Unavailable("global translations".to_string()));
        }
        Ok(self.global.read().await.clone())
    }
}
