//! HTTP client for the form.io API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use super::{ContentSource, Result, SourceConfig, SourceError, SourceForm, TranslationSubmission};

/// form.io backed content source.
///
/// A failed request is terminal; the importer does not retry.
pub struct FormioSource {
    client: Client,
    config: SourceConfig,
}

impl FormioSource {
    /// Create a new source with the given configuration.
    pub fn new(config: SourceConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(SourceError::Config("form.io base URL not configured".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn forms_url(&self) -> String {
        format!(
            "{}/form?type=form&tag={}&limit={}",
            self.base_url(),
            self.config.form_tag,
            self.config.max_forms
        )
    }

    fn translations_url(&self, form_path: &str) -> String {
        format!(
            "{}/language/submission?data.name=global.{}&limit={}",
            self.base_url(),
            form_path,
            self.config.translation_limit
        )
    }

    fn global_translations_url(&self) -> String {
        format!(
            "{}/language/submission?data.name=global&limit={}",
            self.base_url(),
            self.config.translation_limit
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, resource: &str, url: &str) -> Result<T> {
        debug!(%url, "GET {}", resource);

        let response = self.client.get(url).send().await.map_err(|e| {
            error!(%url, error = %e, "Error fetching {}", resource);
            SourceError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(%url, %status, "Failed to fetch {}", resource);
            return Err(SourceError::Status {
                resource: resource.to_string(),
                status,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ContentSource for FormioSource {
    async fn fetch_forms(&self) -> Result<Vec<SourceForm>> {
        info!("Fetching forms...");
        self.get_json("forms", &self.forms_url()).await
    }

    async fn fetch_translations(&self, form_path: &str) -> Result<Vec<TranslationSubmission>> {
        self.get_json("translations", &self.translations_url(form_path))
            .await
    }

    async fn fetch_global_translations(&self) -> Result<Vec<TranslationSubmission>> {
        self.get_json("global translations", &self.global_translations_url())
            .await
    }
}
