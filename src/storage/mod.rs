//! Append-only revisioned store for forms, translations and publications.
//!
//! The engine talks to the store through [`PublicationStore`], which hands
//! out one [`ImportTx`] per unit of work. Every row is inserted once and
//! never updated; corrections are new revisions.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub mod schema;
#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub mod sql;

/// Surrogate id of a stored row.
pub type RowId = i64;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[cfg(any(feature = "postgres", feature = "sqlite"))]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Missing parent row: {0}")]
    MissingParent(String),

    #[error("Unknown storage type: {0}")]
    UnknownBackend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type (postgres, sqlite).
    #[serde(rename = "type")]
    pub storage_type: String,
    /// Connection URL.
    pub url: String,
    /// Connection pool size. Also bounds concurrent form imports.
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: "postgres".to_string(),
            url: "postgres://localhost/forms".to_string(),
            max_connections: 10,
        }
    }
}

/// Form row to insert.
#[derive(Debug, Clone)]
pub struct NewForm {
    pub skjemanummer: String,
    pub path: String,
    pub created_by: String,
}

/// Content of one form revision. Components and properties are opaque JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct FormContent {
    pub title: String,
    pub components: String,
    pub properties: String,
    pub created_by: String,
}

impl FormContent {
    /// Whether the stored payload equals `other`, ignoring creation metadata.
    pub fn same_payload(&self, other: &FormContent) -> bool {
        self.title == other.title
            && self.components == other.components
            && self.properties == other.properties
    }
}

/// A stored form revision.
#[derive(Debug, Clone)]
pub struct FormRevisionRecord {
    pub id: RowId,
    pub form_id: RowId,
    pub revision: i64,
    pub content: FormContent,
}

/// Text values of a translation revision.
///
/// `nb` is the default-language slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationValues {
    pub nb: Option<String>,
    pub nn: Option<String>,
    pub en: Option<String>,
}

/// Latest published translation snapshot of a form.
#[derive(Debug, Clone)]
pub struct FormSnapshotRecord {
    pub id: RowId,
    pub published_at: Option<String>,
    /// Referenced translation revision ids, ascending.
    pub revision_ids: Vec<RowId>,
}

/// Publication record to insert.
#[derive(Debug, Clone)]
pub struct NewPublication {
    pub form_revision_id: RowId,
    pub form_snapshot_id: RowId,
    pub global_snapshot_id: Option<RowId>,
    pub languages: Vec<String>,
    pub published_at: Option<String>,
    pub created_by: String,
}

/// A stored publication record.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicationRecord {
    pub id: RowId,
    pub form_revision_id: RowId,
    pub form_snapshot_id: RowId,
    pub global_snapshot_id: Option<RowId>,
    pub languages: Vec<String>,
}

impl PublicationRecord {
    /// Whether inserting `candidate` would record nothing new.
    pub fn matches(&self, candidate: &NewPublication) -> bool {
        self.form_revision_id == candidate.form_revision_id
            && self.form_snapshot_id == candidate.form_snapshot_id
            && self.global_snapshot_id == candidate.global_snapshot_id
            && self.languages == candidate.languages
    }
}

/// Connection-level store handle.
#[async_trait]
pub trait PublicationStore: Send + Sync {
    /// Create tables and indexes if they don't exist.
    async fn init_schema(&self) -> Result<()>;

    /// Open a unit of work on one pooled connection.
    async fn begin(&self) -> Result<Box<dyn ImportTx>>;
}

/// One atomic unit of work.
///
/// Nothing is visible to other units until [`ImportTx::commit`]. Dropping a
/// transaction without commit or rollback is a bug; callers always close it.
#[async_trait]
pub trait ImportTx: Send {
    /// Id of the form with this path.
    async fn find_form(&mut self, path: &str) -> Result<Option<RowId>>;

    async fn insert_form(&mut self, form: &NewForm) -> Result<RowId>;

    /// Highest-numbered revision of a form.
    async fn latest_form_revision(&mut self, form_id: RowId) -> Result<Option<FormRevisionRecord>>;

    async fn insert_form_revision(
        &mut self,
        form_id: RowId,
        revision: i64,
        content: &FormContent,
    ) -> Result<RowId>;

    /// Latest revision id of the translation `(form_id, key)`.
    async fn find_form_translation(&mut self, form_id: RowId, key: &str) -> Result<Option<RowId>>;

    /// Insert translation `(form_id, key)` with revision 1. Returns the revision id.
    async fn insert_form_translation(
        &mut self,
        form_id: RowId,
        key: &str,
        values: &TranslationValues,
        created_by: &str,
    ) -> Result<RowId>;

    /// Latest revision id of the global translation `key`.
    async fn find_global_translation(&mut self, key: &str) -> Result<Option<RowId>>;

    /// Insert global translation `key` with revision 1. Returns the revision id.
    async fn insert_global_translation(
        &mut self,
        key: &str,
        tag: &str,
        values: &TranslationValues,
        created_by: &str,
    ) -> Result<RowId>;

    /// Most recently committed global snapshot.
    async fn latest_global_snapshot(&mut self) -> Result<Option<RowId>>;

    async fn insert_global_snapshot(&mut self, revision_ids: &[RowId], created_by: &str)
        -> Result<RowId>;

    /// Most recent translation snapshot of a form.
    async fn latest_form_snapshot(&mut self, form_id: RowId) -> Result<Option<FormSnapshotRecord>>;

    async fn insert_form_snapshot(
        &mut self,
        form_id: RowId,
        revision_ids: &[RowId],
        published_at: Option<&str>,
        created_by: &str,
    ) -> Result<RowId>;

    /// Most recent publication record of a form, across its revisions.
    async fn latest_publication(&mut self, form_id: RowId) -> Result<Option<PublicationRecord>>;

    async fn insert_publication(&mut self, publication: &NewPublication) -> Result<RowId>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Initialize storage based on configuration.
///
/// Connects the pool and creates the schema.
pub async fn init_storage(config: &StorageConfig) -> Result<Arc<dyn PublicationStore>> {
    info!(
        storage_type = %config.storage_type,
        max_connections = config.max_connections,
        "Initializing storage"
    );

    let store: Arc<dyn PublicationStore> = match config.storage_type.as_str() {
        #[cfg(feature = "postgres")]
        "postgres" => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(&config.url)
                .await?;
            Arc::new(sql::postgres::PostgresPublicationStore::new(pool))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let pool = sql::sqlite::connect(&config.url, config.max_connections).await?;
            Arc::new(sql::sqlite::SqlitePublicationStore::new(pool))
        }
        other => {
            error!("Unknown storage type: {}", other);
            return Err(StorageError::UnknownBackend(other.to_string()));
        }
    };

    store.init_schema().await?;
    Ok(store)
}
