//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building,
//! plus the DDL shared by the SQL backends.

use sea_query::Iden;

/// Forms, unique by path.
#[derive(Iden)]
pub enum Form {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "skjemanummer"]
    Skjemanummer,
    #[iden = "path"]
    Path,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
}

/// Numbered content revisions of a form.
#[derive(Iden)]
pub enum FormRevision {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "form_id"]
    FormId,
    #[iden = "revision"]
    Revision,
    #[iden = "title"]
    Title,
    /// Opaque JSON.
    #[iden = "components"]
    Components,
    /// Opaque JSON.
    #[iden = "properties"]
    Properties,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
}

/// Form translations, unique by (form_id, key).
#[derive(Iden)]
pub enum FormTranslation {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "form_id"]
    FormId,
    #[iden = "key"]
    Key,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
}

#[derive(Iden)]
pub enum FormTranslationRevision {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "form_translation_id"]
    FormTranslationId,
    #[iden = "revision"]
    Revision,
    #[iden = "nb"]
    Nb,
    #[iden = "nn"]
    Nn,
    #[iden = "en"]
    En,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
}

/// Global translations, unique by key.
#[derive(Iden)]
pub enum GlobalTranslation {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "key"]
    Key,
    #[iden = "tag"]
    Tag,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
}

#[derive(Iden)]
pub enum GlobalTranslationRevision {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "global_translation_id"]
    GlobalTranslationId,
    #[iden = "revision"]
    Revision,
    #[iden = "nb"]
    Nb,
    #[iden = "nn"]
    Nn,
    #[iden = "en"]
    En,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
}

/// Published translation snapshot of one form.
#[derive(Iden)]
pub enum PublishedFormTranslation {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "form_id"]
    FormId,
    #[iden = "published_at"]
    PublishedAt,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
}

/// Snapshot membership of form translation revisions.
#[derive(Iden)]
pub enum PublishedFormTranslationRevision {
    Table,
    #[iden = "published_form_translation_id"]
    PublishedFormTranslationId,
    #[iden = "form_translation_revision_id"]
    FormTranslationRevisionId,
}

/// Published snapshot of the global translations.
#[derive(Iden)]
pub enum PublishedGlobalTranslation {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
}

/// Snapshot membership of global translation revisions.
#[derive(Iden)]
pub enum PublishedGlobalTranslationRevision {
    Table,
    #[iden = "published_global_translation_id"]
    PublishedGlobalTranslationId,
    #[iden = "global_translation_revision_id"]
    GlobalTranslationRevisionId,
}

/// Publication records: form revision + form snapshot + global snapshot + languages.
#[derive(Iden)]
pub enum FormPublication {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "form_revision_id"]
    FormRevisionId,
    #[iden = "published_form_translation_id"]
    PublishedFormTranslationId,
    #[iden = "published_global_translation_id"]
    PublishedGlobalTranslationId,
    /// JSON array of language codes, in publication order.
    #[iden = "languages"]
    Languages,
    #[iden = "published_at"]
    PublishedAt,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
}

/// Column type placeholders substituted per backend.
const ID: &str = "{id}";
const INT: &str = "{int}";

const CREATE_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS form (
    id {id},
    skjemanummer TEXT NOT NULL,
    path TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL
)"#,
    r#"CREATE TABLE IF NOT EXISTS form_revision (
    id {id},
    form_id {int} NOT NULL REFERENCES form(id),
    revision {int} NOT NULL,
    title TEXT NOT NULL,
    components TEXT NOT NULL,
    properties TEXT NOT NULL,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    UNIQUE (form_id, revision)
)"#,
    r#"CREATE TABLE IF NOT EXISTS form_translation (
    id {id},
    form_id {int} NOT NULL REFERENCES form(id),
    "key" TEXT NOT NULL,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    UNIQUE (form_id, "key")
)"#,
    r#"CREATE TABLE IF NOT EXISTS form_translation_revision (
    id {id},
    form_translation_id {int} NOT NULL REFERENCES form_translation(id),
    revision {int} NOT NULL,
    nb TEXT,
    nn TEXT,
    en TEXT,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    UNIQUE (form_translation_id, revision)
)"#,
    r#"CREATE TABLE IF NOT EXISTS global_translation (
    id {id},
    "key" TEXT NOT NULL UNIQUE,
    tag TEXT NOT NULL,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL
)"#,
    r#"CREATE TABLE IF NOT EXISTS global_translation_revision (
    id {id},
    global_translation_id {int} NOT NULL REFERENCES global_translation(id),
    revision {int} NOT NULL,
    nb TEXT,
    nn TEXT,
    en TEXT,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    UNIQUE (global_translation_id, revision)
)"#,
    r#"CREATE TABLE IF NOT EXISTS published_form_translation (
    id {id},
    form_id {int} NOT NULL REFERENCES form(id),
    published_at TEXT,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL
)"#,
    r#"CREATE TABLE IF NOT EXISTS published_form_translation_revision (
    published_form_translation_id {int} NOT NULL REFERENCES published_form_translation(id),
    form_translation_revision_id {int} NOT NULL REFERENCES form_translation_revision(id),
    PRIMARY KEY (published_form_translation_id, form_translation_revision_id)
)"#,
    r#"CREATE TABLE IF NOT EXISTS published_global_translation (
    id {id},
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL
)"#,
    r#"CREATE TABLE IF NOT EXISTS published_global_translation_revision (
    published_global_translation_id {int} NOT NULL REFERENCES published_global_translation(id),
    global_translation_revision_id {int} NOT NULL REFERENCES global_translation_revision(id),
    PRIMARY KEY (published_global_translation_id, global_translation_revision_id)
)"#,
    r#"CREATE TABLE IF NOT EXISTS form_publication (
    id {id},
    form_revision_id {int} NOT NULL REFERENCES form_revision(id),
    published_form_translation_id {int} NOT NULL REFERENCES published_form_translation(id),
    published_global_translation_id {int} REFERENCES published_global_translation(id),
    languages TEXT NOT NULL,
    published_at TEXT,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_form_revision_form ON form_revision(form_id)",
    "CREATE INDEX IF NOT EXISTS idx_form_translation_revision_parent ON form_translation_revision(form_translation_id)",
    "CREATE INDEX IF NOT EXISTS idx_global_translation_revision_parent ON global_translation_revision(global_translation_id)",
    "CREATE INDEX IF NOT EXISTS idx_published_form_translation_form ON published_form_translation(form_id)",
    "CREATE INDEX IF NOT EXISTS idx_form_publication_revision ON form_publication(form_revision_id)",
];

/// DDL statements with backend column types substituted.
///
/// `id_type` is the auto-increment primary key declaration, `int_type` the
/// 64-bit integer type used for revision numbers and foreign keys.
pub fn create_statements(id_type: &str, int_type: &str) -> Vec<String> {
    CREATE_STATEMENTS
        .iter()
        .map(|stmt| stmt.replace(ID, id_type).replace(INT, int_type))
        .collect()
}
