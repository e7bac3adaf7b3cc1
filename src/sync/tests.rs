//! Engine tests against SQLite in-memory and the mock content source.

use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::*;
use crate::config::{ImportConfig, ReimportPolicy};
use crate::source::{MockSource, SourceForm, TranslationSubmission};
use crate::storage::sql::sqlite::SqlitePublicationStore;
use crate::storage::PublicationStore;

async fn test_store() -> Arc<SqlitePublicationStore> {
    let opts = SqliteConnectOptions::new()
        .filename(":memory:")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .expect("failed to create in-memory pool");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .expect("failed to enable foreign keys");

    let store = Arc::new(SqlitePublicationStore::new(pool));
    store.init_schema().await.expect("failed to init schema");
    store
}

async fn count(store: &SqlitePublicationStore, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(store.pool())
        .await
        .expect("count failed")
}

fn make_form(path: &str, properties: Value) -> SourceForm {
    SourceForm {
        id: format!("id-{}", path),
        path: path.to_string(),
        title: format!("Skjema {}", path),
        components: json!([{ "key": "fornavn", "type": "textfield" }]),
        properties: Some(properties),
    }
}

fn published(skjemanummer: &str) -> Value {
    json!({
        "skjemanummer": skjemanummer,
        "published": "2024-03-01T10:00:00.000Z",
        "publishedBy": "saksbehandler",
        "publishedLanguages": ["en"],
        "modifiedBy": "redaktør",
    })
}

fn draft(skjemanummer: &str) -> Value {
    json!({ "skjemanummer": skjemanummer })
}

fn form_translations(path: &str) -> Vec<TranslationSubmission> {
    vec![
        TranslationSubmission::new("en", &[("Fornavn", "First name"), ("Etternavn", "Last name")])
            .with_form(path),
        TranslationSubmission::new("nn-NO", &[("Fornavn", "Førenamn")]).with_form(path),
    ]
}

fn global_translations() -> Vec<TranslationSubmission> {
    vec![
        TranslationSubmission::new("en", &[("Neste", "Next"), ("Forrige", "Previous")])
            .with_tag("skjematekster"),
        TranslationSubmission::new("en", &[("required", "{{field}} is required")])
            .with_tag("validering"),
    ]
}

async fn source_with(forms: Vec<SourceForm>) -> Arc<MockSource> {
    let source = Arc::new(MockSource::new());
    for form in forms {
        let path = form.path.clone();
        source.add_form(form).await;
        source.set_translations(&path, form_translations(&path)).await;
    }
    source.set_global_translations(global_translations()).await;
    source
}

fn importer(
    store: &Arc<SqlitePublicationStore>,
    source: &Arc<MockSource>,
    config: ImportConfig,
) -> Importer {
    Importer::new(store.clone(), source.clone(), config).with_concurrency(4)
}

#[tokio::test]
async fn test_import_published_form() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", published("NAV 10-07.40"))]).await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert!(summary.aborted.is_none());
    assert_eq!(summary.success_inserts_skjemanummer, ["NAV 10-07.40"]);
    assert_eq!(count(&store, "form").await, 1);
    assert_eq!(count(&store, "form_revision").await, 1);
    assert_eq!(count(&store, "form_translation").await, 2);
    assert_eq!(count(&store, "form_translation_revision").await, 2);
    assert_eq!(count(&store, "published_form_translation").await, 1);
    assert_eq!(count(&store, "published_form_translation_revision").await, 2);
    assert_eq!(count(&store, "form_publication").await, 1);

    let outcome = summary.form("nav100740").unwrap();
    assert!(outcome.form_created);
    assert_eq!(outcome.revision_created, Some(1));
    assert_eq!(outcome.translations_created, 2);
    assert!(matches!(outcome.publication, Some(PublicationOutcome::Created { .. })));

    let languages: String = sqlx::query_scalar("SELECT languages FROM form_publication")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(languages, r#"["en","nb"]"#);

    let (created_by, nb): (String, Option<String>) = sqlx::query_as(
        "SELECT created_by, nb FROM form_translation_revision ORDER BY id LIMIT 1",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(created_by, "IMPORT");
    assert_eq!(nb.as_deref(), Some("Fornavn"));
}

#[tokio::test]
async fn test_revision_and_publication_actors() {
    let store = test_store().await;
    let mut properties = published("NAV 10-07.40");
    properties["modifiedBy"] = Value::Null;
    properties["publishedBy"] = Value::Null;
    let source = source_with(vec![make_form("nav100740", properties)]).await;

    importer(&store, &source, ImportConfig::default()).run().await;

    let revision_by: String = sqlx::query_scalar("SELECT created_by FROM form_revision")
        .fetch_one(store.pool())
        .await
        .unwrap();
    let publication_by: String = sqlx::query_scalar("SELECT created_by FROM form_publication")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(revision_by, "ukjent");
    assert_eq!(publication_by, "IMPORT");
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let store = test_store().await;
    let source = source_with(vec![
        make_form("nav100740", published("NAV 10-07.40")),
        make_form("nav080701", draft("NAV 08-07.01")),
    ])
    .await;

    importer(&store, &source, ImportConfig::default()).run().await;
    let tables = [
        "form",
        "form_revision",
        "form_translation",
        "form_translation_revision",
        "global_translation",
        "global_translation_revision",
        "published_global_translation",
        "published_global_translation_revision",
        "published_form_translation",
        "published_form_translation_revision",
        "form_publication",
    ];
    let mut before = Vec::new();
    for table in tables {
        before.push(count(&store, table).await);
    }

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    let mut after = Vec::new();
    for table in tables {
        after.push(count(&store, table).await);
    }
    assert_eq!(before, after);

    let outcome = summary.form("nav100740").unwrap();
    assert!(!outcome.form_created);
    assert_eq!(outcome.translations_created, 0);
    assert_eq!(outcome.translations_existing, 2);
    assert!(matches!(outcome.publication, Some(PublicationOutcome::Unchanged { .. })));
    assert!(matches!(
        summary.global.as_ref().unwrap().snapshot,
        Some(SnapshotOutcome::Reused(_))
    ));
}

#[tokio::test]
async fn test_value_too_long_skips_key_only() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", published("NAV 10-07.40"))]).await;
    let long = "x".repeat(5121);
    source
        .set_translations(
            "nav100740",
            vec![TranslationSubmission::new("en", &[("Ja", "Yes"), ("Lang", long.as_str())])],
        )
        .await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert_eq!(count(&store, "form_translation").await, 1);
    assert_eq!(summary.success_inserts_skjemanummer, ["NAV 10-07.40"]);
    assert_eq!(summary.counts().value_too_long, 1);
    assert_eq!(summary.max_translation_length, 5121);
    let entry = &summary.forms_with_too_long_translation[0];
    assert_eq!(entry.skjemanummer, "NAV 10-07.40");
    assert_eq!(entry.value.too_long_key, "Lang");
    assert_eq!(entry.value.en_length, Some(5121));
}

#[tokio::test]
async fn test_value_at_ceiling_is_stored() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", draft("NAV 10-07.40"))]).await;
    let exact = "x".repeat(5120);
    source
        .set_translations(
            "nav100740",
            vec![TranslationSubmission::new("en", &[("Lang", exact.as_str())])],
        )
        .await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert_eq!(count(&store, "form_translation").await, 1);
    assert_eq!(summary.counts().value_too_long, 0);
}

#[tokio::test]
async fn test_skjemanummer_length_boundary() {
    let store = test_store().await;
    let at_limit = "A".repeat(24);
    let over_limit = "B".repeat(25);
    let source = source_with(vec![
        make_form("ok", published(&at_limit)),
        make_form("too-long", published(&over_limit)),
    ])
    .await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert_eq!(summary.success_inserts_skjemanummer, [at_limit]);
    assert_eq!(summary.too_long_skjemanummer, [over_limit]);
    assert_eq!(summary.counts().skipped_too_long, 1);
    assert_eq!(count(&store, "form").await, 1);
    assert_eq!(
        summary.form("too-long").unwrap().status,
        FormStatus::SkjemanummerTooLong
    );
}

#[tokio::test]
async fn test_validation_tag_has_no_default_text() {
    let store = test_store().await;
    let source = source_with(vec![]).await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT g.\"key\", g.tag, r.nb FROM global_translation g \
         JOIN global_translation_revision r ON r.global_translation_id = g.id \
         ORDER BY g.id",
    )
    .fetch_all(store.pool())
    .await
    .unwrap();

    assert_eq!(rows.len(), 3);
    for (key, tag, nb) in rows {
        if tag == VALIDATION_TAG {
            assert_eq!(nb, None, "validation key {} should have no default text", key);
        } else {
            assert_eq!(nb.as_deref(), Some(key.as_str()));
        }
    }

    let global = summary.global.unwrap();
    assert_eq!(global.tags, ["skjematekster", "validering"]);
    assert_eq!(global.created, 3);
    assert!(matches!(global.snapshot, Some(SnapshotOutcome::Created(_))));
    assert_eq!(count(&store, "published_global_translation_revision").await, 3);
}

#[tokio::test]
async fn test_publication_gating() {
    let store = test_store().await;
    let mut unpublished_later = published("NAV 01");
    unpublished_later["unpublished"] = json!("2024-04-01T10:00:00.000Z");
    let mut unpublished_earlier = published("NAV 02");
    unpublished_earlier["unpublished"] = json!("2024-02-01T10:00:00.000Z");
    let source = source_with(vec![
        make_form("later", unpublished_later),
        make_form("earlier", unpublished_earlier),
        make_form("draft", draft("NAV 03")),
        make_form("live", published("NAV 04")),
    ])
    .await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert_eq!(summary.counts().succeeded, 4);
    assert_eq!(summary.published_forms, 1);
    assert!(summary.form("later").unwrap().publication.is_none());
    // Any unpublish timestamp withdraws the form, even one before the publish.
    assert!(summary.form("earlier").unwrap().publication.is_none());
    assert!(summary.form("draft").unwrap().publication.is_none());
    assert!(summary.form("live").unwrap().publication.is_some());
    assert_eq!(count(&store, "form_publication").await, 1);
    assert_eq!(count(&store, "published_form_translation").await, 1);
    assert_eq!(count(&store, "form_translation").await, 8);
}

#[tokio::test]
async fn test_publication_links_run_global_snapshot() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", published("NAV 10-07.40"))]).await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    let global_id: Option<i64> =
        sqlx::query_scalar("SELECT published_global_translation_id FROM form_publication")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(global_id, summary.global.unwrap().snapshot_id());
    assert!(global_id.is_some());
}

#[tokio::test]
async fn test_publication_without_global_snapshot() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", published("NAV 10-07.40"))]).await;
    source.set_global_translations(vec![]).await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert_eq!(summary.global.as_ref().unwrap().snapshot, None);
    let global_id: Option<i64> =
        sqlx::query_scalar("SELECT published_global_translation_id FROM form_publication")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(global_id, None);
}

#[tokio::test]
async fn test_form_failure_is_isolated() {
    let store = test_store().await;
    let source = source_with(vec![
        make_form("good", published("NAV 01")),
        make_form("bad", published("NAV 02")),
    ])
    .await;
    source.set_fail_on_translations("bad").await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert!(summary.aborted.is_none());
    assert_eq!(summary.success_inserts_skjemanummer, ["NAV 01"]);
    assert_eq!(summary.failed_inserts_skjemanummer, ["NAV 02"]);
    assert!(summary.form("bad").unwrap().error.is_some());

    // The failed form's row and revision were rolled back with it.
    let paths: Vec<String> = sqlx::query_scalar("SELECT path FROM form")
        .fetch_all(store.pool())
        .await
        .unwrap();
    assert_eq!(paths, ["good"]);
    assert_eq!(count(&store, "form_revision").await, 1);
}

#[tokio::test]
async fn test_global_snapshot_only_when_created() {
    let store = test_store().await;
    let source = source_with(vec![]).await;

    importer(&store, &source, ImportConfig::default()).run().await;
    importer(&store, &source, ImportConfig::default()).run().await;
    assert_eq!(count(&store, "published_global_translation").await, 1);

    let mut globals = global_translations();
    globals.push(TranslationSubmission::new("en", &[("Avbryt", "Cancel")]).with_tag("skjematekster"));
    source.set_global_translations(globals).await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    let global = summary.global.unwrap();
    assert_eq!(global.created, 1);
    assert_eq!(global.existing, 3);
    assert_eq!(count(&store, "published_global_translation").await, 2);
    // New snapshot covers every current key.
    let latest_members: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM published_global_translation_revision \
         WHERE published_global_translation_id = (SELECT MAX(id) FROM published_global_translation)",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(latest_members, 4);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", published("NAV 10-07.40"))]).await;
    let config = ImportConfig {
        dry_run: true,
        ..Default::default()
    };

    let summary = importer(&store, &source, config).run().await;

    assert!(summary.dry_run);
    assert_eq!(summary.success_inserts_skjemanummer, ["NAV 10-07.40"]);
    for table in [
        "form",
        "form_revision",
        "form_translation",
        "global_translation",
        "published_global_translation",
        "published_form_translation",
        "form_publication",
    ] {
        assert_eq!(count(&store, table).await, 0, "{} should be empty", table);
    }

    let outcome = summary.form("nav100740").unwrap();
    assert_eq!(outcome.translations_planned, 2);
    assert!(outcome.publication.is_none());
    assert_eq!(summary.global.unwrap().planned, 3);
}

#[tokio::test]
async fn test_keep_existing_ignores_changed_content() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", published("NAV 10-07.40"))]).await;
    importer(&store, &source, ImportConfig::default()).run().await;

    let mut changed = make_form("nav100740", published("NAV 10-07.40"));
    changed.title = "Nytt navn".to_string();
    let source = source_with(vec![changed]).await;
    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert_eq!(count(&store, "form_revision").await, 1);
    assert_eq!(summary.form("nav100740").unwrap().revision_created, None);
}

#[tokio::test]
async fn test_append_revision_on_changed_content() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", published("NAV 10-07.40"))]).await;
    let config = ImportConfig {
        reimport: ReimportPolicy::AppendRevision,
        ..Default::default()
    };
    importer(&store, &source, config.clone()).run().await;

    // Unchanged payload appends nothing.
    importer(&store, &source, config.clone()).run().await;
    assert_eq!(count(&store, "form_revision").await, 1);

    let mut changed = make_form("nav100740", published("NAV 10-07.40"));
    changed.title = "Nytt navn".to_string();
    let source = source_with(vec![changed]).await;
    let summary = importer(&store, &source, config).run().await;

    let outcome = summary.form("nav100740").unwrap();
    assert_eq!(outcome.revision_created, Some(2));
    assert!(matches!(outcome.publication, Some(PublicationOutcome::Created { .. })));
    assert_eq!(count(&store, "form_revision").await, 2);
    assert_eq!(count(&store, "form_publication").await, 2);
    // Translations are shared by both revisions.
    assert_eq!(count(&store, "form_translation").await, 2);
}

#[tokio::test]
async fn test_forms_fetch_failure_aborts_run() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", published("NAV 10-07.40"))]).await;
    source.set_fail_on_forms(true).await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert!(summary.aborted.is_some());
    assert!(summary.global.is_none());
    assert_eq!(count(&store, "global_translation").await, 0);
}

#[tokio::test]
async fn test_global_failure_aborts_before_forms() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", published("NAV 10-07.40"))]).await;
    source.set_fail_on_global(true).await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert!(summary.aborted.is_some());
    assert!(summary.success_inserts_skjemanummer.is_empty());
    assert_eq!(count(&store, "form").await, 0);
}

#[tokio::test]
async fn test_test_forms_and_missing_properties_excluded() {
    let store = test_store().await;
    let mut test_form = published("NAV 99");
    test_form["isTestForm"] = json!(true);
    let mut no_properties = make_form("bare", draft("NAV 98"));
    no_properties.properties = None;
    let source = source_with(vec![
        make_form("test", test_form),
        no_properties,
        make_form("real", draft("NAV 01")),
    ])
    .await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert_eq!(summary.excluded_test_forms, 1);
    assert_eq!(summary.skipped_without_properties, 1);
    assert_eq!(summary.success_inserts_skjemanummer, ["NAV 01"]);
    assert_eq!(count(&store, "form").await, 1);
}

#[tokio::test]
async fn test_more_than_two_translations_reported() {
    let store = test_store().await;
    let source = source_with(vec![make_form("nav100740", draft("NAV 10-07.40"))]).await;
    source
        .set_translations(
            "nav100740",
            vec![
                TranslationSubmission::new("en", &[("Ja", "Yes")]),
                TranslationSubmission::new("nn-NO", &[("Ja", "Ja")]),
                TranslationSubmission::new("en", &[("Ja", "Yeah")]),
            ],
        )
        .await;

    let summary = importer(&store, &source, ImportConfig::default()).run().await;

    assert_eq!(summary.counts().multi_translation, 1);
    assert_eq!(summary.more_than_two_translations[0].number_of_translations, 3);
    let outcome = summary.form("nav100740").unwrap();
    assert_eq!(outcome.duplicate_languages, ["en"]);

    let en: Option<String> = sqlx::query_scalar("SELECT en FROM form_translation_revision")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(en.as_deref(), Some("Yeah"));
}
