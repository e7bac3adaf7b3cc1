//! Publication snapshots.
//!
//! A snapshot is an immutable set of translation revisions. Snapshots are
//! reused whenever nothing changed, so repeated runs over the same input
//! leave the publication tables untouched.

use serde::Serialize;
use tracing::{debug, info};

use crate::storage::{ImportTx, NewPublication, Result, RowId};

/// Whether a snapshot was created by this unit of work or reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum SnapshotOutcome {
    Created(RowId),
    Reused(RowId),
}

impl SnapshotOutcome {
    pub fn id(&self) -> RowId {
        match self {
            SnapshotOutcome::Created(id) | SnapshotOutcome::Reused(id) => *id,
        }
    }
}

/// Build the global snapshot, or reuse the latest one.
///
/// A new snapshot is only written when the run created at least one global
/// translation. Returns `None` when nothing was created and no snapshot
/// exists yet.
pub async fn global_snapshot(
    tx: &mut dyn ImportTx,
    revision_ids: &[RowId],
    created_new: bool,
    created_by: &str,
) -> Result<Option<SnapshotOutcome>> {
    if created_new {
        let id = tx.insert_global_snapshot(revision_ids, created_by).await?;
        info!(snapshot_id = id, revisions = revision_ids.len(), "Created global snapshot");
        return Ok(Some(SnapshotOutcome::Created(id)));
    }

    let latest = tx.latest_global_snapshot().await?;
    debug!(snapshot_id = ?latest, "Reusing global snapshot");
    Ok(latest.map(SnapshotOutcome::Reused))
}

/// Build a form's translation snapshot, or reuse the latest one when it has
/// the same revision set and publish timestamp.
pub async fn form_snapshot(
    tx: &mut dyn ImportTx,
    form_id: RowId,
    revision_ids: &[RowId],
    published_at: Option<&str>,
    created_by: &str,
) -> Result<SnapshotOutcome> {
    let mut ids = revision_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    if let Some(latest) = tx.latest_form_snapshot(form_id).await? {
        if latest.revision_ids == ids && latest.published_at.as_deref() == published_at {
            return Ok(SnapshotOutcome::Reused(latest.id));
        }
    }

    let id = tx
        .insert_form_snapshot(form_id, &ids, published_at, created_by)
        .await?;
    Ok(SnapshotOutcome::Created(id))
}

/// Inputs for publishing one form revision.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub form_id: RowId,
    pub form_revision_id: RowId,
    pub translation_revision_ids: &'a [RowId],
    pub global_snapshot_id: Option<RowId>,
    pub languages: Vec<String>,
    pub published_at: Option<&'a str>,
    pub published_by: &'a str,
}

/// Result of publishing a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PublicationOutcome {
    #[serde(rename_all = "camelCase")]
    Created {
        publication_id: RowId,
        form_snapshot: SnapshotOutcome,
    },
    #[serde(rename_all = "camelCase")]
    Unchanged { publication_id: RowId },
}

/// Record a publication linking a form revision to its translation snapshot
/// and the run's global snapshot.
pub async fn publish_form(
    tx: &mut dyn ImportTx,
    request: PublishRequest<'_>,
) -> Result<PublicationOutcome> {
    let form_snapshot = form_snapshot(
        tx,
        request.form_id,
        request.translation_revision_ids,
        request.published_at,
        request.published_by,
    )
    .await?;

    let candidate = NewPublication {
        form_revision_id: request.form_revision_id,
        form_snapshot_id: form_snapshot.id(),
        global_snapshot_id: request.global_snapshot_id,
        languages: request.languages,
        published_at: request.published_at.map(str::to_string),
        created_by: request.published_by.to_string(),
    };

    if let Some(latest) = tx.latest_publication(request.form_id).await? {
        if latest.matches(&candidate) {
            debug!(publication_id = latest.id, "Publication unchanged");
            return Ok(PublicationOutcome::Unchanged {
                publication_id: latest.id,
            });
        }
    }

    let publication_id = tx.insert_publication(&candidate).await?;
    info!(
        publication_id,
        form_revision_id = candidate.form_revision_id,
        form_snapshot_id = candidate.form_snapshot_id,
        languages = ?candidate.languages,
        "Published form"
    );
    Ok(PublicationOutcome::Created {
        publication_id,
        form_snapshot,
    })
}
