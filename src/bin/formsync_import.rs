//! formsync-import: one-shot import of forms and translations
//!
//! Pulls every form, its translations and the global translations from the
//! content source and reconciles them into the revisioned store.
//!
//! ## Architecture
//! ```text
//! [form builder API] --(HTTP/JSON)--> [formsync-import] --(SQL)--> [store]
//!                                            |
//!                                            v
//!                                   stdout: Summary: {json}
//! ```
//!
//! ## Configuration
//! - FORMSYNC_CONFIG: Path to a YAML config file (default: config.yaml)
//! - FORMSYNC__<SECTION>__<KEY>: Override any config value
//! - FORMIO_BASE_URL, MAX_NUMBER_OF_FORMS, DRY_RUN, DATABASE_URL
//! - FORMSYNC_LOG: Log filter (default: info)

use std::sync::Arc;

use tracing::{error, info};

use formsync::config::Config;
use formsync::source::FormioSource;
use formsync::storage::init_storage;
use formsync::sync::{ImportError, Importer, RunSummary};
use formsync::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    info!(
        base_url = %config.source.base_url,
        storage_type = %config.storage.storage_type,
        dry_run = config.import.dry_run,
        "formsync-import started"
    );

    let store = match init_storage(&config.storage).await {
        Ok(store) => store,
        Err(e) => {
            let e = ImportError::Persistence(e);
            error!(error = %e, "Storage unavailable, aborting run");
            let summary = RunSummary::aborted_before_start(config.import.dry_run, &e);
            println!("Summary: {}", serde_json::to_string(&summary)?);
            return Err(e.into());
        }
    };
    let source = Arc::new(FormioSource::new(config.source.clone())?);
    let concurrency = config.storage.max_connections as usize;

    let summary = Importer::new(store, source, config.import)
        .with_concurrency(concurrency)
        .run()
        .await;

    println!("Summary: {}", serde_json::to_string(&summary)?);

    if let Some(reason) = summary.aborted {
        error!(reason = %reason, "Import aborted");
        return Err(reason.into());
    }

    Ok(())
}
