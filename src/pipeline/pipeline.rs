// src/pipeline/pipeline.rs

use crate::error::Result;
use crate::models::CacheSnapshot;

use super::reconcile::{IndexReconciler, ReconcileReport};
use super::sync::SyncEngine;

/// What a full sync-then-reconcile run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub snapshot: CacheSnapshot,
    pub reconcile: ReconcileReport,
}

/// Run the full pipeline: sync the cache, then reconcile it into the index.
///
/// The snapshot passed to reconciliation is whatever `sync` returned, so a
/// cache hit still re-converges the index.
pub async fn run_pipeline(
    engine: &SyncEngine,
    reconciler: &IndexReconciler,
    index_name: &str,
) -> Result<PipelineReport> {
    log::info!("[1/2] Sync - fetching from source");
    let snapshot = engine.sync().await?;

    log::info!("[2/2] Reconcile - updating index '{}'", index_name);
    let documents = engine.documents(&snapshot).await?;
    let reconcile = reconciler.reconcile(index_name, &documents).await?;

    if let Some(warning) = reconcile.partial_failure() {
        log::warn!("{}", warning);
    }
    log::info!(
        "Pipeline complete: {} indexed, {} removed",
        reconcile.upserted,
        reconcile.deleted.len()
    );

    Ok(PipelineReport {
        snapshot,
        reconcile,
    })
}
