use super::merge::{apply, MergeOutcome, MetadataPatch};
use crate::error::{Error, Result};
use convoy_store::{NewRun, Run, RunStatus, RunStore};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Bound on optimistic retries against writers outside this process
const MAX_MERGE_ATTEMPTS: usize = 16;

/// Durable registry of externally-triggered runs.
#[derive(Clone)]
pub struct RunRegistry {
    store: Arc<dyn RunStore>,
    /// One writer per run id within this process
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl RunRegistry {
    /// Create a registry over `store`
    #[must_use]
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self {
            store,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Register a run the platform has just accepted.
    ///
    /// # Errors
    ///
    /// `DuplicateRun` when the id is already known
    #[instrument(skip(self, new_run), fields(run_id = %new_run.run_id))]
    pub async fn create(&self, new_run: NewRun) -> Result<Run> {
        let run = self.store.insert_run(&new_run).await?;
        info!(status = %run.status, context = %run.context_type, "Run registered");
        Ok(run)
    }

    /// Fetch a run
    ///
    /// # Errors
    ///
    /// `RunNotFound` when the id is unknown
    pub async fn get(&self, run_id: &str) -> Result<Run> {
        Ok(self.store.get_run(run_id).await?)
    }

    /// Runs for a context, newest-created first
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn list(
        &self,
        context_type: Option<&str>,
        context_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Run>> {
        Ok(self.store.list_runs(context_type, context_id, limit).await?)
    }

    /// Non-terminal runs, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn list_active(&self, limit: i64) -> Result<Vec<Run>> {
        Ok(self.store.list_active_runs(limit).await?)
    }

    /// Merge a proposed status and a metadata patch into a run.
    ///
    /// A terminal run keeps its status; the patch still applies. Merges for
    /// the same run are serialized in-process, and each write is still a
    /// compare-and-swap on the run's version so another process sharing the
    /// database cannot be overwritten. When nothing would change, nothing is
    /// written.
    ///
    /// # Errors
    ///
    /// `RunNotFound` when the id is unknown, `Persistence` when the store
    /// fails or an outside writer keeps winning the swap
    #[instrument(skip(self, patch))]
    pub async fn merge(
        &self,
        run_id: &str,
        proposed: Option<RunStatus>,
        patch: MetadataPatch,
    ) -> Result<MergeOutcome> {
        let lock = self.locks.entry(run_id.to_string()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            self.merge_locked(run_id, proposed, &patch).await
        };
        drop(lock);
        // Drop the entry once no other merge holds or waits on it
        self.locks.remove_if(run_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn merge_locked(
        &self,
        run_id: &str,
        proposed: Option<RunStatus>,
        patch: &MetadataPatch,
    ) -> Result<MergeOutcome> {
        for attempt in 1..=MAX_MERGE_ATTEMPTS {
            let current = self.store.get_run(run_id).await?;
            let mut outcome = apply(&current, proposed, patch);

            if outcome.status_ignored {
                debug!(
                    status = %current.status,
                    "Ignoring status for terminal run"
                );
            }
            if !outcome.changed {
                return Ok(outcome);
            }

            match self.store.compare_and_swap(&outcome.run).await {
                Ok(stored) => {
                    if outcome.status_changed {
                        info!(
                            from = %outcome.previous_status,
                            to = %stored.status,
                            "Run status changed"
                        );
                    }
                    outcome.run = stored;
                    return Ok(outcome);
                }
                Err(convoy_store::Error::VersionConflict { .. }) => {
                    debug!(attempt, "Run written elsewhere, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(run_id, "Merge lost every swap to an outside writer");
        Err(Error::Persistence(format!(
            "merge for run {run_id} did not settle after {MAX_MERGE_ATTEMPTS} attempts"
        )))
    }

    /// Delete every run. Used by environment reset.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn clear(&self) -> Result<u64> {
        let removed = self.store.clear_runs().await?;
        info!(removed, "Run registry cleared");
        Ok(removed)
    }
}
