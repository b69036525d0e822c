use std::collections::HashMap;
use std::sync::Arc;

use snap_core::{ItemId, RunTally};
use snap_logging::{snap_error, snap_info, snap_warn, Logger};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

use crate::processor::ItemProcessor;
use crate::ItemPayload;

const DEFAULT_PROGRESS_EVERY: usize = 100;

#[derive(Debug)]
pub struct PoolOutcome {
    pub tally: RunTally<ItemPayload>,
    /// A worker died without reporting (panic or cancellation). It is
    /// recorded as a failure of its item; results of the other workers are
    /// still in `tally`.
    pub aborted: bool,
}

/// Runs an [`ItemProcessor`] over a set of ids with bounded concurrency.
///
/// Items are independent: a failure is recorded and siblings keep going.
pub struct WorkerPool {
    concurrency: usize,
    progress_every: usize,
    log: Logger,
}

impl WorkerPool {
    pub fn new(concurrency: usize, log: Logger) -> Self {
        Self {
            concurrency: concurrency.max(1),
            progress_every: DEFAULT_PROGRESS_EVERY,
            log,
        }
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    pub async fn run(&self, processor: Arc<dyn ItemProcessor>, ids: Vec<ItemId>) -> PoolOutcome {
        let total = ids.len();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();
        let mut owners: HashMap<task::Id, ItemId> = HashMap::with_capacity(total);

        for item_id in ids {
            let processor = Arc::clone(&processor);
            let permits = Arc::clone(&permits);
            let owner = item_id.clone();
            let handle = workers.spawn(async move {
                // The semaphore is never closed, so this always yields a permit.
                let _permit = permits.acquire_owned().await;
                let result = processor.process(&item_id).await;
                (item_id, result)
            });
            owners.insert(handle.id(), owner);
        }

        let mut tally = RunTally::new();
        let mut aborted = false;
        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((task_id, (item_id, Ok(payload)))) => {
                    owners.remove(&task_id);
                    tally.record_success(item_id, payload);
                }
                Ok((task_id, (item_id, Err(err)))) => {
                    owners.remove(&task_id);
                    snap_warn!(self.log, "skipping item {}: {}", item_id, err);
                    tally.record_failure(Some(item_id), err.to_string());
                }
                Err(join_err) => {
                    let item_id = owners.remove(&join_err.id());
                    snap_error!(
                        self.log,
                        "worker for item {} lost: {}",
                        item_id
                            .as_ref()
                            .map_or("<unknown>".to_string(), ItemId::to_string),
                        join_err
                    );
                    let reason = if join_err.is_panic() {
                        "worker panicked".to_string()
                    } else {
                        join_err.to_string()
                    };
                    tally.record_failure(item_id, reason);
                    aborted = true;
                }
            }

            let completed = tally.completed();
            if completed % self.progress_every == 0 && completed != total {
                snap_info!(self.log, "processing... ({}/{})", completed, total);
            }
        }

        snap_info!(
            self.log,
            "processed {} item(s): {} ok, {} failed",
            total,
            tally.success_count(),
            tally.failure_count()
        );
        PoolOutcome { tally, aborted }
    }
}
