//! Worker pool
//!
//! A concurrency-safe registry of workers keyed by ID. Adding a worker starts
//! it; removing one stops it. Broadcast fans a job out to every registered
//! worker that accepts its type.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, WorkerError};
use crate::worker::{same_worker, Worker, WorkerHandle};

/// Registry of running workers
///
/// At most one worker is registered per ID. The pool has no shutdown of its
/// own; callers stop entries with [`Pool::remove`] or [`Pool::stop_all`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use workers::{DefaultWorker, Pool, Worker};
///
/// let pool = Pool::new();
/// let shutdown = CancellationToken::new();
///
/// let worker = pool.add(&shutdown, Arc::new(DefaultWorker::<String>::new("w1")))?;
/// worker.job_handler(|job| async move { println!("{job}") })?;
///
/// pool.broadcast("job1".to_string()).await?;
/// pool.remove("w1");
/// ```
#[derive(Default)]
pub struct Pool {
    workers: DashMap<String, WorkerHandle>,
}

impl Pool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Register and start a worker
    ///
    /// If the ID is taken, the incumbent is returned inside
    /// [`WorkerError::DuplicateKey`] and `worker` is left unstarted. If
    /// starting fails, the entry is withdrawn and the start error returned.
    #[instrument(skip_all, fields(worker_id = %worker.id()))]
    pub fn add<W>(&self, parent: &CancellationToken, worker: Arc<W>) -> Result<Arc<W>>
    where
        W: Worker,
        W::Job: Clone + Sync,
    {
        let key = worker.id().to_string();
        let handle: WorkerHandle = worker.clone();

        match self.workers.entry(key.clone()) {
            Entry::Occupied(existing) => {
                warn!("Worker ID already registered");
                return Err(WorkerError::DuplicateKey {
                    key,
                    existing: Arc::clone(existing.get()),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&handle));
            }
        }

        if let Err(e) = worker.start(parent) {
            warn!(error = %e, "Worker failed to start; withdrawing from pool");
            self.workers
                .remove_if(&key, |_, current| same_worker(current, &handle));
            return Err(e);
        }

        info!(pool_size = self.workers.len(), "Worker added to pool");
        Ok(worker)
    }

    /// Stop a worker and remove it from the pool
    ///
    /// No-op if the ID is not registered.
    #[instrument(skip(self))]
    pub fn remove(&self, key: &str) {
        let Some(worker) = self.get(key) else {
            debug!("No worker registered under key");
            return;
        };

        // The map guard is released before stopping so a close handler may
        // call back into the pool.
        worker.shutdown();
        self.workers
            .remove_if(key, |_, current| same_worker(current, &worker));

        info!(pool_size = self.workers.len(), "Worker removed from pool");
    }

    /// Hand `job` to every registered worker
    ///
    /// Best effort: an entry that rejects the job (wrong job type, cancelled)
    /// does not stop delivery to the others. The last failure in snapshot
    /// order is returned after the whole pass, so an error does not mean
    /// nobody received the job. Resolves once each worker has taken the job
    /// or failed; handlers are not awaited.
    #[instrument(skip_all, fields(job_type = type_name::<J>()))]
    pub async fn broadcast<J>(&self, job: J) -> Result<()>
    where
        J: Any + Send + Sync,
    {
        let snapshot = self.snapshot();
        let job_type = type_name::<J>();
        let job: &(dyn Any + Send + Sync) = &job;

        let results = join_all(
            snapshot
                .iter()
                .map(|worker| async move { worker.deliver(job, job_type).await }),
        )
        .await;

        let mut last_error = None;
        for (worker, result) in snapshot.iter().zip(results) {
            if let Err(e) = result {
                warn!(worker_id = %worker.worker_id(), error = %e, "Broadcast delivery failed");
                last_error = Some(e);
            }
        }

        debug!(recipients = snapshot.len(), "Broadcast complete");
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Look up a worker by ID
    pub fn get(&self, key: &str) -> Option<WorkerHandle> {
        self.workers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a worker by ID as its concrete type
    pub fn get_as<W: Worker>(&self, key: &str) -> Option<Arc<W>> {
        self.get(key)?.into_any().downcast::<W>().ok()
    }

    /// Check if a worker is registered under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.workers.contains_key(key)
    }

    /// Number of registered workers
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// IDs of all registered workers
    pub fn ids(&self) -> Vec<String> {
        self.workers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Stop and remove every registered worker
    pub fn stop_all(&self) {
        for key in self.ids() {
            self.remove(&key);
        }
    }

    fn snapshot(&self) -> Vec<WorkerHandle> {
        self.workers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("workers", &self.ids()).finish()
    }
}
