//! Type-erased worker view
//!
//! A [`crate::Pool`] holds workers with different job types side by side.
//! [`AnyWorker`] is the object-safe subset of [`Worker`] the pool needs; it is
//! implemented for every worker whose job can be cloned for fan-out.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::Worker;
use crate::error::{Result, WorkerError};

/// Shared, type-erased worker
pub type WorkerHandle = Arc<dyn AnyWorker>;

/// Object-safe worker capabilities used by the pool
#[async_trait]
pub trait AnyWorker: Send + Sync + 'static {
    /// Worker identifier
    fn worker_id(&self) -> &str;

    /// Type name of the jobs this worker accepts
    fn job_type(&self) -> &'static str;

    /// True while the processing loop accepts jobs
    fn is_live(&self) -> bool;

    /// Stop the worker
    fn shutdown(&self);

    /// Hand over a clone of `job` if it is this worker's job type
    ///
    /// `job_type` names the concrete type behind `job` for error reporting.
    async fn deliver(&self, job: &(dyn Any + Send + Sync), job_type: &'static str) -> Result<()>;

    /// Upcast for downcasting back to the concrete worker
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[async_trait]
impl<W> AnyWorker for W
where
    W: Worker,
    W::Job: Clone + Sync,
{
    fn worker_id(&self) -> &str {
        self.id()
    }

    fn job_type(&self) -> &'static str {
        type_name::<W::Job>()
    }

    fn is_live(&self) -> bool {
        self.is_running()
    }

    fn shutdown(&self) {
        self.stop();
    }

    async fn deliver(&self, job: &(dyn Any + Send + Sync), job_type: &'static str) -> Result<()> {
        let Some(job) = job.downcast_ref::<W::Job>() else {
            return Err(WorkerError::BroadcastTypeMismatch {
                id: self.id().to_string(),
                expected: type_name::<W::Job>(),
                actual: job_type,
            });
        };
        self.add_job(job.clone()).await
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl fmt::Debug for dyn AnyWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.worker_id())
            .field("job_type", &self.job_type())
            .field("live", &self.is_live())
            .finish()
    }
}

/// True if both handles point at the same worker
pub(crate) fn same_worker(a: &WorkerHandle, b: &WorkerHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
