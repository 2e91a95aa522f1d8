//! Channel-backed worker
//!
//! Jobs travel over a capacity-one channel together with a receipt. The
//! submitter waits on the receipt, so `add_job` behaves like a send on an
//! unbuffered channel: it resolves only when the loop has taken the job, and
//! at most one job is in flight per worker.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{CloseHandler, JobHandler, Worker};
use crate::config::{HandlerPanicPolicy, WorkerConfig};
use crate::error::{Result, WorkerError};
use crate::scheduler;

/// A job paired with the receipt its submitter is waiting on
struct Delivery<J> {
    job: J,
    receipt: oneshot::Sender<()>,
}

enum Lifecycle<J> {
    Detached,
    Started {
        token: CancellationToken,
        jobs: mpsc::Sender<Delivery<J>>,
    },
    Stopped,
}

enum CloseSlot {
    Empty,
    Registered(CloseHandler),
    Fired,
}

/// State shared with the processing loop
struct Shared<J> {
    id: String,
    panic_policy: HandlerPanicPolicy,
    handler: OnceLock<JobHandler<J>>,
    on_close: Mutex<CloseSlot>,
    stop_requested: AtomicBool,
    exited: CancellationToken,
}

impl<J> Shared<J> {
    fn fire_close(&self) {
        let handler = match std::mem::replace(&mut *self.on_close.lock(), CloseSlot::Fired) {
            CloseSlot::Registered(handler) => handler,
            CloseSlot::Empty | CloseSlot::Fired => return,
        };

        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(handler)) {
            error!(
                worker_id = %self.id,
                panic = %panic_message(panic.as_ref()),
                "Close handler panicked"
            );
        }
    }
}

/// Default [`Worker`] implementation
///
/// # Example
///
/// ```ignore
/// use workers::{DefaultWorker, HandlerPanicPolicy, WorkerConfig};
///
/// let worker = DefaultWorker::<u64>::with_config(
///     WorkerConfig::new("billing").with_panic_policy(HandlerPanicPolicy::StopWorker),
/// );
/// ```
pub struct DefaultWorker<J> {
    shared: Arc<Shared<J>>,
    lifecycle: Mutex<Lifecycle<J>>,
    metadata: RwLock<Value>,
}

impl<J: Send + 'static> DefaultWorker<J> {
    /// Create a detached worker with the given ID
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_config(WorkerConfig::new(id))
    }

    /// Create a detached worker with a generated `worker-<uuid>` ID
    pub fn with_generated_id() -> Self {
        Self::with_config(WorkerConfig::default())
    }

    /// Create a detached worker from configuration
    pub fn with_config(config: WorkerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: config.id,
                panic_policy: config.on_handler_panic,
                handler: OnceLock::new(),
                on_close: Mutex::new(CloseSlot::Empty),
                stop_requested: AtomicBool::new(false),
                exited: CancellationToken::new(),
            }),
            lifecycle: Mutex::new(Lifecycle::Detached),
            metadata: RwLock::new(Value::Null),
        }
    }

    /// Snapshot of the live channel
    fn channel(&self) -> Result<(CancellationToken, mpsc::Sender<Delivery<J>>)> {
        match &*self.lifecycle.lock() {
            Lifecycle::Started { token, jobs } => Ok((token.clone(), jobs.clone())),
            Lifecycle::Detached => Err(WorkerError::NotRunning(self.shared.id.clone())),
            Lifecycle::Stopped => Err(WorkerError::Cancelled),
        }
    }
}

#[async_trait]
impl<J: Send + 'static> Worker for DefaultWorker<J> {
    type Job = J;

    fn id(&self) -> &str {
        &self.shared.id
    }

    fn start(&self, parent: &CancellationToken) -> Result<()> {
        if parent.is_cancelled() {
            return Err(WorkerError::InvalidContext);
        }

        let mut lifecycle = self.lifecycle.lock();
        match &*lifecycle {
            Lifecycle::Detached => {}
            Lifecycle::Started { token, .. } if !token.is_cancelled() => {
                return Err(WorkerError::AlreadyRunning(self.shared.id.clone()));
            }
            Lifecycle::Started { .. } | Lifecycle::Stopped => {
                return Err(WorkerError::AlreadyStopped(self.shared.id.clone()));
            }
        }

        let token = parent.child_token();
        let (jobs, receiver) = mpsc::channel(1);

        tokio::spawn(process_jobs(
            Arc::clone(&self.shared),
            token.clone(),
            receiver,
        ));

        *lifecycle = Lifecycle::Started { token, jobs };

        info!(worker_id = %self.shared.id, "Worker started");
        Ok(())
    }

    fn stop(&self) {
        let token = {
            let mut lifecycle = self.lifecycle.lock();
            if matches!(*lifecycle, Lifecycle::Detached) {
                *lifecycle = Lifecycle::Stopped;
            }
            match &*lifecycle {
                Lifecycle::Started { token, .. } => Some(token.clone()),
                Lifecycle::Detached | Lifecycle::Stopped => None,
            }
        };

        self.shared.stop_requested.store(true, Ordering::SeqCst);

        if let Some(token) = token {
            if !token.is_cancelled() {
                info!(worker_id = %self.shared.id, "Stopping worker");
                token.cancel();
            }
        }

        self.shared.fire_close();
    }

    fn token(&self) -> Option<CancellationToken> {
        match &*self.lifecycle.lock() {
            Lifecycle::Started { token, .. } => Some(token.clone()),
            Lifecycle::Detached | Lifecycle::Stopped => None,
        }
    }

    fn is_running(&self) -> bool {
        match &*self.lifecycle.lock() {
            Lifecycle::Started { token, .. } => !token.is_cancelled(),
            Lifecycle::Detached | Lifecycle::Stopped => false,
        }
    }

    async fn add_job(&self, job: J) -> Result<()> {
        let (token, jobs) = self.channel()?;
        handoff(&token, &jobs, job).await
    }

    fn schedule_job(&self, job: J, at: DateTime<Utc>) {
        let (token, jobs) = match self.channel() {
            Ok(channel) => channel,
            Err(e) => {
                debug!(worker_id = %self.shared.id, error = %e, "Dropping scheduled job");
                return;
            }
        };

        let worker_id = self.shared.id.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(%worker_id, "Worker cancelled before scheduled job fired");
                }
                _ = scheduler::trigger_at(at) => {
                    if let Err(e) = handoff(&token, &jobs, job).await {
                        debug!(%worker_id, error = %e, "Scheduled job not delivered");
                    }
                }
            }
        });
    }

    fn job_handler<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: JobHandler<J> = Arc::new(move |job| handler(job).boxed());
        self.shared
            .handler
            .set(handler)
            .map_err(|_| WorkerError::HandlerAlreadyRegistered(self.shared.id.clone()))
    }

    fn close_handler<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.shared.on_close.lock();
        if matches!(*slot, CloseSlot::Empty) {
            *slot = CloseSlot::Registered(Box::new(handler));
        } else {
            warn!(worker_id = %self.shared.id, "Close handler already registered; ignoring");
        }
    }

    fn set_metadata(&self, metadata: Value) {
        *self.metadata.write() = metadata;
    }

    fn metadata(&self) -> Value {
        self.metadata.read().clone()
    }

    async fn stopped(&self) {
        let started = matches!(*self.lifecycle.lock(), Lifecycle::Started { .. });
        if started {
            self.shared.exited.cancelled().await;
        }
    }
}

impl<J> fmt::Debug for DefaultWorker<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.lifecycle.lock() {
            Lifecycle::Detached => "detached",
            Lifecycle::Started { token, .. } if token.is_cancelled() => "stopped",
            Lifecycle::Started { .. } => "running",
            Lifecycle::Stopped => "stopped",
        };
        f.debug_struct("DefaultWorker")
            .field("id", &self.shared.id)
            .field("state", &state)
            .field("has_handler", &self.shared.handler.get().is_some())
            .finish()
    }
}

/// Single wait over {cancelled, job taken}
async fn handoff<J>(
    token: &CancellationToken,
    jobs: &mpsc::Sender<Delivery<J>>,
    job: J,
) -> Result<()> {
    if token.is_cancelled() {
        return Err(WorkerError::Cancelled);
    }

    let (receipt, taken) = oneshot::channel();

    tokio::select! {
        biased;
        _ = token.cancelled() => return Err(WorkerError::Cancelled),
        sent = jobs.send(Delivery { job, receipt }) => {
            if sent.is_err() {
                return Err(WorkerError::Cancelled);
            }
        }
    }

    // The loop only runs a job whose receipt it could acknowledge, so a
    // submitter that gives up here never has its job handled.
    tokio::select! {
        biased;
        taken = taken => taken.map_err(|_| WorkerError::Cancelled),
        _ = token.cancelled() => Err(WorkerError::Cancelled),
    }
}

async fn process_jobs<J>(
    shared: Arc<Shared<J>>,
    token: CancellationToken,
    mut jobs: mpsc::Receiver<Delivery<J>>,
) {
    let _exited = shared.exited.clone().drop_guard();

    loop {
        let delivery = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            delivery = jobs.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        if delivery.receipt.send(()).is_err() {
            debug!(worker_id = %shared.id, "Submitter abandoned job before handoff");
            continue;
        }

        let Some(handler) = shared.handler.get().cloned() else {
            debug!(worker_id = %shared.id, "No job handler registered; job discarded");
            continue;
        };

        debug!(worker_id = %shared.id, "Handling job");
        let job = delivery.job;
        let outcome = AssertUnwindSafe(async move { handler(job).await })
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            error!(
                worker_id = %shared.id,
                panic = %panic_message(panic.as_ref()),
                policy = ?shared.panic_policy,
                "Job handler panicked"
            );
            if shared.panic_policy == HandlerPanicPolicy::StopWorker {
                token.cancel();
                break;
            }
        }
    }

    // Cancellation that did not come through `stop` still tears down.
    if !shared.stop_requested.load(Ordering::SeqCst) {
        shared.fire_close();
    }

    debug!(worker_id = %shared.id, "Processing loop exited");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
