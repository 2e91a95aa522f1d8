//! Workers: one job queue, one processing loop
//!
//! This module provides:
//! - [`Worker`] - The capability set a pool consumes
//! - [`DefaultWorker`] - Channel-backed implementation
//! - [`AnyWorker`] / [`WorkerHandle`] - Type-erased view used by [`crate::Pool`]
//!
//! # Lifecycle
//!
//! ```text
//!   new() ──► Detached ──start(token)──► Running ──stop() / parent cancelled──► Stopped
//!                 │                                                               ▲
//!                 └───────────────────────────stop()──────────────────────────────┘
//! ```
//!
//! A stopped worker is never restarted; build a new instance instead.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use workers::{DefaultWorker, Worker};
//!
//! let worker = Arc::new(DefaultWorker::<String>::new("mailer"));
//! worker.job_handler(|job| async move {
//!     println!("sending {job}");
//! })?;
//!
//! let shutdown = CancellationToken::new();
//! worker.start(&shutdown)?;
//! worker.add_job("welcome-email".to_string()).await?;
//!
//! worker.stop();
//! worker.stopped().await;
//! ```

mod default;
mod handle;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use default::DefaultWorker;
pub use handle::{AnyWorker, WorkerHandle};
pub(crate) use handle::same_worker;

/// Boxed job handler
pub type JobHandler<J> = Arc<dyn Fn(J) -> BoxFuture<'static, ()> + Send + Sync>;

/// Teardown callback, fired at most once
pub type CloseHandler = Box<dyn FnOnce() + Send>;

/// A unit that owns a job queue and a processing loop
///
/// Implementations must be safe to share across tasks; every method takes
/// `&self`. Jobs from a single sender are handled in send order.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Job type consumed by this worker
    type Job: Send + 'static;

    /// Immutable identifier, unique within a pool
    fn id(&self) -> &str;

    /// Start the processing loop under a child of `parent`
    ///
    /// Fails with [`crate::WorkerError::InvalidContext`] if `parent` is already
    /// cancelled, leaving the worker untouched. Must be called within a Tokio
    /// runtime.
    fn start(&self, parent: &CancellationToken) -> Result<()>;

    /// Cancel the worker and fire the teardown callback
    ///
    /// Idempotent and fire-and-forget: an in-flight handler invocation is not
    /// awaited. Use [`Worker::stopped`] to wait for the loop to exit.
    fn stop(&self);

    /// The worker's own token, once started
    fn token(&self) -> Option<CancellationToken>;

    /// True while the processing loop accepts jobs
    fn is_running(&self) -> bool;

    /// Hand a job to the processing loop
    ///
    /// Resolves once the loop has taken the job, or with
    /// [`crate::WorkerError::Cancelled`] if the worker is cancelled first.
    async fn add_job(&self, job: Self::Job) -> Result<()>;

    /// Deliver `job` at `at`
    ///
    /// The job is dropped without error if the worker is cancelled before
    /// `at`. A target in the past fires immediately.
    fn schedule_job(&self, job: Self::Job, at: DateTime<Utc>);

    /// Register the job handler
    ///
    /// Write-once: a second registration fails with
    /// [`crate::WorkerError::HandlerAlreadyRegistered`] and the first handler
    /// stays active.
    fn job_handler<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(Self::Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static;

    /// Register the teardown callback
    fn close_handler<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static;

    /// Replace the opaque metadata value
    fn set_metadata(&self, metadata: Value);

    /// Current metadata, `Value::Null` if never set
    fn metadata(&self) -> Value;

    /// Wait until the processing loop has exited
    ///
    /// Resolves immediately for a worker that was never started.
    async fn stopped(&self);
}
