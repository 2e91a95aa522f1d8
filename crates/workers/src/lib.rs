//! # Workers
//!
//! A concurrent worker-pool abstraction: a dynamic set of independently
//! running workers, each consuming jobs from its own queue, and a registry
//! that starts, stops, and fans out work to them.
//!
//! ## Features
//!
//! - **One loop per worker**: jobs are handed over one at a time, so a slow
//!   handler only stalls its own worker
//! - **Cancellation tokens**: each worker runs under a child of the token it
//!   was started with; cancelling a parent stops its workers, never the other
//!   way round
//! - **Scheduled jobs**: deliver at a wall-clock time, dropped if the worker
//!   is cancelled first
//! - **Concurrent registry**: insert-if-absent, remove, and best-effort
//!   broadcast over a `DashMap`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Pool                               │
//! │  (DashMap<String, WorkerHandle>: add / remove / broadcast)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Worker (DefaultWorker)                     │
//! │  (child token, job channel, processing loop, handlers)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        scheduler                             │
//! │  (target time -> one-shot delay)                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use workers::prelude::*;
//!
//! let pool = Pool::new();
//! let shutdown = CancellationToken::new();
//!
//! let worker = pool.add(&shutdown, Arc::new(DefaultWorker::<String>::new("w1")))?;
//! worker.job_handler(|job| async move {
//!     tracing::info!(%job, "handling");
//! })?;
//!
//! pool.broadcast("job1".to_string()).await?;
//! worker.schedule_job("job2".to_string(), chrono::Utc::now() + chrono::Duration::seconds(5));
//!
//! pool.remove("w1");
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod scheduler;
pub mod telemetry;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{HandlerPanicPolicy, WorkerConfig};
    pub use crate::error::{Result, WorkerError};
    pub use crate::pool::Pool;
    pub use crate::worker::{AnyWorker, DefaultWorker, Worker, WorkerHandle};
}

// Re-export key types at crate root
pub use config::{ConfigError, HandlerPanicPolicy, WorkerConfig};
pub use error::{Result, WorkerError};
pub use pool::Pool;
pub use worker::{AnyWorker, CloseHandler, DefaultWorker, JobHandler, Worker, WorkerHandle};
