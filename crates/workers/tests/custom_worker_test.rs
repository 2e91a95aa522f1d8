//! A pool accepts any Worker implementation, not only DefaultWorker
//!
//! Run with: cargo test -p workers --test custom_worker_test

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use workers::prelude::*;
use workers::JobHandler;

/// Worker that runs its handler inline inside `add_job`
struct InlineWorker {
    id: String,
    token: Mutex<Option<CancellationToken>>,
    handler: Mutex<Option<JobHandler<u64>>>,
    metadata: RwLock<Value>,
}

impl InlineWorker {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            token: Mutex::new(None),
            handler: Mutex::new(None),
            metadata: RwLock::new(Value::Null),
        }
    }
}

#[async_trait]
impl Worker for InlineWorker {
    type Job = u64;

    fn id(&self) -> &str {
        &self.id
    }

    fn start(&self, parent: &CancellationToken) -> Result<()> {
        if parent.is_cancelled() {
            return Err(WorkerError::InvalidContext);
        }
        let mut token = self.token.lock();
        if token.is_some() {
            return Err(WorkerError::AlreadyRunning(self.id.clone()));
        }
        *token = Some(parent.child_token());
        Ok(())
    }

    fn stop(&self) {
        if let Some(token) = self.token.lock().as_ref() {
            token.cancel();
        }
    }

    fn token(&self) -> Option<CancellationToken> {
        self.token.lock().clone()
    }

    fn is_running(&self) -> bool {
        self.token
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    async fn add_job(&self, job: u64) -> Result<()> {
        let token = self
            .token()
            .ok_or_else(|| WorkerError::NotRunning(self.id.clone()))?;
        if token.is_cancelled() {
            return Err(WorkerError::Cancelled);
        }
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(job).await;
        }
        Ok(())
    }

    fn schedule_job(&self, _job: u64, _at: DateTime<Utc>) {}

    fn job_handler<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: Fn(u64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.handler.lock();
        if slot.is_some() {
            return Err(WorkerError::HandlerAlreadyRegistered(self.id.clone()));
        }
        let handler: JobHandler<u64> = Arc::new(move |job| handler(job).boxed());
        *slot = Some(handler);
        Ok(())
    }

    fn close_handler<F>(&self, _handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
    }

    fn set_metadata(&self, metadata: Value) {
        *self.metadata.write() = metadata;
    }

    fn metadata(&self) -> Value {
        self.metadata.read().clone()
    }

    async fn stopped(&self) {
        if let Some(token) = self.token() {
            token.cancelled().await;
        }
    }
}

#[test_log::test(tokio::test)]
async fn test_pool_drives_custom_worker() {
    let pool = Pool::new();
    let shutdown = CancellationToken::new();

    let total = Arc::new(Mutex::new(0u64));
    let inline = Arc::new(InlineWorker::new("inline"));
    let sum = Arc::clone(&total);
    inline
        .job_handler(move |job| {
            *sum.lock() += job;
            async {}
        })
        .unwrap();

    let inline = pool.add(&shutdown, inline).unwrap();
    assert!(inline.is_running());

    pool.broadcast(5u64).await.unwrap();
    pool.broadcast(7u64).await.unwrap();

    // Inline handlers have finished by the time broadcast returns.
    assert_eq!(*total.lock(), 12);

    pool.remove("inline");
    assert!(!inline.is_running());
    assert!(pool.broadcast(1u64).await.is_ok());
    assert_eq!(*total.lock(), 12);
}

#[test_log::test(tokio::test)]
async fn test_mixed_pool_broadcast() {
    let pool = Pool::new();
    let shutdown = CancellationToken::new();

    let inline = pool
        .add(&shutdown, Arc::new(InlineWorker::new("inline")))
        .unwrap();
    pool.add(&shutdown, Arc::new(DefaultWorker::<String>::new("text")))
        .unwrap();

    let err = pool.broadcast(3u64).await.unwrap_err();
    assert!(matches!(
        err,
        WorkerError::BroadcastTypeMismatch { ref id, .. } if id == "text"
    ));

    assert_eq!(pool.get("inline").unwrap().job_type(), "u64");
    assert!(pool.get_as::<InlineWorker>("inline").is_some());
    assert!(inline.is_running());

    pool.stop_all();
    assert!(pool.is_empty());
}
