use std::sync::Arc;

use log::{debug, error, warn};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};

use crate::cache::{CachedResponse, ResponseCache};

const QUEUE_CAPACITY: usize = 1024;

enum CacheJob {
    Put {
        cache_key: String,
        response: CachedResponse,
    },
    Flush(oneshot::Sender<()>),
}

/// Background queue for cache population. Submitting never waits on the
/// cache; writes that fail or do not fit in the queue are logged and dropped.
#[derive(Clone)]
pub struct CacheWriter {
    tx: mpsc::Sender<CacheJob>,
}

impl CacheWriter {
    /// Starts the worker on the current tokio runtime. It exits once every
    /// clone of the writer is dropped.
    pub fn spawn(cache: Arc<dyn ResponseCache>) -> Self {
        Self::with_capacity(cache, QUEUE_CAPACITY)
    }

    pub fn with_capacity(cache: Arc<dyn ResponseCache>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);

        let worker = tokio::spawn(drain(cache, rx));
        tokio::spawn(async move {
            if let Err(e) = worker.await {
                error!("Cache writer died: {}", e);
            }
        });

        Self { tx }
    }

    pub fn submit(&self, cache_key: String, response: CachedResponse) {
        let job = CacheJob::Put {
            cache_key,
            response,
        };
        let (reason, job) = match self.tx.try_send(job) {
            Ok(()) => return,
            Err(TrySendError::Full(job)) => ("queue full", job),
            Err(TrySendError::Closed(job)) => ("writer stopped", job),
        };
        if let CacheJob::Put { cache_key, .. } = job {
            warn!("Cache {}, dropping {}", reason, cache_key);
        }
    }

    /// Waits until every write submitted before this call has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(CacheJob::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

async fn drain(cache: Arc<dyn ResponseCache>, mut rx: mpsc::Receiver<CacheJob>) {
    while let Some(job) = rx.recv().await {
        match job {
            CacheJob::Put {
                cache_key,
                response,
            } => {
                if let Err(e) = cache.put(cache_key.clone(), response).await {
                    warn!("Failed to cache {}: {}", cache_key, e);
                } else {
                    debug!("Cached {}", cache_key);
                }
            }
            CacheJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Cache writer stopped");
}
