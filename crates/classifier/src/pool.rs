use std::sync::Arc;

use tokio::sync::{Semaphore, TryAcquireError};
use tracing::{debug, error};

use genre_domain::{ClassificationResult, MediaKind};

use crate::error::PoolError;
use crate::pipeline::ClassificationService;

/// Bounded executor for classification jobs.
///
/// At most `workers` jobs run at once on the blocking thread pool and at most
/// `queue_depth` more wait for a worker. Anything beyond that is refused with
/// [`PoolError::Saturated`] instead of queueing without bound.
#[derive(Clone)]
pub struct ClassificationPool {
    service: Arc<ClassificationService>,
    admission: Arc<Semaphore>,
    workers: Arc<Semaphore>,
    capacity: usize,
}

impl ClassificationPool {
    pub fn new(service: Arc<ClassificationService>, workers: usize, queue_depth: usize) -> Self {
        let workers = workers.max(1);
        let capacity = workers + queue_depth;
        Self {
            service,
            admission: Arc::new(Semaphore::new(capacity)),
            workers: Arc::new(Semaphore::new(workers)),
            capacity,
        }
    }

    pub async fn classify(
        &self,
        kind: MediaKind,
        bytes: Vec<u8>,
    ) -> Result<ClassificationResult, PoolError> {
        let admitted = self
            .admission
            .clone()
            .try_acquire_owned()
            .map_err(|err| match err {
                TryAcquireError::NoPermits => PoolError::Saturated,
                TryAcquireError::Closed => PoolError::Closed,
            })?;

        // Admitted jobs run to completion even if the caller goes away.
        let workers = Arc::clone(&self.workers);
        let service = Arc::clone(&self.service);
        let job = tokio::spawn(async move {
            let worker = workers
                .acquire_owned()
                .await
                .map_err(|_| PoolError::Closed)?;
            debug!(?kind, bytes = bytes.len(), "job started");
            let chain = tokio::task::spawn_blocking(move || {
                let _permits = (admitted, worker);
                service.classify(kind, &bytes)
            });
            Ok::<_, PoolError>(chain.await)
        });

        match job.await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Err(err)) => Err(err),
            Ok(Ok(Err(err))) | Err(err) => {
                error!(error = %err, "classification worker failed");
                Ok(ClassificationResult::failure())
            }
        }
    }

    /// Jobs that can still be admitted right now.
    pub fn available_slots(&self) -> usize {
        self.admission.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Refuses new jobs. Running and queued jobs finish normally.
    pub fn close(&self) {
        self.admission.close();
    }
}
