//! Bounded pool for fire-and-forget background work
//!
//! Elections started from inside a message handler and peer-table updates
//! triggered by pings run here; the handler returns its reply without
//! waiting for the job. When every permit is taken new jobs are dropped.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs currently holding a permit.
    pub fn busy(&self) -> usize {
        self.size - self.permits.available_permits()
    }

    /// Start a job if a permit is free. A saturated pool drops the job
    /// and returns `None`; nothing queues behind the permits.
    pub fn spawn<F>(&self, job: &'static str, fut: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(job, busy = self.busy(), "worker pool saturated, dropping job");
                return None;
            }
        };
        Some(tokio::spawn(async move {
            let _permit = permit;
            tracing::trace!(job, "background job started");
            fut.await;
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_saturated_pool_drops_jobs() {
        let pool = WorkerPool::new(2);
        let (release, gate) = tokio::sync::watch::channel(false);

        let held: Vec<_> = (0..2)
            .map(|_| {
                let mut gate = gate.clone();
                pool.spawn("hold", async move {
                    let _ = gate.wait_for(|open| *open).await;
                })
                .unwrap()
            })
            .collect();
        assert_eq!(pool.busy(), 2);

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let dropped = pool.spawn("overflow", async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(dropped.is_none());

        release.send(true).unwrap();
        for handle in held {
            handle.await.unwrap();
        }
        assert_eq!(pool.busy(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        let counter = ran.clone();
        pool.spawn("after", async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap()
        .await
        .unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
