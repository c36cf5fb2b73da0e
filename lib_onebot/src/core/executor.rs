//! # Blocking Worker Pool
//!
//! Runs blocking handlers on tokio's blocking threads, with at most `size`
//! running at once, so they never stall the receive loop or other events.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::ExecutorError;

#[derive(Debug, Clone)]
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

    /// Permits not currently held by a running job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a free slot, then runs `job` on a blocking thread.
    pub async fn run<F, R>(&self, job: F) -> Result<R, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExecutorError::Closed)?;
        let out = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await?;
        Ok(out)
    }

    /// Rejects all future jobs; running ones finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_job_and_returns_value() {
        let pool = WorkerPool::new(2);
        let out = pool.run(|| 40 + 2).await.unwrap();
        assert_eq!(out, 42);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut jobs = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            jobs.push(tokio::spawn(async move {
                pool.run(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for job in jobs {
            job.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects() {
        let pool = WorkerPool::new(1);
        pool.close();
        assert!(matches!(pool.run(|| ()).await, Err(ExecutorError::Closed)));
    }

    #[tokio::test]
    async fn test_panicking_job_is_an_error() {
        let pool = WorkerPool::new(1);
        let res = pool.run(|| panic!("boom")).await;
        assert!(matches!(res, Err(ExecutorError::Join(_))));
        assert_eq!(pool.available(), 1);
    }
}
