//! Single-worker serialization queue
//!
//! Each pipeline stage owns one `WorkQueue`. Jobs run one at a time, strictly
//! in submission order. A job is spawned as its own task, so it runs to
//! completion even when the submitter stops waiting, and a panicking job does
//! not take the worker down with it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::error::PipelineError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// FIFO admission queue with exactly one worker
#[derive(Clone)]
pub struct WorkQueue {
    name: &'static str,
    tx: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
}

impl WorkQueue {
    /// Create the queue and spawn its worker on the current runtime
    pub fn new(name: &'static str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(e) = tokio::spawn(job).await {
                    tracing::error!(queue = name, error = %e, "Queued job aborted");
                }
            }
            tracing::debug!(queue = name, "Work queue worker stopped");
        });

        Self {
            name,
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Jobs submitted but not yet finished, including the running one
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Enqueue `work` and wait for its output
    pub async fn submit<F, T>(&self, work: F) -> Result<T, PipelineError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();

        self.pending.fetch_add(1, Ordering::SeqCst);
        let guard = PendingGuard(Arc::clone(&self.pending));

        let job: Job = Box::pin(async move {
            let output = work.await;
            drop(guard);
            // Submitter may have gone away; the work still counts as done
            let _ = done_tx.send(output);
        });

        if self.tx.send(job).is_err() {
            return Err(PipelineError::QueueClosed(self.name));
        }

        done_rx
            .await
            .map_err(|_| PipelineError::QueueClosed(self.name))
    }
}

/// Decrements the pending counter when a job finishes, panics or is dropped
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let queue = WorkQueue::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        // Earlier jobs sleep longer; order must still hold
        let submissions = (0..5u64).map(|i| {
            let log = Arc::clone(&log);
            queue.submit(async move {
                tokio::time::sleep(Duration::from_millis(50 - i * 10)).await;
                log.lock().unwrap().push(i);
            })
        });

        for result in futures::future::join_all(submissions).await {
            result.unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_only_one_job_runs_at_a_time() {
        let queue = WorkQueue::new("test");
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                queue
                    .submit(async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_job_completes_after_submitter_gives_up() {
        let queue = WorkQueue::new("test");
        let finished = Arc::new(AtomicUsize::new(0));

        let flag = Arc::clone(&finished);
        let submit = queue.submit(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            flag.fetch_add(1, Ordering::SeqCst);
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(5), submit).await;
        assert!(timed_out.is_err());

        // A later job only runs once the abandoned one finished
        let flag = Arc::clone(&finished);
        let seen = queue
            .submit(async move { flag.load(Ordering::SeqCst) })
            .await
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_worker() {
        let queue = WorkQueue::new("test");

        let result: Result<(), _> = queue.submit(async { panic!("boom") }).await;
        assert!(matches!(result, Err(PipelineError::QueueClosed("test"))));

        let value = queue.submit(async { 42 }).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(queue.pending(), 0);
    }
}
