//! Pool — bounded concurrent execution of independent measurements.
//!
//! At most `limit` jobs run at once; the next job starts as soon as a running
//! one finishes. Each job reports exactly one final value over the result
//! channel. There is no cancellation: a job that never returns holds its slot
//! for the life of the run.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error};

use crate::error::{MeasureError, Result};

pub struct TaskPool {
    limit: usize,
}

impl TaskPool {
    pub fn new(limit: usize) -> Self {
        Self { limit: limit.max(1) }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run blocking `jobs` and return their values in submission order.
    ///
    /// A job that panics delivers nothing; siblings keep running, and the
    /// whole run then fails with `MissingResults`.
    pub async fn run<T, F>(&self, jobs: Vec<(String, F)>) -> Result<Vec<(String, T)>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let expected = jobs.len();
        let slots = Arc::new(Semaphore::new(self.limit));
        let (tx, mut rx) = mpsc::channel::<(usize, String, T)>(expected.max(1));

        for (index, (name, job)) in jobs.into_iter().enumerate() {
            let permit = Arc::clone(&slots)
                .acquire_owned()
                .await
                .map_err(|e| MeasureError::Config(e.into()))?;
            let tx = tx.clone();
            debug!(job = %name, "starting job");
            tokio::task::spawn_blocking(move || {
                let value = job();
                drop(permit);
                if tx.try_send((index, name, value)).is_err() {
                    error!("result channel closed before delivery");
                }
            });
        }
        drop(tx);

        let mut slots_out: Vec<Option<(String, T)>> = (0..expected).map(|_| None).collect();
        while let Some((index, name, value)) = rx.recv().await {
            debug!(job = %name, "job finished");
            slots_out[index] = Some((name, value));
        }

        let delivered: Vec<(String, T)> = slots_out.into_iter().flatten().collect();
        if delivered.len() != expected {
            return Err(MeasureError::MissingResults {
                expected,
                missing: expected - delivered.len(),
            });
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn job<F>(name: &str, f: F) -> (String, Box<dyn FnOnce() -> usize + Send>)
    where
        F: FnOnce() -> usize + Send + 'static,
    {
        (name.to_string(), Box::new(f))
    }

    #[tokio::test]
    async fn test_results_in_submission_order() {
        let pool = TaskPool::new(2);
        let jobs = vec![
            job("slow", || {
                std::thread::sleep(Duration::from_millis(50));
                1
            }),
            job("fast", || 2),
            job("third", || 3),
        ];
        let out = pool.run(jobs).await.unwrap();
        assert_eq!(
            out,
            vec![("slow".to_string(), 1), ("fast".to_string(), 2), ("third".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs = (0..6)
            .map(|i| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                job(&format!("job{}", i), move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                    i
                })
            })
            .collect();
        let out = TaskPool::new(2).run(jobs).await.unwrap();
        assert_eq!(out.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panicking_job_is_missing_result() {
        let jobs = vec![job("ok", || 1), job("boom", || panic!("worker died")), job("ok2", || 3)];
        let err = TaskPool::new(3).run(jobs).await.unwrap_err();
        assert!(matches!(err, MeasureError::MissingResults { expected: 3, missing: 1 }));
    }

    #[tokio::test]
    async fn test_zero_limit_still_runs_one_at_a_time() {
        let pool = TaskPool::new(0);
        assert_eq!(pool.limit(), 1);
        let out = pool.run(vec![job("a", || 1), job("b", || 2)]).await.unwrap();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let jobs: Vec<(String, Box<dyn FnOnce() -> usize + Send>)> = Vec::new();
        assert!(TaskPool::new(1).run(jobs).await.unwrap().is_empty());
    }
}
