//! Bounded in-process worker pool.
//!
//! Runs a list of tasks with at most `workers` in flight, each optionally
//! bounded by a timeout, and hands back one report per task in the order the
//! tasks were given. With one worker the tasks run strictly one after another.

use crate::error::CollectError;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug)]
pub enum TaskOutcome<R> {
    Completed(R),
    Failed(String),
    TimedOut,
}

#[derive(Debug)]
pub struct TaskReport<T, R> {
    pub task: T,
    pub outcome: TaskOutcome<R>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    task_timeout: Option<Duration>,
}

impl WorkerPool {
    pub fn new(workers: usize, task_timeout: Option<Duration>) -> Self {
        Self {
            workers: workers.max(1),
            task_timeout,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `work` over every task and collect the outcomes.
    pub async fn run<T, R, F, Fut>(&self, tasks: Vec<T>, work: F) -> Vec<TaskReport<T, R>>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, CollectError>>,
    {
        let limit = self.task_timeout;
        let mut reports: Vec<(usize, TaskReport<T, R>)> = stream::iter(tasks.into_iter().enumerate())
            .map(|(index, task)| {
                let fut = work(task.clone());
                async move {
                    let result = match limit {
                        Some(limit) => timeout(limit, fut).await.ok(),
                        None => Some(fut.await),
                    };
                    let outcome = match result {
                        Some(Ok(value)) => TaskOutcome::Completed(value),
                        Some(Err(e)) => TaskOutcome::Failed(e.to_string()),
                        None => TaskOutcome::TimedOut,
                    };
                    (index, TaskReport { task, outcome })
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_reports_follow_task_order() {
        let pool = WorkerPool::new(3, None);
        let reports = pool
            .run(vec![30u64, 10, 20], |ms| async move {
                sleep(Duration::from_millis(ms)).await;
                Ok(ms * 2)
            })
            .await;
        let tasks: Vec<u64> = reports.iter().map(|r| r.task).collect();
        assert_eq!(tasks, vec![30, 10, 20]);
        assert!(matches!(reports[1].outcome, TaskOutcome::Completed(20)));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let (in_flight, peak) = (&AtomicUsize::new(0), &AtomicUsize::new(0));
        let pool = WorkerPool::new(2, None);
        pool.run((0..6).collect::<Vec<u32>>(), move |_| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(10)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_single_worker_runs_sequentially() {
        let (in_flight, peak) = (&AtomicUsize::new(0), &AtomicUsize::new(0));
        WorkerPool::new(0, None)
            .run(vec![1, 2, 3], move |_| async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_and_timeouts_are_reported() {
        let pool = WorkerPool::new(2, Some(Duration::from_millis(50)));
        let reports = pool
            .run(vec![0u64, 1, 500], |n| async move {
                match n {
                    1 => Err(CollectError::Config("boom".into())),
                    ms => {
                        sleep(Duration::from_millis(ms)).await;
                        Ok(n)
                    }
                }
            })
            .await;
        assert!(matches!(reports[0].outcome, TaskOutcome::Completed(0)));
        assert!(matches!(&reports[1].outcome, TaskOutcome::Failed(msg) if msg.contains("boom")));
        assert!(matches!(reports[2].outcome, TaskOutcome::TimedOut));
    }
}
