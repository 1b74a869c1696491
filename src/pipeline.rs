//! Collection pipeline: collect, filter, and persist (keyword, quarter) pairs.

use crate::api::SearchApi;
use crate::collector::QuarterCollector;
use crate::config::Config;
use crate::error::Result;
use crate::filter::PhraseFilter;
use crate::outputs::parts::PartWriter;
use crate::pool::{TaskOutcome, WorkerPool};
use crate::quarters::QuarterRange;
use crate::tasks::{CollectionTask, build_task_list};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// What happened to one (keyword, quarter) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    Saved { path: PathBuf, records: usize },
    /// Nothing was collected, or nothing survived the phrase filter.
    NoData,
}

pub struct Pipeline<S> {
    collector: QuarterCollector<S>,
    phrase: PhraseFilter,
    writer: PartWriter,
    pair_delay: Duration,
}

impl<S> Pipeline<S>
where
    S: SearchApi,
{
    /// Build a pipeline writing part files into `parts_dir`.
    pub fn new(api: S, config: &Config, parts_dir: impl Into<PathBuf>) -> Self {
        Self {
            collector: QuarterCollector::new(api, config),
            phrase: PhraseFilter::new(config.filtering.exact_phrase_match),
            writer: PartWriter::new(parts_dir, config.output.encoding),
            pair_delay: config.collection.pair_delay(),
        }
    }

    /// Collect one pair and write its part file.
    #[instrument(level = "info", skip_all, fields(%keyword, quarter = %quarter.label))]
    pub async fn collect_pair(&self, keyword: &str, quarter: &QuarterRange) -> Result<PairOutcome> {
        let records = self.collector.collect(keyword, quarter).await;
        if records.is_empty() {
            warn!("No records collected; skipping pair");
            return Ok(PairOutcome::NoData);
        }

        let records = self.phrase.apply(records, keyword);
        info!(matched = records.len(), "Exact phrase filter applied");
        if records.is_empty() {
            warn!("No records left after phrase filter; skipping pair");
            return Ok(PairOutcome::NoData);
        }

        let count = records.len();
        match self.writer.write(records, keyword, &quarter.label).await? {
            Some(path) => Ok(PairOutcome::Saved {
                path,
                records: count,
            }),
            None => Ok(PairOutcome::NoData),
        }
    }

    async fn run_task(&self, task: CollectionTask, total: usize) -> Result<PairOutcome> {
        info!(task = task.task_id, total, keyword = %task.keyword, quarter = %task.quarter, "Starting task");
        let outcome = self.collect_pair(&task.keyword, &task.range()).await;
        sleep(self.pair_delay).await;
        outcome
    }

    /// Collect every keyword for every quarter through `pool`.
    ///
    /// Failures of individual pairs are logged and do not stop the run.
    /// Returns the part files that were written.
    #[instrument(level = "info", skip_all, fields(keywords = keywords.len(), quarters = quarters.len()))]
    pub async fn collect_all(
        &self,
        keywords: &[String],
        quarters: &[QuarterRange],
        pool: &WorkerPool,
    ) -> Vec<PathBuf> {
        let tasks = build_task_list(keywords, quarters);
        let total = tasks.len();
        info!(total, workers = pool.workers(), "Collecting all pairs");

        let reports = pool.run(tasks, |task| self.run_task(task, total)).await;

        let mut saved = Vec::new();
        let (mut empty, mut failed) = (0usize, 0usize);
        for report in reports {
            let task = &report.task;
            match report.outcome {
                TaskOutcome::Completed(PairOutcome::Saved { path, .. }) => saved.push(path),
                TaskOutcome::Completed(PairOutcome::NoData) => empty += 1,
                TaskOutcome::Failed(reason) => {
                    failed += 1;
                    error!(keyword = %task.keyword, quarter = %task.quarter, %reason, "Task failed");
                }
                TaskOutcome::TimedOut => {
                    failed += 1;
                    error!(keyword = %task.keyword, quarter = %task.quarter, "Task timed out");
                }
            }
        }

        info!(
            total,
            saved = saved.len(),
            empty,
            failed,
            parts_dir = %self.writer.dir().display(),
            "Collection finished"
        );
        saved
    }
}
