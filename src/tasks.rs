//! Task lists and shell scripts for distributing collection across processes.
//!
//! Each (keyword, quarter) pair becomes one [`CollectionTask`]. The task list
//! can be written as JSON or turned into shell scripts that run the pairs
//! through `--mode single`, either sequentially or split across workers that
//! run as independent background processes. Workers write disjoint part files,
//! so the only coordination is waiting for all of them before merging.

use crate::error::Result;
use crate::quarters::QuarterRange;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// One (keyword, quarter) unit of collection work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionTask {
    pub task_id: usize,
    pub keyword: String,
    pub quarter: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl CollectionTask {
    pub fn range(&self) -> QuarterRange {
        QuarterRange {
            label: self.quarter.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

#[derive(Debug, Serialize)]
struct TaskFile<'a> {
    generated_at: String,
    total_tasks: usize,
    tasks: &'a [CollectionTask],
}

/// Every keyword crossed with every quarter, keyword-major, ids from 1.
pub fn build_task_list(keywords: &[String], quarters: &[QuarterRange]) -> Vec<CollectionTask> {
    keywords
        .iter()
        .flat_map(|keyword| quarters.iter().map(move |q| (keyword, q)))
        .enumerate()
        .map(|(i, (keyword, q))| CollectionTask {
            task_id: i + 1,
            keyword: keyword.clone(),
            quarter: q.label.clone(),
            start_date: q.start_date,
            end_date: q.end_date,
        })
        .collect()
}

/// Split tasks into `workers` contiguous slices.
///
/// Each slice gets `len / workers` tasks; the last one also takes the
/// remainder.
pub fn split_among_workers(tasks: &[CollectionTask], workers: usize) -> Vec<&[CollectionTask]> {
    let workers = workers.max(1);
    let per_worker = tasks.len() / workers;
    (0..workers)
        .map(|w| {
            let start = w * per_worker;
            let end = if w == workers - 1 {
                tasks.len()
            } else {
                start + per_worker
            };
            &tasks[start..end]
        })
        .collect()
}

/// Quote a value for POSIX shells.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Builds the command lines that the generated scripts run.
#[derive(Debug, Clone)]
pub struct ScriptGenerator {
    program: String,
    config_path: PathBuf,
}

impl ScriptGenerator {
    pub fn new(program: impl Into<String>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config_path: config_path.into(),
        }
    }

    fn base_command(&self) -> String {
        format!(
            "{} --config {}",
            shell_quote(&self.program),
            shell_quote(&self.config_path.to_string_lossy())
        )
    }

    pub fn single_command(&self, task: &CollectionTask) -> String {
        format!(
            "{} --mode single --keyword {} --quarter {} --start-date {} --end-date {}",
            self.base_command(),
            shell_quote(&task.keyword),
            shell_quote(&task.quarter),
            task.start_date,
            task.end_date
        )
    }

    pub fn merge_command(&self) -> String {
        format!("{} --mode merge", self.base_command())
    }

    fn task_lines(&self, out: &mut String, tasks: &[CollectionTask]) {
        for task in tasks {
            let _ = writeln!(out, "# Task {}", task.task_id);
            let _ = writeln!(out, "{}\n", self.single_command(task));
        }
    }

    /// Script that runs every task in order and then merges.
    pub fn sequential_script(&self, tasks: &[CollectionTask], generated_at: &str) -> String {
        let mut out = String::from("#!/bin/bash\n\n");
        let _ = writeln!(out, "# News collection: all tasks, sequential");
        let _ = writeln!(out, "# Generated: {generated_at}");
        let _ = writeln!(out, "# Total tasks: {}\n", tasks.len());
        self.task_lines(&mut out, tasks);
        let _ = writeln!(out, "# Merge");
        let _ = writeln!(out, "{}", self.merge_command());
        out
    }

    /// Script for one worker's slice of tasks.
    pub fn worker_script(&self, worker: usize, workers: usize, tasks: &[CollectionTask]) -> String {
        let mut out = String::from("#!/bin/bash\n\n");
        let _ = writeln!(out, "# Worker {worker}/{workers}");
        let _ = writeln!(out, "# Assigned tasks: {}\n", tasks.len());
        self.task_lines(&mut out, tasks);
        out
    }

    /// Script that launches every worker script in the background, waits,
    /// then merges.
    pub fn launcher_script(&self, workers: usize) -> String {
        let mut out = String::from("#!/bin/bash\n\n");
        let _ = writeln!(out, "# Run all workers in parallel");
        let _ = writeln!(out, "# Workers: {workers}\n");
        let _ = writeln!(out, "cd \"$(dirname \"$0\")\"\n");
        for w in 1..=workers {
            let _ = writeln!(out, "bash {} &", worker_script_name(w));
        }
        let _ = writeln!(out, "\n# Wait for every worker to finish");
        let _ = writeln!(out, "wait\n");
        let _ = writeln!(out, "# Merge");
        let _ = writeln!(out, "{}", self.merge_command());
        out
    }

    /// Write `tasks.json`, the sequential script, the per-worker scripts, and
    /// the launcher into `dir`. Returns the written paths.
    #[instrument(level = "info", skip(self, tasks), fields(dir = %dir.display(), tasks = tasks.len()))]
    pub async fn write_all(
        &self,
        dir: &Path,
        tasks: &[CollectionTask],
        workers: usize,
    ) -> Result<Vec<PathBuf>> {
        let workers = workers.max(1);
        let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        fs::create_dir_all(dir).await?;

        let mut files = vec![
            (dir.join("tasks.json"), task_json(tasks, &Local::now().to_rfc3339())?),
            (dir.join("run_all_tasks.sh"), self.sequential_script(tasks, &generated_at)),
        ];
        for (i, slice) in split_among_workers(tasks, workers).into_iter().enumerate() {
            files.push((
                dir.join(worker_script_name(i + 1)),
                self.worker_script(i + 1, workers, slice),
            ));
        }
        files.push((dir.join("run_all_workers.sh"), self.launcher_script(workers)));

        let mut written = Vec::with_capacity(files.len());
        for (path, contents) in files {
            fs::write(&path, contents).await?;
            info!(path = %path.display(), "Wrote task file");
            written.push(path);
        }
        Ok(written)
    }
}

pub fn worker_script_name(worker: usize) -> String {
    format!("run_worker_{worker}.sh")
}

pub fn task_json(tasks: &[CollectionTask], generated_at: &str) -> Result<String> {
    let file = TaskFile {
        generated_at: generated_at.to_string(),
        total_tasks: tasks.len(),
        tasks,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quarters::quarterly_ranges;

    fn tasks() -> Vec<CollectionTask> {
        let quarters = quarterly_ranges(2022, NaiveDate::from_ymd_opt(2022, 8, 1).unwrap());
        let keywords = vec!["청도군".to_string(), "경북시민재단".to_string()];
        build_task_list(&keywords, &quarters)
    }

    fn generator() -> ScriptGenerator {
        ScriptGenerator::new("quarterly_news", "config.yaml")
    }

    #[test]
    fn test_task_list_is_keyword_major() {
        let tasks = tasks();
        assert_eq!(tasks.len(), 6);
        assert_eq!(tasks[0].task_id, 1);
        assert_eq!(tasks[0].keyword, "청도군");
        assert_eq!(tasks[0].quarter, "2022_Q1");
        assert_eq!(tasks[2].quarter, "2022_Q3");
        assert_eq!(tasks[2].end_date, NaiveDate::from_ymd_opt(2022, 8, 1).unwrap());
        assert_eq!(tasks[3].keyword, "경북시민재단");
        assert_eq!(tasks[5].task_id, 6);
        assert_eq!(tasks[4].range().label, "2022_Q2");
    }

    #[test]
    fn test_split_last_worker_takes_remainder() {
        let tasks = tasks();
        let slices = split_among_workers(&tasks, 4);
        let sizes: Vec<usize> = slices.iter().map(|s| s.len()).collect();
        assert_eq!(sizes, vec![1, 1, 1, 3]);
        let ids: Vec<usize> = slices.iter().flat_map(|s| s.iter().map(|t| t.task_id)).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_split_single_worker() {
        let tasks = tasks();
        let slices = split_among_workers(&tasks, 0);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].len(), 6);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("청도군"), "'청도군'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_single_command() {
        let cmd = generator().single_command(&tasks()[0]);
        assert_eq!(
            cmd,
            "'quarterly_news' --config 'config.yaml' --mode single --keyword '청도군' \
             --quarter '2022_Q1' --start-date 2022-01-01 --end-date 2022-03-31"
        );
    }

    #[test]
    fn test_sequential_script_ends_with_merge() {
        let script = generator().sequential_script(&tasks(), "2022-08-01 12:00:00");
        assert!(script.starts_with("#!/bin/bash"));
        assert_eq!(script.matches("--mode single").count(), 6);
        assert!(script.contains("# Total tasks: 6"));
        assert!(script.trim_end().ends_with("--mode merge"));
    }

    #[test]
    fn test_launcher_waits_before_merge() {
        let script = generator().launcher_script(2);
        let wait = script.find("\nwait").unwrap();
        assert!(script.find("bash run_worker_2.sh &").unwrap() < wait);
        assert!(script.find("--mode merge").unwrap() > wait);
    }

    #[test]
    fn test_task_json_shape() {
        let json = task_json(&tasks(), "2022-08-01T12:00:00+09:00").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_tasks"], 6);
        assert_eq!(value["tasks"][0]["start_date"], "2022-01-01");
        assert_eq!(value["tasks"][3]["keyword"], "경북시민재단");
    }

    #[tokio::test]
    async fn test_write_all_creates_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let written = generator().write_all(dir.path(), &tasks(), 2).await.unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "tasks.json",
                "run_all_tasks.sh",
                "run_worker_1.sh",
                "run_worker_2.sh",
                "run_all_workers.sh"
            ]
        );
        let worker_2 = std::fs::read_to_string(dir.path().join("run_worker_2.sh")).unwrap();
        assert!(worker_2.contains("# Task 4"));
        assert!(!worker_2.contains("# Task 3\n"));
    }
}
