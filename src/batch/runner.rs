//! # 批量执行器
//!
//! 在独立的 rayon 线程池中并行处理文件，每个文件互不依赖。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代
//! - 进度条显示
//! - 结果按输入顺序返回，失败单独汇总
//!
//! ## 依赖关系
//! - 被 `commands/collect.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条

use crate::error::{CrystoolError, Result};
use crate::utils::progress;

use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// 单个文件处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult<T> {
    Success(T),
    /// 跳过（附原因）
    Skipped(String),
    /// 失败（附错误信息）
    Failed(String),
}

/// 批量处理结果
#[derive(Debug)]
pub struct BatchResult<T> {
    /// 成功项（保持输入顺序）
    pub items: Vec<(PathBuf, T)>,
    pub skipped: Vec<(PathBuf, String)>,
    pub failures: Vec<(PathBuf, String)>,
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        BatchResult {
            items: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> BatchResult<T> {
    pub fn merge(&mut self, path: PathBuf, result: ProcessResult<T>) {
        match result {
            ProcessResult::Success(item) => self.items.push((path, item)),
            ProcessResult::Skipped(reason) => self.skipped.push((path, reason)),
            ProcessResult::Failed(err) => self.failures.push((path, err)),
        }
    }

    pub fn total(&self) -> usize {
        self.items.len() + self.skipped.len() + self.failures.len()
    }
}

/// 批量执行器
pub struct BatchRunner {
    jobs: usize,
}

impl BatchRunner {
    /// `jobs == 0` 时使用全部逻辑核
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理文件列表
    pub fn run<T, F>(&self, files: Vec<PathBuf>, processor: F) -> Result<BatchResult<T>>
    where
        T: Send,
        F: Fn(&Path) -> ProcessResult<T> + Sync + Send,
    {
        let pb = progress::create_progress_bar(files.len() as u64, "Parsing");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| CrystoolError::Other(format!("Failed to build thread pool: {}", e)))?;

        let results: Vec<(PathBuf, ProcessResult<T>)> = pool.install(|| {
            files
                .into_par_iter()
                .map(|file| {
                    let result = processor(&file);
                    pb.inc(1);
                    (file, result)
                })
                .collect()
        });

        pb.finish_and_clear();

        let mut batch = BatchResult::default();
        for (path, result) in results {
            batch.merge(path, result);
        }
        Ok(batch)
    }
}
