//! # collect 命令实现
//!
//! 并行解析目录中的 CRYSTAL 主输出，汇总关键数值到 CSV。
//!
//! ## 功能
//! - 按 glob 模式收集文件（可递归）
//! - rayon 并行解析，每个文件独立
//! - 非 CRYSTAL 输出（无运行起始横幅）跳过
//! - 可选为每个运行写一个 JSON
//! - 终端打印退出分类统计
//!
//! ## 依赖关系
//! - 使用 `cli/collect.rs` 定义的参数
//! - 使用 `batch/`, `parsers/stdout/`, `commands/parse.rs`

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::collect::CollectArgs;
use crate::commands::parse::{outcome_json, summarize, RunSummary};
use crate::error::{CrystoolError, Result};
use crate::parsers::{self, stdout};
use crate::utils::{self, output};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

/// 退出分类统计行
#[derive(Debug, Clone, Tabled)]
struct ExitRow {
    #[tabled(rename = "Exit code")]
    exit_code: String,
    #[tabled(rename = "Runs")]
    count: usize,
}

/// 解析单个文件
fn process_file(path: &Path, json_dir: Option<&Path>) -> ProcessResult<RunSummary> {
    let content = match parsers::read_text(path) {
        Ok(c) => c,
        Err(e) => return ProcessResult::Failed(e.to_string()),
    };
    if !content.trim().is_empty() && !content.contains(stdout::RUN_START) {
        return ProcessResult::Skipped("not a CRYSTAL stdout".to_string());
    }

    let outcome = stdout::read_crystal_stdout(&content);
    if let Some(dir) = json_dir {
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let json_path = dir.join(format!("{}.json", stem));
        if let Err(e) = utils::emit_json(&outcome_json(&outcome), Some(json_path.as_path())) {
            return ProcessResult::Failed(e.to_string());
        }
    }
    ProcessResult::Success(summarize(&outcome))
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// 保存汇总 CSV
fn save_summary_csv(items: &[(PathBuf, RunSummary)], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record([
        "file",
        "exit_code",
        "crystal_version",
        "n_atoms",
        "scf_cycles",
        "opt_steps",
        "initial_energy_eV",
        "final_energy_eV",
        "band_gap_eV",
        "elapsed_s",
    ])?;

    for (path, s) in items {
        wtr.write_record(&[
            path.display().to_string(),
            s.exit_code.clone().unwrap_or_else(|| "OK".to_string()),
            fmt_opt(s.crystal_version),
            fmt_opt(s.n_atoms),
            fmt_opt(s.scf_cycles),
            s.opt_steps.to_string(),
            fmt_opt(s.initial_energy.map(|e| format!("{:.10}", e))),
            fmt_opt(s.final_energy.map(|e| format!("{:.10}", e))),
            fmt_opt(s.band_gap.map(|g| format!("{:.6}", g))),
            fmt_opt(s.elapsed_time),
        ])?;
    }

    wtr.flush().map_err(|e| CrystoolError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

/// 执行 collect 命令
pub fn execute(args: CollectArgs) -> Result<()> {
    output::print_header("Collecting CRYSTAL Runs");

    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect()?;
    if files.is_empty() {
        return Err(CrystoolError::NoFilesFound {
            pattern: args.pattern.clone(),
        });
    }

    if let Some(dir) = &args.json_dir {
        fs::create_dir_all(dir).map_err(|e| CrystoolError::FileWriteError {
            path: dir.display().to_string(),
            source: e,
        })?;
    }

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!(
        "Parsing {} files with {} jobs",
        files.len(),
        runner.jobs()
    ));

    let json_dir = args.json_dir.as_deref();
    let batch = runner.run(files, |path| process_file(path, json_dir))?;

    for (path, reason) in &batch.skipped {
        output::print_skip(&format!("{}: {}", path.display(), reason));
    }
    for (path, err) in &batch.failures {
        output::print_error(&format!("{}: {}", path.display(), err));
    }

    if batch.items.is_empty() {
        output::print_warning("No CRYSTAL runs parsed.");
        return Ok(());
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (_, summary) in &batch.items {
        let key = summary.exit_code.clone().unwrap_or_else(|| "OK".to_string());
        *counts.entry(key).or_default() += 1;
    }
    let rows: Vec<ExitRow> = counts
        .into_iter()
        .map(|(exit_code, count)| ExitRow { exit_code, count })
        .collect();
    println!("{}", Table::new(&rows));

    save_summary_csv(&batch.items, &args.output)?;
    output::print_success(&format!(
        "{} of {} files summarised into '{}'",
        batch.items.len(),
        batch.total(),
        args.output.display()
    ));
    Ok(())
}
