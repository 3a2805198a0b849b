//! # collect 子命令 CLI 定义
//!
//! 批量解析目录中的 CRYSTAL 主输出并汇总为 CSV。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/collect.rs`

use clap::Args;
use std::path::PathBuf;

/// collect 子命令参数
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Directory containing CRYSTAL runs (or a single stdout file)
    pub input: PathBuf,

    /// Glob pattern(s) for stdout files, comma separated
    #[arg(long, default_value = "*.out")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0, env = "CRYSTOOL_JOBS")]
    pub jobs: usize,

    /// Summary CSV file
    #[arg(long, default_value = "crystal_summary.csv")]
    pub output: PathBuf,

    /// Also write one JSON file per run into this directory
    #[arg(long)]
    pub json_dir: Option<PathBuf>,
}
