//! # read-input 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/read_input.rs`

use clap::Args;
use std::path::PathBuf;

/// read-input 子命令参数
#[derive(Args, Debug)]
pub struct ReadInputArgs {
    /// .d12 input file
    pub input: PathBuf,

    /// Write the JSON configuration to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write each basis set to <dir>/<Z>.basis
    #[arg(long)]
    pub basis_dir: Option<PathBuf>,
}
