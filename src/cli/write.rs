//! # write 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/write.rs`

use clap::Args;
use std::path::PathBuf;

/// write 子命令参数
#[derive(Args, Debug)]
pub struct WriteArgs {
    /// JSON input configuration
    pub config: PathBuf,

    /// Basis set files, one element per file (in input order)
    #[arg(short, long = "basis", required = true, num_args = 1..)]
    pub basis: Vec<PathBuf>,

    /// JSON map of atom properties (spin_alpha, spin_beta, unfixed, ghosts) to 1-based atom indices
    #[arg(long, conflicts_with_all = ["structure", "kinds"])]
    pub atom_props: Option<PathBuf>,

    /// JSON structure whose atom kinds select the per-atom properties
    #[arg(long, requires = "kinds")]
    pub structure: Option<PathBuf>,

    /// JSON table of per-kind flags (spin_alpha, spin_beta, fixed, ghosts)
    #[arg(long, requires = "structure")]
    pub kinds: Option<PathBuf>,

    /// Output .d12 file
    #[arg(short, long, default_value = "INPUT")]
    pub output: PathBuf,

    /// Overwrite an existing output file
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
