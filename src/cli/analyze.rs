//! # analyze 子命令 CLI 定义
//!
//! 辅助文件分析统一入口：
//! - `properties`: properties 程序 stdout
//! - `doss`: fort.25 态密度
//! - `mulliken`: PPAN.DAT 或主输出中的 Mulliken 布居
//! - `cube`: cube 格点数据
//! - `fort9`: fort.9 记录结构
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/analyze/` 相应模块

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// analyze 主命令参数
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub command: AnalyzeCommands,
}

/// analyze 子命令
#[derive(Subcommand, Debug)]
pub enum AnalyzeCommands {
    /// Parse a CRYSTAL properties stdout (NEWK, DOSS)
    Properties(PropertiesArgs),

    /// Read DOSS data from fort.25 and export CSV / plot
    Doss(DossArgs),

    /// Tabulate Mulliken charges from PPAN.DAT or a CRYSTAL stdout
    Mulliken(MullikenArgs),

    /// Summarise a cube grid file
    Cube(CubeArgs),

    /// List the Fortran records of a fort.9 file
    Fort9(Fort9Args),
}

#[derive(Args, Debug)]
pub struct PropertiesArgs {
    /// properties stdout file
    pub input: PathBuf,

    /// Write the JSON result to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DossArgs {
    /// fort.25 file written by DOSS
    pub input: PathBuf,

    /// CSV export (energy column + one column per projection)
    #[arg(long, default_value = "doss.csv")]
    pub output_csv: PathBuf,

    /// PNG plot of all projections
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Shift energies so that the Fermi level is zero
    #[arg(long, default_value_t = false)]
    pub shift_fermi: bool,

    /// Figure width in pixels
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels
    #[arg(long, default_value_t = 800)]
    pub height: u32,
}

#[derive(Args, Debug)]
pub struct MullikenArgs {
    /// PPAN.DAT or CRYSTAL stdout file
    pub input: PathBuf,

    /// Also write the populations as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CubeArgs {
    /// cube file (e.g. DENS_CUBE.DAT)
    pub input: PathBuf,
}

#[derive(Args, Debug)]
pub struct Fort9Args {
    /// fort.9 wave function file
    pub input: PathBuf,

    /// Print one row per record
    #[arg(long, default_value_t = false)]
    pub records: bool,
}
