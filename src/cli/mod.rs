//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `parse`: 解析 CRYSTAL 主输出为 JSON
//! - `write`: 由 JSON 配置与基组文件生成 `.d12`
//! - `read-input`: 把 `.d12` 还原为 JSON 配置
//! - `analyze`: 辅助文件分析（嵌套子命令）
//!   - `properties`, `doss`, `mulliken`, `cube`, `fort9`
//! - `collect`: 批量解析目录中的输出并汇总
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: parse, write, read_input, analyze, collect

pub mod analyze;
pub mod collect;
pub mod parse;
pub mod read_input;
pub mod write;

use clap::{ArgAction, Parser, Subcommand};

/// crystool - CRYSTAL 输出解析与输入生成工具
#[derive(Parser)]
#[command(name = "crystool")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Parse CRYSTAL outputs and write CRYSTAL inputs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Parse a CRYSTAL stdout file into nested JSON
    Parse(parse::ParseArgs),

    /// Write a .d12 input from a JSON configuration and basis set files
    Write(write::WriteArgs),

    /// Read a .d12 input back into a JSON configuration
    ReadInput(read_input::ReadInputArgs),

    /// Analyze auxiliary CRYSTAL files (properties output, DOSS, Mulliken, cube, fort.9)
    Analyze(analyze::AnalyzeArgs),

    /// Parse every CRYSTAL stdout under a directory and summarise the results
    Collect(collect::CollectArgs),
}
