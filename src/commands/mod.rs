//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `writers/`, `models/`, `utils/`
//! - 子模块: parse, write, read_input, analyze, collect

pub mod analyze;
pub mod collect;
pub mod parse;
pub mod read_input;
pub mod write;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Parse(args) => parse::execute(args),
        Commands::Write(args) => write::execute(args),
        Commands::ReadInput(args) => read_input::execute(args),
        Commands::Analyze(args) => analyze::execute(args),
        Commands::Collect(args) => collect::execute(args),
    }
}
