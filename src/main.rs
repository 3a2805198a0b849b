//! # crystool - CRYSTAL 输入/输出工具箱
//!
//! 解析 CRYSTAL 主输出与辅助文件，生成并回读 `.d12` 输入，统一成单一可执行文件。
//!
//! ## 子命令
//! - `parse` - 主输出解析为 JSON
//! - `write` - 生成 `.d12` 输入
//! - `read-input` - `.d12` 输入还原为 JSON
//! - `analyze` - 辅助文件分析
//!   - `properties` - properties 程序输出
//!   - `doss` - fort.25 态密度
//!   - `mulliken` - Mulliken 电荷
//!   - `cube` - cube 格点数据
//!   - `fort9` - fort.9 记录
//! - `collect` - 批量解析并汇总
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/   (输出与输入解析器)
//!   │     ├── writers/   (输入生成)
//!   │     ├── batch/     (批量并行解析)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod utils;
mod writers;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
