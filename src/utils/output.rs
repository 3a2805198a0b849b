//! # 美化输出工具
//!
//! 提供统一的终端输出样式。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块使用
//! - 使用 `colored` crate

use crate::models::ExitCode;
use colored::Colorize;

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印跳过消息
pub fn print_skip(msg: &str) {
    println!("{} {}", "[SKIP]".dimmed(), msg);
}

/// 打印退出分类：成功为绿色，未收敛为黄色，其余为红色
pub fn print_exit(exit_code: Option<ExitCode>) {
    match exit_code {
        None => println!("{} {}", "[EXIT]".green().bold(), "success"),
        Some(code @ (ExitCode::UnconvergedScf | ExitCode::UnconvergedGeometry)) => {
            println!("{} {} ({})", "[EXIT]".yellow().bold(), code, code.description())
        }
        Some(code) => println!("{} {} ({})", "[EXIT]".red().bold(), code, code.description()),
    }
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}
