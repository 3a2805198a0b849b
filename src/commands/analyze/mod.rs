//! # analyze 命令实现
//!
//! 辅助文件分析统一入口，包含多个子命令：
//! - `properties`: properties 程序 stdout
//! - `doss`: fort.25 态密度导出与绘图
//! - `mulliken`: Mulliken 电荷表
//! - `cube`: cube 格点统计
//! - `fort9`: fort.9 记录列表
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 子模块: properties, doss, mulliken, cube, fort9

pub mod cube;
pub mod doss;
pub mod fort9;
pub mod mulliken;
pub mod properties;

use crate::cli::analyze::{AnalyzeArgs, AnalyzeCommands};
use crate::error::Result;

/// 执行 analyze 命令
pub fn execute(args: AnalyzeArgs) -> Result<()> {
    match args.command {
        AnalyzeCommands::Properties(a) => properties::execute(a),
        AnalyzeCommands::Doss(a) => doss::execute(a),
        AnalyzeCommands::Mulliken(a) => mulliken::execute(a),
        AnalyzeCommands::Cube(a) => cube::execute(a),
        AnalyzeCommands::Fort9(a) => fort9::execute(a),
    }
}
