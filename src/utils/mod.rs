//! # 工具函数模块
//!
//! 提供美化输出、进度条与 JSON 输出等工具。
//!
//! ## 依赖关系
//! - 被 `commands/`, `batch/` 模块使用
//! - 子模块: output, progress

pub mod output;
pub mod progress;

use crate::error::{CrystoolError, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// 序列化为 JSON：给定路径时写入文件，否则打印到 stdout
pub fn emit_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match path {
        Some(p) => fs::write(p, text + "\n").map_err(|e| CrystoolError::FileWriteError {
            path: p.display().to_string(),
            source: e,
        }),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}
