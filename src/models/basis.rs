//! # 基组数据模型
//!
//! CRYSTAL 基组文本块：首行 `Z NSHELL`，随后每个壳层一行
//! `ITYPE LAT NG CHE SCAL`，`ITYPE == 0` 时跟随 `NG` 行高斯原函数。
//!
//! ## 依赖关系
//! - 被 `writers/d12.rs`, `parsers/d12.rs` 使用
//! - 被 `commands/write.rs` 从文件加载

use serde::{Deserialize, Serialize};

/// 单个元素的基组文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisSet {
    /// 基组原文（不含结束行 `99 0`）
    pub content: String,
}

impl BasisSet {
    pub fn new(content: impl Into<String>) -> Self {
        BasisSet {
            content: content.into().trim().to_string(),
        }
    }

    /// 首行中的原子序数字段（赝势基组可能大于 200）
    pub fn raw_atomic_number(&self) -> Option<u32> {
        self.content
            .lines()
            .next()?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }

    /// 真实原子序数
    pub fn atomic_number(&self) -> Option<u32> {
        self.raw_atomic_number().map(|z| z % 100)
    }

    /// 声明的壳层数
    pub fn n_shells(&self) -> Option<usize> {
        self.content
            .lines()
            .next()?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    }
}
