//! # fort.9 波函数文件读取
//!
//! fort.9 是 Fortran 无格式顺序文件：每条记录前后各有一个 4 字节
//! 小端长度标记，两端必须一致。这里只负责切分记录并提供类型化视图，
//! 不解释波函数内容。
//!
//! 错误中的 `line` 字段表示记录序号（从 0 开始）。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `commands/analyze/fort9.rs` 使用

use crate::error::{ScanError, ScanResult};
use crate::models::Record;

const MARKER_LEN: usize = std::mem::size_of::<u32>();

/// 已切分的 fort.9 记录
#[derive(Debug, Clone, PartialEq)]
pub struct Fort9 {
    pub records: Vec<Vec<u8>>,
}

fn take_marker(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset.checked_add(MARKER_LEN)?)?;
    Some(u32::from_le_bytes(slice.try_into().ok()?))
}

/// 切分 Fortran 顺序记录
pub fn read_fort9(bytes: &[u8]) -> ScanResult<Fort9> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let index = records.len();
        let length = take_marker(bytes, offset)
            .ok_or_else(|| ScanError::eof(index, "record length marker"))? as usize;
        let body_start = offset + MARKER_LEN;
        let body_end = body_start
            .checked_add(length)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| ScanError::eof(index, format!("{} bytes of record data", length)))?;

        let trailer = take_marker(bytes, body_end)
            .ok_or_else(|| ScanError::eof(index, "trailing record length marker"))? as usize;
        if trailer != length {
            return Err(ScanError::unexpected(
                index,
                format!("trailing marker {}", length),
                format!("trailing marker {}", trailer),
            ));
        }

        records.push(bytes[body_start..body_end].to_vec());
        offset = body_end + MARKER_LEN;
    }

    log::debug!("fort.9: {} records, {} bytes", records.len(), bytes.len());
    Ok(Fort9 { records })
}

impl Fort9 {
    /// 按 4 字节整数解释第 `index` 条记录
    pub fn i32s(&self, index: usize) -> Option<Vec<i32>> {
        let record = self.records.get(index)?;
        if record.len() % 4 != 0 {
            return None;
        }
        Some(
            record
                .chunks_exact(4)
                .filter_map(|c| c.try_into().ok().map(i32::from_le_bytes))
                .collect(),
        )
    }

    /// 按 8 字节双精度解释第 `index` 条记录
    pub fn f64s(&self, index: usize) -> Option<Vec<f64>> {
        let record = self.records.get(index)?;
        if record.len() % 8 != 0 {
            return None;
        }
        Some(
            record
                .chunks_exact(8)
                .filter_map(|c| c.try_into().ok().map(f64::from_le_bytes))
                .collect(),
        )
    }

    /// 记录数与各记录长度
    pub fn summary(&self) -> Record {
        let lengths: Vec<usize> = self.records.iter().map(|r| r.len()).collect();
        Record::new()
            .with("n_records", self.records.len())
            .with("total_bytes", lengths.iter().sum::<usize>())
            .with("record_lengths", lengths)
    }
}
