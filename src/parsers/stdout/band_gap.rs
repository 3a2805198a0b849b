//! # 带隙扫描器
//!
//! 带隙块由连续的 `TOP OF VALENCE BANDS` / `BOTTOM OF VIRTUAL BANDS` / 空行 /
//! 带隙行组成。SCF 每个循环都可能打印一次，窗口内以最后一个块为准。
//!
//! ## 依赖关系
//! - 被 `parsers/stdout/mod.rs` 使用

use crate::error::{ScanError, ScanResult};
use crate::models::Record;
use regex::Regex;
use std::sync::LazyLock;

// "ALPHA      INDIRECT ENERGY BAND GAP:   7.8342 eV"
// "DIRECT ENERGY BAND GAP:   9.3215 eV"
static GAP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(ALPHA|BETA)\s+)?(DIRECT|INDIRECT)\s+ENERGY BAND GAP:\s*([-+]?\d*\.?\d+(?:[eE][-+]?\d+)?)")
        .expect("band gap regex is valid")
});

fn is_block_line(line: &str) -> bool {
    line.trim().is_empty()
        || line.contains("TOP OF VALENCE BANDS")
        || line.contains("BOTTOM OF VIRTUAL BANDS")
        || GAP_RE.is_match(line)
}

/// 读取从 `start` 开始的一个带隙块
///
/// 返回块之后的行号与 `{alpha|beta|unpolarised: {energy, direct}}`。
pub fn read_band_gap_block(lines: &[&str], start: usize, end: usize) -> ScanResult<(usize, Record)> {
    let mut gaps = Record::new();
    let mut idx = start;
    while idx < end && is_block_line(lines[idx]) {
        if let Some(caps) = GAP_RE.captures(lines[idx]) {
            let channel = match caps.get(1).map(|m| m.as_str()) {
                Some("ALPHA") => "alpha",
                Some("BETA") => "beta",
                _ => "unpolarised",
            };
            if gaps.contains_key(channel) {
                return Err(ScanError::Duplicate {
                    line: idx,
                    what: format!("{} band gap", channel),
                });
            }
            let energy: f64 = caps[3].parse().map_err(|_| ScanError::Conversion {
                line: idx,
                field: "band gap".to_string(),
                token: caps[3].to_string(),
            })?;
            gaps.insert(
                channel,
                Record::new()
                    .with("energy", energy)
                    .with("direct", &caps[2] == "DIRECT"),
            );
        }
        idx += 1;
    }
    Ok((idx, gaps))
}

/// 在窗口内查找所有带隙块，返回最后一个非空块
pub fn read_band_gaps(lines: &[&str], start: usize, end: usize) -> ScanResult<Option<Record>> {
    let end = end.min(lines.len());
    let mut last = None;
    let mut idx = start;
    while idx < end {
        let line = lines[idx];
        if line.contains("TOP OF VALENCE BANDS") || GAP_RE.is_match(line) {
            let (next, gaps) = read_band_gap_block(lines, idx, end)?;
            if !gaps.is_empty() {
                last = Some(gaps);
            }
            idx = next.max(idx + 1);
        } else {
            idx += 1;
        }
    }
    Ok(last)
}
