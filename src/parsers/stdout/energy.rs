//! # SCF 后能量扫描器
//!
//! ```text
//!  TOTAL ENERGY(DFT)(AU)( 10) -2.7565697724867E+02 DE-5.4E-09 tst 1.1E-09 PX 1.8E-05
//!  TOTAL ENERGY + DISP (AU)      -2.7566012345678E+02
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/stdout/mod.rs`, `parsers/stdout/optimisation.rs` 使用

use super::HARTREE_TO_EV;
use crate::error::{ScanError, ScanResult};
use crate::models::Record;
use crate::parsers::numbers::number_after;
use regex::Regex;
use std::sync::LazyLock;

static TOTAL_ENERGY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"TOTAL ENERGY\(([^)]+)\)\(AU\)\(\s*(\d+)\)\s*([-+]?\d*\.?\d+(?:[eE][-+]?\d+)?)")
        .expect("total energy regex is valid")
});

const DISPERSION_MARKER: &str = "TOTAL ENERGY + DISP (AU)";

/// 读取窗口内最后一次打印的总能量与色散校正能量
///
/// 返回 `energy {total, method, total_corrected}`（eV）；窗口内没有能量行时为空记录。
pub fn read_post_scf(lines: &[&str], start: usize, end: usize) -> ScanResult<Record> {
    let end = end.min(lines.len());
    let mut energy = Record::new();

    for (idx, line) in lines.iter().enumerate().take(end).skip(start) {
        if let Some(caps) = TOTAL_ENERGY_RE.captures(line) {
            let total: f64 = caps[3].parse().map_err(|_| ScanError::Conversion {
                line: idx,
                field: "TOTAL ENERGY".to_string(),
                token: caps[3].to_string(),
            })?;
            energy.insert("total", total * HARTREE_TO_EV);
            energy.insert("method", caps[1].trim());
        } else if line.contains(DISPERSION_MARKER) {
            let value = number_after(line, DISPERSION_MARKER)
                .ok_or_else(|| ScanError::unexpected(idx, "TOTAL ENERGY + DISP (AU) <e>", line.trim()))?;
            energy.insert("total_corrected", value * HARTREE_TO_EV);
        }
    }

    if energy.is_empty() {
        return Ok(Record::new());
    }
    Ok(Record::new().with("energy", energy))
}
