//! # Mulliken 布居扫描器
//!
//! ```text
//!  ALPHA+BETA ELECTRONS
//!  MULLIKEN POPULATION ANALYSIS - NO. OF ELECTRONS   20.000000
//!
//!   ATOM    Z CHARGE  A.O. POPULATION
//!
//!    1 MG  12 10.134  2.000  2.000  2.000  1.955  1.962
//!                     0.083
//!    2 O    8  9.866  1.994  1.000
//! ```
//! 每行 token 数与可提取数值个数一致时为续行；不一致或空行时表格结束。
//!
//! ## 依赖关系
//! - 被 `parsers/stdout/mod.rs` 使用
//! - 使用 `parsers/numbers.rs`

use crate::error::{ScanError, ScanResult};
use crate::models::structure::normalize_symbol;
use crate::models::{Record, Value};
use crate::parsers::numbers::{count_numbers, extract_numbers, is_numeric_row};

pub const MULLIKEN_LANDMARK: &str = "MULLIKEN POPULATION ANALYSIS";

/// 向前查找自旋通道标记的最大行数
const CHANNEL_LOOKBACK: usize = 6;

/// 自旋通道名
pub fn channel_before(lines: &[&str], landmark: usize) -> &'static str {
    let from = landmark.saturating_sub(CHANNEL_LOOKBACK);
    for line in lines[from..landmark].iter().rev() {
        if line.contains("ALPHA-BETA ELECTRONS") {
            return "alpha-beta";
        }
        if line.contains("ALPHA+BETA ELECTRONS") {
            return "alpha+beta";
        }
    }
    "alpha+beta"
}

struct AtomRow {
    id: i64,
    symbol: String,
    z: i64,
    electrons: f64,
    aos: Vec<f64>,
}

/// 原子行：`id SYMBOL Z value aos...`，除元素符号外全部为数值
fn parse_atom_row(line: &str) -> Option<AtomRow> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 || count_numbers(line) + 1 != tokens.len() {
        return None;
    }
    if !tokens[1].chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let id = tokens[0].parse().ok()?;
    let z = tokens[2].parse().ok()?;
    let electrons = tokens[3].parse().ok()?;
    let aos = tokens[4..].iter().filter_map(|t| t.parse().ok()).collect();
    Some(AtomRow {
        id,
        symbol: normalize_symbol(tokens[1]),
        z,
        electrons,
        aos,
    })
}

/// 读取一个 Mulliken 表
///
/// `start` 指向 `MULLIKEN POPULATION ANALYSIS` 行；返回 (表格之后的行号, 通道名, 通道记录)。
pub fn read_mulliken(lines: &[&str], start: usize, end: usize) -> ScanResult<(usize, &'static str, Record)> {
    let end = end.min(lines.len());
    let channel = channel_before(lines, start);

    let header = (start + 1..end)
        .find(|&i| {
            let t = lines[i].trim_start();
            t.starts_with("ATOM") && t.contains("CHARGE")
        })
        .ok_or_else(|| ScanError::eof(end, "ATOM Z CHARGE A.O. POPULATION"))?;

    let mut idx = header + 1;
    while idx < end && lines[idx].trim().is_empty() {
        idx += 1;
    }

    let mut rows: Vec<AtomRow> = Vec::new();
    while idx < end {
        let line = lines[idx];
        if line.trim().is_empty() {
            break;
        }
        if let Some(row) = parse_atom_row(line) {
            rows.push(row);
        } else if is_numeric_row(line) {
            match rows.last_mut() {
                Some(row) => row.aos.extend(extract_numbers(line)),
                None => return Err(ScanError::unexpected(idx, "atom row", line.trim())),
            }
        } else {
            break;
        }
        idx += 1;
    }

    if rows.is_empty() {
        return Err(ScanError::unexpected(idx, "atom row", lines.get(idx).map(|l| l.trim()).unwrap_or("")));
    }

    let mut record = Record::new()
        .with("ids", rows.iter().map(|r| r.id).collect::<Vec<_>>())
        .with("symbols", rows.iter().map(|r| r.symbol.clone()).collect::<Vec<_>>())
        .with("atomic_numbers", rows.iter().map(|r| r.z).collect::<Vec<_>>())
        .with("electrons", rows.iter().map(|r| r.electrons).collect::<Vec<_>>())
        .with(
            "aos",
            rows.iter().map(|r| Value::from(r.aos.clone())).collect::<Vec<_>>(),
        );
    if channel == "alpha+beta" {
        record.insert(
            "charges",
            rows.iter().map(|r| (r.z % 100) as f64 - r.electrons).collect::<Vec<_>>(),
        );
    }

    Ok((idx, channel, record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TABLE: &str = " ALPHA+BETA ELECTRONS
 MULLIKEN POPULATION ANALYSIS - NO. OF ELECTRONS   20.000000

  ATOM    Z CHARGE  A.O. POPULATION

    1 MG  12 10.134  2.000  2.000  2.000  1.955  1.962
                     0.083  0.134
    2 O    8  9.866  1.994  1.000

 OVERLAP POPULATION CONDENSED TO ATOMS FOR FIRST NEIGHBORS (T=CELL TRANSLATION)
";

    #[test]
    fn test_read_total_channel() {
        let lines: Vec<&str> = TABLE.lines().collect();
        let (next, channel, record) = read_mulliken(&lines, 1, lines.len()).unwrap();

        assert_eq!(channel, "alpha+beta");
        assert!(lines[next].trim().is_empty());
        let symbols: Vec<&str> = record
            .get("symbols")
            .and_then(|v| v.as_list())
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(symbols, vec!["Mg", "O"]);

        let aos = record.get("aos").and_then(|v| v.as_list()).unwrap();
        assert_eq!(aos[0].as_list().unwrap().len(), 7);
        assert_eq!(aos[1].as_list().unwrap().len(), 2);

        let charges: Vec<f64> = record
            .get("charges")
            .and_then(|v| v.as_list())
            .unwrap()
            .iter()
            .filter_map(|v| v.as_f64())
            .collect();
        assert_relative_eq!(charges[0], 1.866, epsilon = 1e-9);
        assert_relative_eq!(charges[1], -1.866, epsilon = 1e-9);
    }

    #[test]
    fn test_spin_channel_has_no_charges() {
        let text = TABLE.replace("ALPHA+BETA", "ALPHA-BETA");
        let lines: Vec<&str> = text.lines().collect();
        let (_, channel, record) = read_mulliken(&lines, 1, lines.len()).unwrap();
        assert_eq!(channel, "alpha-beta");
        assert!(record.get("charges").is_none());
    }

    #[test]
    fn test_missing_header() {
        let lines = vec![" MULLIKEN POPULATION ANALYSIS", " nothing else"];
        assert!(read_mulliken(&lines, 0, lines.len()).is_err());
    }
}
