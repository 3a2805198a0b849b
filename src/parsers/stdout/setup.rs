//! # 计算设置扫描器
//!
//! 读取几何与 SCF 之间打印的计算设置摘要（原子数、壳层数、电子数、k 点网格等）。
//!
//! ## 依赖关系
//! - 被 `parsers/stdout/mod.rs` 使用
//! - 使用 `parsers/numbers.rs`

use crate::models::Record;
use crate::parsers::numbers::{extract_numbers, number_after};

/// 整数设置项：(输出键, 行内标记)
const COUNTS: &[(&str, &str)] = &[
    ("n_atoms", "N. OF ATOMS PER CELL"),
    ("n_shells", "NUMBER OF SHELLS"),
    ("n_ao", "NUMBER OF AO"),
    ("n_electrons", "N. OF ELECTRONS PER CELL"),
    ("n_core_el", "CORE ELECTRONS PER CELL"),
    ("n_symops", "N. OF SYMMETRY OPERATORS"),
    ("n_kpoints_ibz", "NUMBER OF K POINTS IN THE IBZ"),
    ("n_kpoints_gilat", "NUMBER OF K POINTS(GILAT NET)"),
];

/// 读取窗口内的设置摘要
///
/// 返回 `calculation` 记录；窗口内未出现任何设置项时返回空记录。
pub fn read_setup(lines: &[&str], start: usize, end: usize) -> Record {
    let mut calc = Record::new();

    for line in &lines[start..end.min(lines.len())] {
        // "TYPE OF CALCULATION :  RESTRICTED CLOSED SHELL"
        if line.contains("TYPE OF CALCULATION") && !calc.contains_key("type") {
            if let Some((_, value)) = line.split_once(':') {
                let value = value.trim();
                calc.insert("type", value);
                calc.insert("spin", value.contains("UNRESTRICTED"));
            }
        }

        for (key, marker) in COUNTS {
            if calc.contains_key(key) {
                continue;
            }
            if let Some(v) = number_after(line, marker) {
                calc.insert(*key, v as i64);
            }
        }

        // "SHRINK. FACT.(MONKH.)    8  8  8  NUMBER OF K POINTS IN THE IBZ     29"
        if let Some(pos) = line.find("SHRINK. FACT.(MONKH.)") {
            let rest = &line[pos + "SHRINK. FACT.(MONKH.)".len()..];
            let mesh = rest.split("NUMBER OF").next().unwrap_or("");
            let values: Vec<i64> = extract_numbers(mesh).into_iter().map(|v| v as i64).collect();
            if !values.is_empty() {
                calc.insert("k_points", values);
            }
        }
    }

    calc
}
