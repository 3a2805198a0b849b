//! # SCF 扫描器
//!
//! 逐循环读取 SCF 输出。每个循环块形如：
//! ```text
//!  CHARGE NORMALIZATION FACTOR         1.00000000
//!  TOTAL ATOMIC CHARGES:
//!   10.1309150   9.8690850
//!  CYC   1 ETOT(AU) -2.748909000000E+02 DETOT -7.92E-02 tst  1.23E-03 PX  1.00E+00
//! ```
//! 循环编号必须严格连续；以 `== SCF ENDED - <状态> E(AU) e CYCLES n` 结束。
//!
//! ## 依赖关系
//! - 被 `parsers/stdout/mod.rs`, `parsers/stdout/optimisation.rs` 使用
//! - 使用 `parsers/numbers.rs`

use super::HARTREE_TO_EV;
use crate::error::{ScanError, ScanResult};
use crate::models::{Record, Value};
use crate::parsers::numbers::{extract_numbers, first_number, is_numeric_row, number_after};

pub const SCF_START: &str = "CRYSTAL - SCF - TYPE OF CALCULATION";
pub const SCF_END: &str = "SCF ENDED";

/// 读取从 `start` 起的多行折叠数组，直到遇到非纯数值行
fn read_wrapped_array(lines: &[&str], start: usize, end: usize) -> (usize, Vec<f64>) {
    let mut values = Vec::new();
    let mut idx = start;
    while idx < end && is_numeric_row(lines[idx]) {
        values.extend(extract_numbers(lines[idx]));
        idx += 1;
    }
    (idx, values)
}

/// 解析 `SCF ENDED` 行
///
/// 返回 (状态文本, 最终能量 eV, 循环数)。
pub fn parse_scf_end(line: &str) -> (String, Option<f64>, Option<i64>) {
    let after = line
        .find(SCF_END)
        .map(|pos| &line[pos + SCF_END.len()..])
        .unwrap_or(line);
    let status = after
        .trim_start()
        .trim_start_matches('-')
        .split("E(AU)")
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    let energy = number_after(line, "E(AU)").map(|e| e * HARTREE_TO_EV);
    // 状态文本本身可能含 "CYCLES"（TOO MANY CYCLES），取最后一次出现
    let cycles = line
        .rfind("CYCLES")
        .and_then(|pos| first_number(&line[pos + "CYCLES".len()..]))
        .map(|n| n as i64);
    (status, energy, cycles)
}

/// 读取一个 SCF 段
///
/// 窗口 `[start, end)` 必须包含 `SCF ENDED` 行；返回该行之后的行号与
/// `{cycles, converged, status, final_energy, n_cycles}`。
pub fn read_scf(lines: &[&str], start: usize, end: usize) -> ScanResult<(usize, Record)> {
    let end = end.min(lines.len());
    let mut cycles: Vec<Value> = Vec::new();
    let mut pending = Record::new();
    let mut last_cycle: Option<i64> = None;
    let mut record = Record::new();

    let mut idx = start;
    while idx < end {
        let line = lines[idx];
        let trimmed = line.trim_start();

        if line.contains(SCF_START) {
            if let Some((_, kind)) = line.split_once(':') {
                record.insert("type", kind.trim());
            }
        } else if line.contains("CHARGE NORMALIZATION FACTOR") {
            if let Some(v) = number_after(line, "CHARGE NORMALIZATION FACTOR") {
                pending.insert("charge_normalization", v);
            }
        } else if trimmed.starts_with("TOTAL ATOMIC CHARGES") {
            let (next, values) = read_wrapped_array(lines, idx + 1, end);
            pending.insert("atomic_charges", values);
            idx = next;
            continue;
        } else if trimmed.starts_with("TOTAL ATOMIC SPINS") {
            let (next, values) = read_wrapped_array(lines, idx + 1, end);
            pending.insert("atomic_spins", values);
            idx = next;
            continue;
        } else if trimmed.starts_with("CYC ") {
            // "CYC   1 ETOT(AU) -2.748909000000E+02 DETOT -7.92E-02 tst ..."
            let values = extract_numbers(line);
            if values.len() < 3 || !line.contains("ETOT(AU)") {
                return Err(ScanError::unexpected(idx, "CYC n ETOT(AU) e DETOT d", line.trim()));
            }
            let number = values[0] as i64;
            if let Some(previous) = last_cycle {
                if number != previous + 1 {
                    return Err(ScanError::unexpected(
                        idx,
                        format!("CYC {}", previous + 1),
                        format!("CYC {}", number),
                    ));
                }
            }
            last_cycle = Some(number);

            let mut cycle = std::mem::take(&mut pending);
            cycle.insert("cycle", number);
            cycle.insert(
                "energy",
                Record::new()
                    .with("total", values[1] * HARTREE_TO_EV)
                    .with("change", values[2] * HARTREE_TO_EV),
            );
            cycles.push(Value::Record(cycle));
        } else if line.contains(SCF_END) {
            let (status, energy, n_cycles) = parse_scf_end(line);
            record.insert("converged", status.starts_with("CONVERGENCE ON"));
            record.insert("status", status);
            record.insert("final_energy", energy);
            record.insert("n_cycles", n_cycles);
            record.insert("cycles", cycles);
            return Ok((idx + 1, record));
        }
        idx += 1;
    }

    Err(ScanError::eof(end, SCF_END))
}
