//! # CRYSTAL properties 输出解析器
//!
//! properties 程序的 stdout 与主程序共用横幅、错误/警告格式和终止标记，
//! 因此复用 `parsers/stdout` 的预扫描、版本读取与退出分类。
//!
//! 读取的段：
//! - NEWK：k 点网格与 Fermi 能级
//! - DOSS：投影数、能量点数与能量范围
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `commands/analyze/properties.rs` 使用
//! - 使用 `parsers/stdout/mod.rs`, `parsers/stdout/setup.rs`

use crate::error::{ScanError, ScanResult};
use crate::models::{Diagnostics, ExitCode, OutcomeFlags, Record};
use crate::parsers::numbers::{extract_numbers, number_after};
use crate::parsers::stdout::setup::read_setup;
use crate::parsers::stdout::{
    attempt, find_line, prescan, read_header, units_record, StdoutOutcome, HARTREE_TO_EV, RUN_END, RUN_START,
};

const FERMI_MARKERS: [&str; 2] = ["FERMI ENERGY", "EFERMI(AU)"];
const DOSS_PROJECTIONS: &str = "NUMBER OF PROJECTIONS";
const DOSS_POINTS: &str = "NUMBER OF ENERGY POINTS";
const DOSS_RANGE: &str = "ENERGY RANGE";

fn is_doss_landmark(line: &str) -> bool {
    let text = line.trim();
    text.starts_with("DOSS") || text.contains("DENSITY OF STATES")
}

/// NEWK 段：k 点设置与 Fermi 能级 (eV)
fn read_newk(lines: &[&str], start: usize, end: usize) -> Record {
    let mut newk = read_setup(lines, start, end);
    newk.remove("type");
    newk.remove("spin");

    let fermi = lines[start..end]
        .iter()
        .filter_map(|line| FERMI_MARKERS.iter().find_map(|m| number_after(line, m)))
        .last();
    if let Some(e) = fermi {
        newk.insert("fermi_energy", e * HARTREE_TO_EV);
    }
    newk
}

/// DOSS 段（`start` 为 DOSS 地标行）
fn read_doss(lines: &[&str], start: usize, end: usize) -> ScanResult<Record> {
    let mut doss = Record::new();

    let points_line = find_line(lines, start, end, DOSS_POINTS).ok_or_else(|| ScanError::eof(end, DOSS_POINTS))?;
    let n_points = number_after(lines[points_line], DOSS_POINTS)
        .ok_or_else(|| ScanError::unexpected(points_line, "NUMBER OF ENERGY POINTS <n>", lines[points_line].trim()))?;
    doss.insert("n_points", n_points as i64);

    if let Some(i) = find_line(lines, start, end, DOSS_PROJECTIONS) {
        if let Some(n) = number_after(lines[i], DOSS_PROJECTIONS) {
            doss.insert("n_projections", n as i64);
        }
    }

    // " ENERGY RANGE (AU)   -0.80000  0.40000"
    if let Some(i) = find_line(lines, start, end, DOSS_RANGE) {
        let line = lines[i];
        let values = extract_numbers(&line[line.find(DOSS_RANGE).unwrap_or(0) + DOSS_RANGE.len()..]);
        if values.len() < 2 {
            return Err(ScanError::FieldCount {
                line: i,
                expected: 2,
                found: values.len(),
            });
        }
        doss.insert("energy_range", vec![values[0] * HARTREE_TO_EV, values[1] * HARTREE_TO_EV]);
    }

    Ok(doss)
}

/// 解析 properties 程序的 stdout
pub fn read_properties_stdout(content: &str) -> StdoutOutcome {
    let mut diagnostics = Diagnostics::new();
    let flags = OutcomeFlags::default();
    let mut data = Record::new().with("units", units_record());

    if content.trim().is_empty() {
        let mut outcome = StdoutOutcome::finish(data, diagnostics, flags);
        outcome.exit_code = Some(ExitCode::ErrorStdoutEmpty);
        return outcome;
    }

    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();

    if let Some(elapsed) = prescan(&lines, &mut diagnostics) {
        data.insert("meta", Record::new().with("elapsed_time", elapsed));
    }

    let Some(start) = find_line(&lines, 0, total, RUN_START) else {
        diagnostics.report_scan_failure("header", ScanError::eof(total, RUN_START));
        return StdoutOutcome::finish(data, diagnostics, flags);
    };

    let header = read_header(&lines, start);
    if !header.is_empty() {
        data.insert("header", header);
    }

    let body_end = match find_line(&lines, start, total, RUN_END) {
        Some(i) => i,
        None => {
            diagnostics.report_scan_failure("termination", ScanError::eof(total, RUN_END));
            total
        }
    };

    let doss_start = (start..body_end).find(|&i| is_doss_landmark(lines[i]));

    let newk = read_newk(&lines, start, doss_start.unwrap_or(body_end));
    if !newk.is_empty() {
        data.insert("newk", newk);
    }

    if let Some(d) = doss_start {
        if let Some(doss) = attempt(&mut diagnostics, "doss", read_doss(&lines, d, body_end)) {
            data.insert("doss", doss);
        }
    }

    StdoutOutcome::finish(data, diagnostics, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PROPERTIES: &str = " *******************************************************************************
 *                              CRYSTAL17                                      *
 *                      public : 1.0.2 - Oct 7th, 2018                         *
 *******************************************************************************
 EEEEEEEEEE STARTING  DATE 18 10 2026 TIME 10:00:00.0
 NEWK
 SHRINK. FACT.(MONKH.)   12 12 12  NUMBER OF K POINTS IN THE IBZ     72
 SHRINKING FACTOR(GILAT NET)   12  NUMBER OF K POINTS(GILAT NET)     72
 POSSIBLY CONDUCTING STATE - EFERMI(AU)  -0.1500000E+00
 DOSS - TOTAL AND PROJECTED DENSITY OF STATES
 NUMBER OF PROJECTIONS     2
 NUMBER OF ENERGY POINTS 300
 ENERGY RANGE (AU)   -0.80000  0.40000
 TELAPSE        1.25 TCPU        1.10
 EEEEEEEEEE TERMINATION  DATE 18 10 2026 TIME 10:00:01.3
";

    #[test]
    fn test_newk_and_doss() {
        let outcome = read_properties_stdout(PROPERTIES);
        assert_eq!(outcome.exit_code, None);

        let data = &outcome.data;
        assert_eq!(data.get_path(&["header", "crystal_version"]).and_then(|v| v.as_i64()), Some(17));
        assert_eq!(data.get_path(&["newk", "n_kpoints_ibz"]).and_then(|v| v.as_i64()), Some(72));
        assert!(data.get_path(&["newk", "type"]).is_none());
        assert_relative_eq!(
            data.get_path(&["newk", "fermi_energy"]).and_then(|v| v.as_f64()).unwrap(),
            -0.15 * HARTREE_TO_EV,
            max_relative = 1e-12
        );
        assert_eq!(data.get_path(&["doss", "n_points"]).and_then(|v| v.as_i64()), Some(300));
        assert_eq!(data.get_path(&["doss", "n_projections"]).and_then(|v| v.as_i64()), Some(2));
        let range = data.get_path(&["doss", "energy_range"]).and_then(|v| v.as_list()).unwrap();
        assert_relative_eq!(range[0].as_f64().unwrap(), -0.8 * HARTREE_TO_EV, max_relative = 1e-12);
        assert_eq!(data.get_path(&["meta", "elapsed_time"]).and_then(|v| v.as_f64()), Some(1.25));
    }

    #[test]
    fn test_doss_without_points_is_parser_error() {
        let text = PROPERTIES.replace(" NUMBER OF ENERGY POINTS 300\n", "");
        let outcome = read_properties_stdout(&text);
        assert_eq!(outcome.exit_code, Some(ExitCode::ErrorParsingStdout));
        assert_eq!(outcome.diagnostics.parser_errors.len(), 1);
        assert!(outcome.data.get("doss").is_none());
    }

    #[test]
    fn test_engine_error() {
        let text = PROPERTIES.replace(
            " NEWK\n",
            " NEWK\n ERROR **** NEWK **** FERMI ENERGY NOT DEFINED\n",
        );
        let outcome = read_properties_stdout(&text);
        assert_eq!(outcome.exit_code, Some(ExitCode::ErrorCrystalRun));
    }

    #[test]
    fn test_empty() {
        assert_eq!(
            read_properties_stdout("").exit_code,
            Some(ExitCode::ErrorStdoutEmpty)
        );
    }
}
