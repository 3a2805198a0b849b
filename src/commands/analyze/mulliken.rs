//! # Mulliken 电荷分析
//!
//! 输入可以是 PPAN.DAT，也可以是含 Mulliken 布居的主输出。
//! 含有运行起始横幅的文件按主输出处理。
//!
//! ## 依赖关系
//! - 使用 `parsers/ppan.rs`, `parsers/stdout/`

use crate::cli::analyze::MullikenArgs;
use crate::error::{CrystoolError, Result};
use crate::models::structure::symbol_from_number;
use crate::models::{Record, Value};
use crate::parsers::{self, ppan, stdout};
use crate::utils::{self, output};

use tabled::{Table, Tabled};

#[derive(Debug, Clone, PartialEq, Tabled)]
struct ChargeRow {
    #[tabled(rename = "Atom")]
    atom: usize,
    #[tabled(rename = "Element")]
    element: String,
    #[tabled(rename = "Electrons")]
    electrons: String,
    #[tabled(rename = "Charge")]
    charge: String,
    #[tabled(rename = "Spin")]
    spin: String,
}

fn element(z: u32) -> String {
    symbol_from_number(z % 100).unwrap_or("X").to_string()
}

fn ppan_rows(ppan: &ppan::Ppan) -> Vec<ChargeRow> {
    let charges = ppan.charges();
    let spins = ppan.spins();
    ppan.channels
        .first()
        .map(|atoms| {
            atoms
                .iter()
                .enumerate()
                .map(|(i, a)| ChargeRow {
                    atom: i + 1,
                    element: element(a.atomic_number),
                    electrons: format!("{:.4}", a.total),
                    charge: format!("{:+.4}", charges[i]),
                    spin: spins
                        .as_ref()
                        .and_then(|s| s.get(i))
                        .map(|s| format!("{:+.4}", s))
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn floats(record: &Record, key: &str) -> Vec<f64> {
    record
        .get(key)
        .and_then(Value::as_list)
        .map(|l| l.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

fn stdout_rows(mulliken: &Record) -> Vec<ChargeRow> {
    let Some(total) = mulliken.get_record("alpha+beta") else {
        return Vec::new();
    };
    let electrons = floats(total, "electrons");
    let charges = floats(total, "charges");
    let spins = mulliken
        .get_record("alpha-beta")
        .map(|r| floats(r, "electrons"))
        .unwrap_or_default();
    let symbols: Vec<String> = total
        .get("symbols")
        .and_then(Value::as_list)
        .map(|l| l.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    electrons
        .iter()
        .enumerate()
        .map(|(i, e)| ChargeRow {
            atom: i + 1,
            element: symbols.get(i).cloned().unwrap_or_else(|| "X".to_string()),
            electrons: format!("{:.4}", e),
            charge: charges.get(i).map(|c| format!("{:+.4}", c)).unwrap_or_default(),
            spin: spins
                .get(i)
                .map(|s| format!("{:+.4}", s))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect()
}

/// 执行 Mulliken 分析
pub fn execute(args: MullikenArgs) -> Result<()> {
    output::print_header("Mulliken Charges");

    let content = parsers::read_text(&args.input)?;
    let (rows, record) = if content.contains(stdout::RUN_START) {
        let outcome = stdout::read_crystal_stdout(&content);
        let mulliken = outcome.data.get_record("mulliken").ok_or_else(|| CrystoolError::ParseError {
            format: "CRYSTAL stdout".to_string(),
            path: args.input.display().to_string(),
            reason: "no Mulliken population analysis found".to_string(),
        })?;
        (stdout_rows(mulliken), mulliken.clone())
    } else {
        let ppan = ppan::read_ppan(&content).map_err(|e| CrystoolError::ParseError {
            format: "PPAN.DAT".to_string(),
            path: args.input.display().to_string(),
            reason: e.to_string(),
        })?;
        (ppan_rows(&ppan), ppan.to_record())
    };

    if rows.is_empty() {
        output::print_warning("No atoms found.");
        return Ok(());
    }
    println!("{}", Table::new(&rows));

    if let Some(path) = &args.output {
        utils::emit_json(&record, Some(path.as_path()))?;
        output::print_success(&format!("Populations written to '{}'", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_from_stdout() {
        let outcome = stdout::read_crystal_stdout(include_str!("../../../testdata/mgo_optimisation.out"));
        let rows = stdout_rows(outcome.data.get_record("mulliken").unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].atom, 1);
        assert!(rows[0].charge.starts_with('+'));
    }

    #[test]
    fn test_element_strips_pseudopotential_offset() {
        assert_eq!(element(12), "Mg");
        assert_eq!(element(208), "O");
    }
}
