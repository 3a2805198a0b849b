//! # parse 子命令实现
//!
//! 解析单个 CRYSTAL 主输出，打印摘要表并输出 JSON。
//!
//! ## 依赖关系
//! - 使用 `cli/parse.rs` 定义的参数
//! - 使用 `parsers/stdout/`
//! - 被 `commands/collect.rs` 复用摘要提取

use crate::cli::parse::ParseArgs;
use crate::error::Result;
use crate::models::{Record, Value};
use crate::parsers::{self, stdout::StdoutOutcome};
use crate::utils::{self, output};

use tabled::{Table, Tabled};

/// 摘要表的一行
#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// 一次运行的关键数值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub crystal_version: Option<i64>,
    pub n_atoms: Option<i64>,
    pub scf_cycles: Option<i64>,
    pub opt_steps: usize,
    pub initial_energy: Option<f64>,
    pub final_energy: Option<f64>,
    /// 最终带隙 (eV)，自旋极化时取 alpha 通道
    pub band_gap: Option<f64>,
    pub elapsed_time: Option<f64>,
    pub exit_code: Option<String>,
}

fn first_gap(record: &Record) -> Option<f64> {
    let gaps = record.get_record("band_gaps")?;
    ["unpolarised", "alpha"]
        .into_iter()
        .find_map(|channel| gaps.get_path(&[channel, "energy"]))
        .and_then(Value::as_f64)
}

/// 从解析结果中提取摘要
pub fn summarize(outcome: &StdoutOutcome) -> RunSummary {
    let data = &outcome.data;
    let f64_at = |path: &[&str]| data.get_path(path).and_then(Value::as_f64);
    let i64_at = |path: &[&str]| data.get_path(path).and_then(Value::as_i64);

    let band_gap = data
        .get_record("final")
        .and_then(first_gap)
        .or_else(|| data.get_record("initial").and_then(first_gap));

    RunSummary {
        crystal_version: i64_at(&["header", "crystal_version"]),
        n_atoms: i64_at(&["final", "primitive_cell", "n_atoms"])
            .or_else(|| i64_at(&["initial", "primitive_cell", "n_atoms"])),
        scf_cycles: i64_at(&["initial", "scf", "n_cycles"]),
        opt_steps: data
            .get("optimisation")
            .and_then(Value::as_list)
            .map(|s| s.len())
            .unwrap_or(0),
        initial_energy: f64_at(&["initial", "energy", "total"]),
        final_energy: f64_at(&["final", "energy", "total"]),
        band_gap,
        elapsed_time: f64_at(&["meta", "elapsed_time"]),
        exit_code: outcome.exit_code.map(|c| c.as_str().to_string()),
    }
}

/// 结果 JSON：解析数据加退出分类
pub fn outcome_json(outcome: &StdoutOutcome) -> Record {
    let mut data = outcome.data.clone();
    data.insert("exit_code", outcome.exit_code.map(|c| c.as_str()));
    data
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_summary(summary: &RunSummary) {
    let rows = vec![
        SummaryRow {
            property: "CRYSTAL version".to_string(),
            value: fmt_opt(summary.crystal_version),
        },
        SummaryRow {
            property: "Atoms (primitive)".to_string(),
            value: fmt_opt(summary.n_atoms),
        },
        SummaryRow {
            property: "SCF cycles".to_string(),
            value: fmt_opt(summary.scf_cycles),
        },
        SummaryRow {
            property: "Optimisation steps".to_string(),
            value: summary.opt_steps.to_string(),
        },
        SummaryRow {
            property: "Initial energy (eV)".to_string(),
            value: fmt_opt(summary.initial_energy.map(|e| format!("{:.6}", e))),
        },
        SummaryRow {
            property: "Final energy (eV)".to_string(),
            value: fmt_opt(summary.final_energy.map(|e| format!("{:.6}", e))),
        },
        SummaryRow {
            property: "Band gap (eV)".to_string(),
            value: fmt_opt(summary.band_gap.map(|g| format!("{:.4}", g))),
        },
        SummaryRow {
            property: "Elapsed (s)".to_string(),
            value: fmt_opt(summary.elapsed_time.map(|t| format!("{:.1}", t))),
        },
    ];
    println!("{}", Table::new(&rows));
}

/// 执行 parse 命令
pub fn execute(args: ParseArgs) -> Result<()> {
    output::print_header("Parsing CRYSTAL Output");
    output::print_info(&format!("Reading '{}'", args.input.display()));

    let outcome = parsers::parse_stdout_file(&args.input)?;

    for message in &outcome.diagnostics.errors {
        output::print_warning(&format!("engine: {}", message));
    }
    for message in &outcome.diagnostics.parser_errors {
        output::print_error(&format!("parser: {}", message));
    }
    log::debug!("{} parser warnings", outcome.diagnostics.parser_warnings.len());

    print_summary(&summarize(&outcome));
    output::print_exit(outcome.exit_code);

    if args.summary {
        return Ok(());
    }
    utils::emit_json(&outcome_json(&outcome), args.output.as_deref())?;
    if let Some(path) = &args.output {
        output::print_success(&format!("JSON written to '{}'", path.display()));
    }
    Ok(())
}
