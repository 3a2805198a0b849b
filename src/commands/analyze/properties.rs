//! # properties 输出分析
//!
//! ## 依赖关系
//! - 使用 `parsers/properties.rs`
//! - 与 `commands/parse.rs` 共用 JSON 输出格式

use crate::cli::analyze::PropertiesArgs;
use crate::commands::parse::outcome_json;
use crate::error::Result;
use crate::models::Value;
use crate::parsers;
use crate::utils::{self, output};

/// 执行 properties 分析
pub fn execute(args: PropertiesArgs) -> Result<()> {
    output::print_header("Analyzing Properties Output");

    let outcome = parsers::parse_properties_file(&args.input)?;
    let data = &outcome.data;

    if let Some(fermi) = data.get_path(&["newk", "fermi_energy"]).and_then(Value::as_f64) {
        output::print_info(&format!("Fermi energy: {:.4} eV", fermi));
    }
    if let Some(n) = data.get_path(&["doss", "n_points"]).and_then(Value::as_i64) {
        let projections = data
            .get_path(&["doss", "n_projections"])
            .and_then(Value::as_i64)
            .unwrap_or(0);
        output::print_info(&format!("DOSS: {} points, {} projections", n, projections));
    }
    for message in &outcome.diagnostics.parser_errors {
        output::print_error(&format!("parser: {}", message));
    }
    output::print_exit(outcome.exit_code);

    utils::emit_json(&outcome_json(&outcome), args.output.as_deref())
}
