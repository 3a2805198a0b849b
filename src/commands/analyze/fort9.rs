//! # fort.9 记录分析
//!
//! fort.9 是无格式 Fortran 顺序文件，只能列出记录结构。
//! 每条记录同时按 i32 与 f64 试读前几个值，便于人工辨认。
//!
//! ## 依赖关系
//! - 使用 `parsers/fort9.rs`

use crate::cli::analyze::Fort9Args;
use crate::error::Result;
use crate::models::Value;
use crate::parsers;
use crate::utils::output;

use tabled::{Table, Tabled};

const PREVIEW: usize = 3;

#[derive(Debug, Clone, Tabled)]
struct RecordRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Bytes")]
    bytes: usize,
    #[tabled(rename = "As i32")]
    ints: String,
    #[tabled(rename = "As f64")]
    floats: String,
}

/// 前几个值的预览，长度不整除时为 "-"
fn preview<T: std::fmt::Display>(values: Option<Vec<T>>, format: fn(&T) -> String) -> String {
    match values {
        Some(v) if v.is_empty() => String::new(),
        Some(v) => {
            let mut head: Vec<String> = v.iter().take(PREVIEW).map(format).collect();
            if v.len() > PREVIEW {
                head.push(format!("... ({})", v.len()));
            }
            head.join(" ")
        }
        None => "-".to_string(),
    }
}

/// 执行 fort.9 分析
pub fn execute(args: Fort9Args) -> Result<()> {
    output::print_header("Analyzing fort.9");

    let fort9 = parsers::read_fort9_file(&args.input)?;
    let summary = fort9.summary();
    let count = |key: &str| summary.get(key).and_then(Value::as_i64).unwrap_or(0);
    output::print_info(&format!(
        "{} records, {} payload bytes",
        count("n_records"),
        count("total_bytes")
    ));

    if args.records {
        let rows: Vec<RecordRow> = (0..fort9.records.len())
            .map(|i| RecordRow {
                index: i + 1,
                bytes: fort9.records[i].len(),
                ints: preview(fort9.i32s(i), |v| v.to_string()),
                floats: preview(fort9.f64s(i), |v| format!("{:.6e}", v)),
            })
            .collect();
        println!("{}", Table::new(&rows));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview(Some(vec![1, 2]), |v| v.to_string()), "1 2");
        assert_eq!(preview(Some(vec![1, 2, 3, 4]), |v| v.to_string()), "1 2 3 ... (4)");
        assert_eq!(preview::<i32>(None, |v| v.to_string()), "-");
    }
}
