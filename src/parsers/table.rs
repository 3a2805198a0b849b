//! # 表格读取器
//!
//! 读取由水平分隔线包围的定宽文本表格：
//! ```text
//! --------------------------------      <- 顶部边框
//!   No.  Label   Value                  <- 表头（可多行）
//! --------------------------------      <- 表头/表体分隔线
//!    1   Mg      1.234
//!    2   O       ******                 <- 溢出值 -> None
//! --------------------------------      <- 底部边框（或空行）
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/stdout/geometry.rs` 使用
//! - 使用 `error.rs` 中的 `ScanError`

use crate::error::{ScanError, ScanResult};

/// 单列的转换类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Str,
}

/// 表格单元
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Str(String),
    /// 以星号溢出打印的值
    None,
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// 表体在何处结束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEnd {
    /// 第三条分隔线
    Rule,
    /// 第一个空行（或文件结束）
    Blank,
}

/// 读取选项
#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    /// 将 6 个以上星号的 token 替换为 `Cell::None`
    pub star_to_none: bool,
    /// 分隔线字符
    pub rule: char,
    pub body_end: BodyEnd,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions {
            star_to_none: true,
            rule: '-',
            body_end: BodyEnd::Rule,
        }
    }
}

/// 列式表格
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// 表头行（已去除首尾空白）
    pub header: Vec<String>,
    /// (列名, 列数据)，保持字段顺序
    pub columns: Vec<(String, Vec<Cell>)>,
}

impl Table {
    /// 按列名取列
    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_slice())
    }

    /// 浮点列（遇到非数值时返回 None）
    pub fn floats(&self, name: &str) -> Option<Vec<f64>> {
        self.column(name)?.iter().map(Cell::as_f64).collect()
    }

    /// 行数
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    /// 表头合并为单行（空白规范化），用于布局比对
    pub fn header_text(&self) -> String {
        self.header
            .iter()
            .flat_map(|h| h.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 判断是否为分隔线：去除空白后以至少三个分隔字符开头
pub fn is_rule(line: &str, rule: char) -> bool {
    line.trim_start().chars().take(3).filter(|c| *c == rule).count() == 3
}

fn is_star_overflow(token: &str) -> bool {
    token.len() >= 6 && token.chars().all(|c| c == '*')
}

fn find_rule(lines: &[&str], from: usize, rule: char, what: &str) -> ScanResult<usize> {
    (from..lines.len())
        .find(|&i| is_rule(lines[i], rule))
        .ok_or_else(|| ScanError::eof(lines.len(), what))
}

fn convert(token: &str, kind: FieldKind, field: &str, line: usize, opts: &TableOptions) -> ScanResult<Cell> {
    if opts.star_to_none && is_star_overflow(token) {
        return Ok(Cell::None);
    }
    let fail = || ScanError::Conversion {
        line,
        field: field.to_string(),
        token: token.to_string(),
    };
    match kind {
        FieldKind::Int => token.parse().map(Cell::Int).map_err(|_| fail()),
        FieldKind::Float => token.parse().map(Cell::Float).map_err(|_| fail()),
        FieldKind::Str => Ok(Cell::Str(token.to_string())),
    }
}

/// 将一行拆分为恰好 `n` 个字段，最后一个字段保留内部空白
fn split_fields(line: &str, n: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = line.trim();
    while fields.len() + 1 < n && !rest.is_empty() {
        match rest.find(char::is_whitespace) {
            Some(pos) => {
                fields.push(&rest[..pos]);
                rest = rest[pos..].trim_start();
            }
            None => {
                fields.push(rest);
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        fields.push(rest);
    }
    fields
}

/// 读取表格
///
/// 返回下一个未消费的行号和列式数据。
pub fn read_table(
    lines: &[&str],
    start: usize,
    fields: &[(&str, FieldKind)],
    opts: TableOptions,
) -> ScanResult<(usize, Table)> {
    let top = find_rule(lines, start, opts.rule, "table top border")?;
    let divider = find_rule(lines, top + 1, opts.rule, "table header divider")?;

    let header = lines[top + 1..divider]
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    let mut columns: Vec<(String, Vec<Cell>)> = fields
        .iter()
        .map(|(name, _)| (name.to_string(), Vec::new()))
        .collect();

    let mut idx = divider + 1;
    loop {
        let Some(line) = lines.get(idx) else {
            match opts.body_end {
                BodyEnd::Blank => break,
                BodyEnd::Rule => return Err(ScanError::eof(idx, "table bottom border")),
            }
        };
        if is_rule(line, opts.rule) {
            if opts.body_end == BodyEnd::Rule {
                idx += 1;
            }
            break;
        }
        if line.trim().is_empty() {
            if opts.body_end == BodyEnd::Blank {
                break;
            }
            idx += 1;
            continue;
        }

        let tokens = split_fields(line, fields.len());
        if tokens.len() != fields.len() {
            return Err(ScanError::FieldCount {
                line: idx,
                expected: fields.len(),
                found: tokens.len(),
            });
        }
        for ((name, kind), (token, column)) in
            fields.iter().zip(tokens.iter().zip(columns.iter_mut()))
        {
            column.1.push(convert(token, *kind, name, idx, &opts)?);
        }
        idx += 1;
    }

    Ok((idx, Table { header, columns }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: [(&str, FieldKind); 3] = [
        ("index", FieldKind::Int),
        ("value", FieldKind::Float),
        ("label", FieldKind::Str),
    ];

    fn render(rows: &[(i64, f64, &str)]) -> String {
        let rule = "-".repeat(40);
        let mut text = format!("preamble\n{}\n  No.   Value    Label\n{}\n", rule, rule);
        for (i, v, l) in rows {
            text.push_str(&format!("{:5} {:10.4} {}\n", i, v, l));
        }
        text.push_str(&rule);
        text.push_str("\ntrailer\n");
        text
    }

    #[test]
    fn test_round_trip_three_rows() {
        let rows = [(1, 0.5, "Mg core"), (2, -1.25, "O"), (3, 10.0, "O shell")];
        let text = render(&rows);
        let lines: Vec<&str> = text.lines().collect();

        let (next, table) = read_table(&lines, 0, &FIELDS, TableOptions::default()).unwrap();

        assert_eq!(lines[next], "trailer");
        assert_eq!(table.header_text(), "No. Value Label");
        assert_eq!(table.n_rows(), 3);
        let ints: Vec<i64> = table.column("index").unwrap().iter().filter_map(Cell::as_i64).collect();
        assert_eq!(ints, vec![1, 2, 3]);
        assert_eq!(table.floats("value").unwrap(), vec![0.5, -1.25, 10.0]);
        let labels: Vec<&str> = table.column("label").unwrap().iter().filter_map(Cell::as_str).collect();
        assert_eq!(labels, vec!["Mg core", "O", "O shell"]);
    }

    #[test]
    fn test_star_overflow_to_none() {
        let text = "---\nh\n---\n 1 ******** a\n---\n";
        let lines: Vec<&str> = text.lines().collect();
        let (_, table) = read_table(&lines, 0, &FIELDS, TableOptions::default()).unwrap();
        assert_eq!(table.column("value").unwrap()[0], Cell::None);
    }

    #[test]
    fn test_star_overflow_conversion_error() {
        let text = "---\nh\n---\n 1 ******** a\n---\n";
        let lines: Vec<&str> = text.lines().collect();
        let opts = TableOptions {
            star_to_none: false,
            ..TableOptions::default()
        };
        let err = read_table(&lines, 0, &FIELDS, opts).unwrap_err();
        assert!(matches!(err, ScanError::Conversion { line: 3, .. }));
    }

    #[test]
    fn test_missing_bottom_border() {
        let text = "---\nh\n---\n 1 1.0 a\n";
        let lines: Vec<&str> = text.lines().collect();
        let err = read_table(&lines, 0, &FIELDS, TableOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_missing_top_border() {
        let lines = vec!["no table here"];
        assert!(read_table(&lines, 0, &FIELDS, TableOptions::default()).is_err());
    }

    #[test]
    fn test_field_count_mismatch() {
        let text = "---\nh\n---\n 1 1.0\n---\n";
        let lines: Vec<&str> = text.lines().collect();
        let err = read_table(&lines, 0, &FIELDS, TableOptions::default()).unwrap_err();
        assert_eq!(
            err,
            ScanError::FieldCount {
                line: 3,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_star_rules_blank_end() {
        let text = "****\n ATOM X\n****\n 1 2.0 a\n 2 3.0 b\n\n more";
        let lines: Vec<&str> = text.lines().collect();
        let opts = TableOptions {
            rule: '*',
            body_end: BodyEnd::Blank,
            ..TableOptions::default()
        };
        let (next, table) = read_table(&lines, 0, &FIELDS, opts).unwrap();
        assert_eq!(next, 5);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.header, vec!["ATOM X".to_string()]);
    }
}
