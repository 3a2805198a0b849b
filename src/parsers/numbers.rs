//! # 数值提取器
//!
//! 从任意文本行中按出现顺序提取浮点数。容忍：
//! - 缺少前导零（`.5` -> 0.5）
//! - 无空格相连的负数（`-1-2` -> [-1, -2]）
//! - 指数符号两侧带空格的科学计数法（`1.0E- 03`）
//!
//! ## 依赖关系
//! - 被所有 `parsers/stdout/` 扫描器和 `parsers/table.rs` 使用
//! - 使用 `regex` crate

use regex::Regex;
use std::sync::LazyLock;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE]\s*[-+]?\s*\d+)?")
        .expect("number regex is valid")
});

/// 提取一行中的全部数值
pub fn extract_numbers(line: &str) -> Vec<f64> {
    NUMBER_RE
        .find_iter(line)
        .filter_map(|m| {
            let compact: String = m.as_str().chars().filter(|c| !c.is_whitespace()).collect();
            compact.parse::<f64>().ok()
        })
        .collect()
}

/// 一行中数值的个数
pub fn count_numbers(line: &str) -> usize {
    NUMBER_RE.find_iter(line).count()
}

/// 纯数值行：空白分隔的 token 数等于可提取的数值个数（且非空）
///
/// 用于识别多行折叠数组的续行，以及表格在何处结束。
pub fn is_numeric_row(line: &str) -> bool {
    let tokens = line.split_whitespace().count();
    tokens > 0 && tokens == count_numbers(line)
}

/// 提取第一个数值
pub fn first_number(line: &str) -> Option<f64> {
    extract_numbers(line).into_iter().next()
}

/// 提取标记之后的第一个数值
pub fn number_after(line: &str, marker: &str) -> Option<f64> {
    let pos = line.find(marker)?;
    first_number(&line[pos + marker.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_numbers() {
        assert_eq!(extract_numbers(" 1 2"), vec![1.0, 2.0]);
        assert_eq!(extract_numbers("a 3.5 b -2"), vec![3.5, -2.0]);
    }

    #[test]
    fn test_missing_leading_zero() {
        assert_eq!(extract_numbers(".5"), vec![0.5]);
        assert_eq!(extract_numbers("x -.25"), vec![-0.25]);
    }

    #[test]
    fn test_concatenated_negatives() {
        assert_eq!(extract_numbers("-1-2"), vec![-1.0, -2.0]);
        assert_eq!(extract_numbers("1.5-2.5-3.5"), vec![1.5, -2.5, -3.5]);
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(extract_numbers("1e-3-2"), vec![0.001, -2.0]);
        assert_eq!(
            extract_numbers("ETOT(AU) -2.755E+02 DETOT -1.2E-01"),
            vec![-275.5, -0.12]
        );
        assert_eq!(extract_numbers("1.0E- 03"), vec![0.001]);
        assert_eq!(extract_numbers("2.5e +2"), vec![250.0]);
    }

    #[test]
    fn test_no_numbers() {
        assert!(extract_numbers("ALPHA+BETA ELECTRONS").is_empty());
        assert!(extract_numbers("").is_empty());
    }

    #[test]
    fn test_numeric_row() {
        assert!(is_numeric_row("  1.993   1.993  -0.5"));
        assert!(!is_numeric_row("   1 MG  12  10.048"));
        assert!(!is_numeric_row("   "));
        // 相连的负数使 token 数与数值个数不一致
        assert!(!is_numeric_row("-1.0-2.0"));
    }

    #[test]
    fn test_number_after() {
        assert_eq!(number_after("TELAPSE        29.75 TCPU   29.63", "TELAPSE"), Some(29.75));
        assert_eq!(number_after("no marker here", "TELAPSE"), None);
    }
}
