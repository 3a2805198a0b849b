//! # fort.25 DOSS 数据读取
//!
//! DOSS 计算把每个投影写成 fort.25 中的一个数据块：
//! ```text
//! -%-0DOSS    1  300 0.00000E+00 4.01338E-03-1.66054E-01
//!  0.00000E+00-8.00000E-01 0.00000E+00 0.00000E+00
//!     1    0
//!  1.23456E-01 2.34567E-01 ...
//! ```
//! 第一行：`NROW NPTS`，随后三个浮点数，依次为（保留字段, 能量步长, Fermi 能级）；
//! 第二行第二列是起始能量；第三行为投影编号；之后是 `NPTS` 个 DOS 值。
//! 数值占固定 12 字符宽度，相邻负数之间没有空格，只能按列宽切分。
//! 能量为 Hartree，读取后换算为 eV；DOS 值保持原单位 (states/Hartree)。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `commands/analyze/doss.rs` 使用

use crate::error::{ScanError, ScanResult};
use crate::parsers::stdout::HARTREE_TO_EV;

const BLOCK_MARKER: &str = "-%-";
const FIELD_WIDTH: usize = 12;
/// `-%-` + 1 位标志 + `DOSS`
const HEADER_PREFIX: usize = 8;
const INT_WIDTH: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DossF25 {
    /// 能量网格 (eV)
    pub energies: Vec<f64>,
    /// Fermi 能级 (eV)
    pub fermi_energy: f64,
    /// 每个投影一列
    pub projections: Vec<Vec<f64>>,
}

/// 按固定列宽切分
fn fixed_fields(line: &str, width: usize) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    while start < line.len() {
        let end = (start + width).min(line.len());
        let Some(field) = line.get(start..end) else {
            break;
        };
        if !field.trim().is_empty() {
            fields.push(field.trim());
        }
        start = end;
    }
    fields
}

fn parse_field<T: std::str::FromStr>(token: &str, line: usize, field: &str) -> ScanResult<T> {
    token.parse().map_err(|_| ScanError::Conversion {
        line,
        field: field.to_string(),
        token: token.to_string(),
    })
}

struct Block {
    n_points: usize,
    step: f64,
    fermi: f64,
    first_energy: f64,
    values: Vec<f64>,
}

fn read_block(lines: &[&str], start: usize) -> ScanResult<(usize, Block)> {
    let header = lines[start];
    let kind = header.get(3..HEADER_PREFIX).unwrap_or("");
    if !kind.ends_with("DOSS") {
        return Err(ScanError::unexpected(start, "-%-?DOSS", header.trim()));
    }
    let rest = header.get(HEADER_PREFIX..).unwrap_or("");
    let ints = rest.get(..2 * INT_WIDTH).unwrap_or("");
    let n_points: usize = parse_field(ints.get(INT_WIDTH..).unwrap_or("").trim(), start, "NPTS")?;
    let floats = fixed_fields(rest.get(2 * INT_WIDTH..).unwrap_or(""), FIELD_WIDTH);
    if floats.len() != 3 {
        return Err(ScanError::FieldCount {
            line: start,
            expected: 3,
            found: floats.len(),
        });
    }
    let step: f64 = parse_field(floats[1], start, "energy step")?;
    let fermi: f64 = parse_field(floats[2], start, "Fermi energy")?;

    let second = lines.get(start + 1).ok_or_else(|| ScanError::eof(start + 1, "energy origin line"))?;
    let origin = fixed_fields(second, FIELD_WIDTH);
    if origin.len() < 2 {
        return Err(ScanError::FieldCount {
            line: start + 1,
            expected: 4,
            found: origin.len(),
        });
    }
    let first_energy: f64 = parse_field(origin[1], start + 1, "first energy")?;

    if start + 2 >= lines.len() {
        return Err(ScanError::eof(start + 2, "projection index line"));
    }

    let mut values = Vec::with_capacity(n_points);
    let mut idx = start + 3;
    while values.len() < n_points {
        let line = lines.get(idx).ok_or_else(|| ScanError::eof(idx, format!("{} DOS values", n_points)))?;
        if line.starts_with(BLOCK_MARKER) {
            return Err(ScanError::FieldCount {
                line: idx,
                expected: n_points,
                found: values.len(),
            });
        }
        for token in fixed_fields(line, FIELD_WIDTH) {
            values.push(parse_field(token, idx, "DOS")?);
        }
        idx += 1;
    }
    if values.len() != n_points {
        return Err(ScanError::FieldCount {
            line: idx - 1,
            expected: n_points,
            found: values.len(),
        });
    }

    Ok((
        idx,
        Block {
            n_points,
            step,
            fermi,
            first_energy,
            values,
        },
    ))
}

/// 读取 fort.25 中全部 DOSS 块
pub fn read_doss_f25(text: &str) -> ScanResult<DossF25> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks: Vec<Block> = Vec::new();

    let mut idx = 0;
    while idx < lines.len() {
        if lines[idx].starts_with(BLOCK_MARKER) {
            let (next, block) = read_block(&lines, idx)?;
            if let Some(first) = blocks.first() {
                if block.n_points != first.n_points || block.first_energy != first.first_energy {
                    return Err(ScanError::unexpected(
                        idx,
                        format!("{} points from {}", first.n_points, first.first_energy),
                        format!("{} points from {}", block.n_points, block.first_energy),
                    ));
                }
            }
            blocks.push(block);
            idx = next;
        } else {
            idx += 1;
        }
    }

    let first = blocks.first().ok_or_else(|| ScanError::eof(lines.len(), BLOCK_MARKER))?;
    let energies = (0..first.n_points)
        .map(|i| (first.first_energy + i as f64 * first.step) * HARTREE_TO_EV)
        .collect();
    let fermi_energy = first.fermi * HARTREE_TO_EV;
    log::debug!("fort.25: {} DOSS projections", blocks.len());

    Ok(DossF25 {
        energies,
        fermi_energy,
        projections: blocks.into_iter().map(|b| b.values).collect(),
    })
}

impl DossF25 {
    pub fn n_points(&self) -> usize {
        self.energies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const F25: &str = include_str!("../../testdata/mgo_doss.f25");

    #[test]
    fn test_fixed_width_split() {
        let fields = fixed_fields(" 0.00000E+00-8.00000E-01 0.00000E+00", 12);
        assert_eq!(fields, vec!["0.00000E+00", "-8.00000E-01", "0.00000E+00"]);
    }

    #[test]
    fn test_two_projections() {
        let doss = read_doss_f25(F25).unwrap();
        assert_eq!(doss.n_points(), 8);
        assert_eq!(doss.projections.len(), 2);
        assert_relative_eq!(doss.energies[0], -0.8 * HARTREE_TO_EV, max_relative = 1e-12);
        assert_relative_eq!(doss.energies[1], (-0.8 + 0.1) * HARTREE_TO_EV, max_relative = 1e-12);
        assert_relative_eq!(doss.fermi_energy, -0.2 * HARTREE_TO_EV, max_relative = 1e-12);
        // 相邻负数没有空格
        assert_relative_eq!(doss.projections[1][6], -1.0e-3, epsilon = 1e-15);
    }

    #[test]
    fn test_short_block() {
        let text = F25.replacen(" 7.00000E+00 8.00000E+00\n", "\n", 1);
        assert!(matches!(
            read_doss_f25(&text),
            Err(ScanError::FieldCount { expected: 8, found: 6, .. })
        ));
    }

    #[test]
    fn test_no_blocks() {
        assert!(matches!(read_doss_f25("\n"), Err(ScanError::UnexpectedEof { .. })));
    }
}
