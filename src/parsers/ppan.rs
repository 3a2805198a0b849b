//! # PPAN.DAT Mulliken 布居读取
//!
//! `PPAN` 关键字写出的 Mulliken 布居文件：
//! ```text
//!    1   2
//!   12   3   10.134
//!    4.000   5.955   0.179
//!    8   2    9.866
//!    1.994   7.872
//! ```
//! 首行为 `NSPIN NATOM`；随后对每个自旋通道、每个原子给出
//! `Z NSHELL TOTAL` 行，接着是可能跨行的 `NSHELL` 个壳层布居。
//! 第一个通道是总电子数 (alpha+beta)，第二个通道（若有）是自旋密度 (alpha-beta)。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `commands/analyze/mulliken.rs` 使用
//! - 使用 `parsers/numbers.rs`

use crate::error::{ScanError, ScanResult};
use crate::models::{Record, Value};
use crate::parsers::numbers::extract_numbers;

#[derive(Debug, Clone, PartialEq)]
pub struct PpanAtom {
    /// 原始原子序数（赝势原子可能加 200）
    pub atomic_number: u32,
    pub total: f64,
    pub shells: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ppan {
    /// 每个自旋通道一组原子
    pub channels: Vec<Vec<PpanAtom>>,
}

/// 扁平数值流，记住每个值所在的行
struct Tokens {
    values: Vec<(usize, f64)>,
    pos: usize,
    total_lines: usize,
}

impl Tokens {
    fn next(&mut self, expected: &str) -> ScanResult<(usize, f64)> {
        let value = self
            .values
            .get(self.pos)
            .copied()
            .ok_or_else(|| ScanError::eof(self.total_lines, expected))?;
        self.pos += 1;
        Ok(value)
    }

    fn count(&mut self, expected: &str) -> ScanResult<usize> {
        let (line, value) = self.next(expected)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(ScanError::Conversion {
                line,
                field: expected.to_string(),
                token: value.to_string(),
            });
        }
        Ok(value as usize)
    }
}

/// 读取 PPAN.DAT 文本
pub fn read_ppan(text: &str) -> ScanResult<Ppan> {
    let values: Vec<(usize, f64)> = text
        .lines()
        .enumerate()
        .flat_map(|(i, line)| extract_numbers(line).into_iter().map(move |v| (i, v)))
        .collect();
    let mut tokens = Tokens {
        values,
        pos: 0,
        total_lines: text.lines().count(),
    };

    let n_spin = tokens.count("NSPIN")?;
    let n_atoms = tokens.count("NATOM")?;
    if !(1..=2).contains(&n_spin) {
        return Err(ScanError::unexpected(0, "NSPIN 1 or 2", n_spin.to_string()));
    }

    let mut channels = Vec::with_capacity(n_spin);
    for _ in 0..n_spin {
        let mut atoms = Vec::with_capacity(n_atoms);
        for _ in 0..n_atoms {
            let atomic_number = tokens.count("Z")? as u32;
            let n_shells = tokens.count("NSHELL")?;
            let (_, total) = tokens.next("TOTAL")?;
            let shells = (0..n_shells)
                .map(|_| tokens.next("shell population").map(|(_, v)| v))
                .collect::<ScanResult<Vec<f64>>>()?;
            atoms.push(PpanAtom {
                atomic_number,
                total,
                shells,
            });
        }
        channels.push(atoms);
    }

    if let Some((line, _)) = tokens.values.get(tokens.pos) {
        log::warn!("PPAN.DAT: ignoring trailing values from line {}", line + 1);
    }

    Ok(Ppan { channels })
}

impl Ppan {
    /// 原子净电荷 Z - 总布居
    pub fn charges(&self) -> Vec<f64> {
        self.channels
            .first()
            .map(|atoms| {
                atoms
                    .iter()
                    .map(|a| (a.atomic_number % 100) as f64 - a.total)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 原子自旋 (alpha-beta)
    pub fn spins(&self) -> Option<Vec<f64>> {
        self.channels
            .get(1)
            .map(|atoms| atoms.iter().map(|a| a.total).collect())
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        for (name, atoms) in ["alpha+beta", "alpha-beta"].iter().zip(&self.channels) {
            record.insert(
                *name,
                Record::new()
                    .with(
                        "atomic_numbers",
                        atoms.iter().map(|a| a.atomic_number).collect::<Vec<_>>(),
                    )
                    .with("electrons", atoms.iter().map(|a| a.total).collect::<Vec<_>>())
                    .with(
                        "shells",
                        atoms
                            .iter()
                            .map(|a| Value::from(a.shells.clone()))
                            .collect::<Vec<_>>(),
                    ),
            );
        }
        record.insert("charges", self.charges());
        record.insert("spins", self.spins());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PPAN: &str = "   2   2
  12   3   10.134
   4.000   5.955   0.179
   8   2    9.866
   1.994
   7.872
  12   3    0.500
   0.000   0.400   0.100
   8   2   -0.500
   0.000  -0.500
";

    #[test]
    fn test_two_channels() {
        let ppan = read_ppan(PPAN).unwrap();
        assert_eq!(ppan.channels.len(), 2);
        assert_eq!(ppan.channels[0][1].shells, vec![1.994, 7.872]);

        let charges = ppan.charges();
        assert_relative_eq!(charges[0], 1.866, epsilon = 1e-9);
        assert_relative_eq!(charges[1], -1.866, epsilon = 1e-9);
        assert_eq!(ppan.spins(), Some(vec![0.5, -0.5]));

        let record = ppan.to_record();
        assert!(record.get_path(&["alpha-beta", "shells"]).is_some());
    }

    #[test]
    fn test_truncated_file() {
        let text: String = PPAN.lines().take(5).collect::<Vec<_>>().join("\n");
        assert!(matches!(read_ppan(&text), Err(ScanError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_bad_spin_count() {
        assert!(matches!(
            read_ppan("3 1\n8 1 8.0\n8.0\n"),
            Err(ScanError::Unexpected { .. })
        ));
    }
}
