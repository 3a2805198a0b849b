//! # Gaussian cube 格式读取
//!
//! CRYSTAL 的 ECH3/POT3 输出（如 `DENS_CUBE.DAT`）使用 cube 格式：
//! ```text
//! 注释行 1
//! 注释行 2
//!     2    0.000000    0.000000    0.000000
//!    40    0.105000    0.000000    0.000000
//!    40    0.000000    0.105000    0.000000
//!    40    0.000000    0.000000    0.105000
//!    12   12.000000    0.000000    0.000000    0.000000
//!     8    8.000000    2.105000    2.105000    2.105000
//!  1.23456E-01  1.23456E-01 ...
//! ```
//! 网格行的点数为负时，体素向量以 Å 为单位；原子数为负时，
//! 原子行之后有一行数据集编号，每个格点对应多个值。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `commands/analyze/cube.rs` 使用
//! - 使用 `parsers/numbers.rs`

use crate::error::{ScanError, ScanResult};
use crate::models::Record;
use crate::parsers::numbers::extract_numbers;

const BOHR_TO_ANGSTROM: f64 = 0.52917721067;

#[derive(Debug, Clone, PartialEq)]
pub struct CubeAtom {
    pub atomic_number: u32,
    pub charge: f64,
    pub position: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    pub comments: [String; 2],
    pub origin: [f64; 3],
    pub shape: [usize; 3],
    /// 体素向量（行向量）
    pub voxel: [[f64; 3]; 3],
    /// 体素向量以 Å 为单位
    pub angstrom: bool,
    pub atoms: Vec<CubeAtom>,
    pub dataset_ids: Vec<i64>,
    /// 按 x 最慢、z 最快的顺序展开
    pub values: Vec<f64>,
}

fn numeric_line(lines: &[&str], idx: usize, expected: &str, min: usize) -> ScanResult<Vec<f64>> {
    let line = lines.get(idx).ok_or_else(|| ScanError::eof(idx, expected))?;
    let values = extract_numbers(line);
    if values.len() < min {
        return Err(ScanError::FieldCount {
            line: idx,
            expected: min,
            found: values.len(),
        });
    }
    Ok(values)
}

/// 读取 cube 文本
pub fn read_cube(text: &str) -> ScanResult<Cube> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return Err(ScanError::eof(lines.len(), "two comment lines"));
    }
    let comments = [lines[0].trim().to_string(), lines[1].trim().to_string()];

    let header = numeric_line(&lines, 2, "NATOMS X0 Y0 Z0", 4)?;
    let signed_atoms = header[0] as i64;
    let origin = [header[1], header[2], header[3]];

    let mut shape = [0usize; 3];
    let mut voxel = [[0.0; 3]; 3];
    let mut angstrom = false;
    for axis in 0..3 {
        let row = numeric_line(&lines, 3 + axis, "N VX VY VZ", 4)?;
        let n = row[0] as i64;
        if n < 0 {
            angstrom = true;
        }
        shape[axis] = n.unsigned_abs() as usize;
        voxel[axis] = [row[1], row[2], row[3]];
    }

    let n_atoms = signed_atoms.unsigned_abs() as usize;
    // 原子数来自文件头，先与剩余行数比较再分配
    let remaining = lines.len().saturating_sub(6);
    if n_atoms > remaining {
        return Err(ScanError::FieldCount {
            line: 2,
            expected: n_atoms,
            found: remaining,
        });
    }
    let mut atoms = Vec::with_capacity(n_atoms);
    let mut idx = 6;
    for _ in 0..n_atoms {
        let row = numeric_line(&lines, idx, "Z CHARGE X Y Z", 5)?;
        atoms.push(CubeAtom {
            atomic_number: row[0] as u32,
            charge: row[1],
            position: [row[2], row[3], row[4]],
        });
        idx += 1;
    }

    let mut dataset_ids = Vec::new();
    if signed_atoms < 0 {
        let row = numeric_line(&lines, idx, "M ID1 ... IDM", 1)?;
        let m = row[0] as usize;
        let expected = m.checked_add(1).ok_or_else(|| ScanError::Conversion {
            line: idx,
            field: "M".to_string(),
            token: row[0].to_string(),
        })?;
        if row.len() != expected {
            return Err(ScanError::FieldCount {
                line: idx,
                expected,
                found: row.len(),
            });
        }
        dataset_ids = row[1..].iter().map(|v| *v as i64).collect();
        idx += 1;
    }

    let per_point = dataset_ids.len().max(1);
    let expected = shape
        .iter()
        .try_fold(per_point, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| ScanError::unexpected(3, "grid point count within usize", format!("{:?}", shape)))?;
    let values: Vec<f64> = lines[idx.min(lines.len())..]
        .iter()
        .flat_map(|l| extract_numbers(l))
        .collect();
    if values.len() != expected {
        return Err(ScanError::FieldCount {
            line: lines.len(),
            expected,
            found: values.len(),
        });
    }

    Ok(Cube {
        comments,
        origin,
        shape,
        voxel,
        angstrom,
        atoms,
        dataset_ids,
        values,
    })
}

impl Cube {
    /// 格点 (i, j, k) 的第一个数据集的值
    pub fn value(&self, i: usize, j: usize, k: usize) -> Option<f64> {
        let [nx, ny, nz] = self.shape;
        if i >= nx || j >= ny || k >= nz {
            return None;
        }
        let per_point = self.dataset_ids.len().max(1);
        self.values.get(((i * ny + j) * nz + k) * per_point).copied()
    }

    /// 单个体素体积 (bohr³)
    pub fn voxel_volume(&self) -> f64 {
        let [a, b, c] = self.voxel;
        let cross = [
            b[1] * c[2] - b[2] * c[1],
            b[2] * c[0] - b[0] * c[2],
            b[0] * c[1] - b[1] * c[0],
        ];
        let volume = (a[0] * cross[0] + a[1] * cross[1] + a[2] * cross[2]).abs();
        if self.angstrom {
            volume / BOHR_TO_ANGSTROM.powi(3)
        } else {
            volume
        }
    }

    /// 第一个数据集在网格上的积分
    pub fn integrate(&self) -> f64 {
        let per_point = self.dataset_ids.len().max(1);
        self.values.iter().step_by(per_point).sum::<f64>() * self.voxel_volume()
    }

    pub fn summary(&self) -> Record {
        let per_point = self.dataset_ids.len().max(1);
        let first: Vec<f64> = self.values.iter().step_by(per_point).copied().collect();
        let min = first.iter().copied().fold(f64::INFINITY, f64::min);
        let max = first.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Record::new()
            .with("shape", self.shape.iter().map(|n| *n as i64).collect::<Vec<_>>())
            .with("n_atoms", self.atoms.len())
            .with("n_datasets", per_point)
            .with("voxel_volume", self.voxel_volume())
            .with("integral", self.integrate())
            .with("min", if first.is_empty() { None } else { Some(min) })
            .with("max", if first.is_empty() { None } else { Some(max) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CUBE: &str = "CRYSTAL density
 OUTER LOOP: X, MIDDLE LOOP: Y, INNER LOOP: Z
    2    0.000000    0.000000    0.000000
    2    0.500000    0.000000    0.000000
    2    0.000000    0.500000    0.000000
    3    0.000000    0.000000    0.500000
   12   12.000000    0.000000    0.000000    0.000000
    8    8.000000    0.500000    0.500000    0.500000
  1.0E+00  2.0E+00  3.0E+00  4.0E+00  5.0E+00  6.0E+00
  7.0E+00  8.0E+00  9.0E+00  1.0E+01  1.1E+01  1.2E+01
";

    #[test]
    fn test_read_grid() {
        let cube = read_cube(CUBE).unwrap();
        assert_eq!(cube.shape, [2, 2, 3]);
        assert_eq!(cube.atoms.len(), 2);
        assert_eq!(cube.atoms[1].atomic_number, 8);
        assert!(!cube.angstrom);
        assert_eq!(cube.value(0, 0, 2), Some(3.0));
        assert_eq!(cube.value(1, 1, 2), Some(12.0));
        assert_eq!(cube.value(2, 0, 0), None);
        assert_relative_eq!(cube.voxel_volume(), 0.125, epsilon = 1e-12);
        assert_relative_eq!(cube.integrate(), 78.0 * 0.125, epsilon = 1e-12);
    }

    #[test]
    fn test_angstrom_voxels() {
        let text = CUBE.replacen("    2    0.500000", "   -2    0.500000", 1);
        let cube = read_cube(&text).unwrap();
        assert!(cube.angstrom);
        assert_eq!(cube.shape[0], 2);
    }

    #[test]
    fn test_value_count_mismatch() {
        let text = CUBE.replace("  1.1E+01  1.2E+01\n", "\n");
        assert!(matches!(
            read_cube(&text),
            Err(ScanError::FieldCount { expected: 12, found: 10, .. })
        ));
    }

    #[test]
    fn test_atom_count_beyond_file_is_rejected() {
        let text = CUBE.replacen(
            "    2    0.000000    0.000000    0.000000",
            "99999999999999 0 0 0",
            1,
        );
        assert_eq!(
            read_cube(&text).unwrap_err(),
            ScanError::FieldCount {
                line: 2,
                expected: 99999999999999,
                found: 4
            }
        );
    }

    #[test]
    fn test_grid_size_overflow_is_rejected() {
        let text = CUBE
            .replacen("    2    0.500000", " 99999999999    0.500000", 1)
            .replacen("    2    0.000000    0.500000", " 99999999999    0.000000    0.500000", 1)
            .replacen("    3    0.000000", " 99999999999    0.000000", 1);
        assert!(matches!(read_cube(&text), Err(ScanError::Unexpected { line: 3, .. })));
    }

    #[test]
    fn test_dataset_ids_multiply_value_count() {
        let text = CUBE
            .replacen("    2    0.000000    0.000000    0.000000", "   -2    0.000000    0.000000    0.000000", 1)
            .replace(
                "    8    8.000000    0.500000    0.500000    0.500000\n",
                "    8    8.000000    0.500000    0.500000    0.500000\n    2    1    2\n",
            );
        let err = read_cube(&text).unwrap_err();
        // 12 个值不足以填满 2 个数据集
        assert_eq!(
            err,
            ScanError::FieldCount {
                line: 11,
                expected: 24,
                found: 12
            }
        );
    }
}
