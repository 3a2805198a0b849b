//! # 几何与对称性扫描器
//!
//! 读取初始几何（`GEOMETRY FOR WAVE FUNCTION`）、最终几何（`FINAL OPTIMIZED GEOMETRY`）
//! 以及优化步中打印的晶格参数与原子表。
//!
//! 原子表布局随体系维度变化：
//! ```text
//! 3D   ATOM  X/A          Y/B          Z/C
//! 2D   ATOM  X/A          Y/B          Z(ANGSTROM)
//! 1D   ATOM  X/A          Y(ANGSTROM)  Z(ANGSTROM)
//! 0D   ATOM  X(ANGSTROM)  Y(ANGSTROM)  Z(ANGSTROM)   (500 Å 人工盒子)
//! ```
//! 表头与维度不符时返回结构性错误。
//!
//! ## 依赖关系
//! - 被 `parsers/stdout/mod.rs`, `parsers/stdout/optimisation.rs` 使用
//! - 使用 `parsers/table.rs`, `parsers/numbers.rs`, `models/structure.rs`

use super::find_line;
use crate::error::{ScanError, ScanResult};
use crate::models::structure::{normalize_symbol, symbol_from_number};
use crate::models::{Lattice, Record, Value};
use crate::parsers::numbers::{extract_numbers, is_numeric_row, number_after};
use crate::parsers::table::{read_table, BodyEnd, Cell, FieldKind, Table, TableOptions};

const ATOMS_LANDMARK: &str = "ATOMS IN THE ASYMMETRIC UNIT";
const VECTORS_LANDMARK: &str = "DIRECT LATTICE VECTORS CARTESIAN COMPONENTS (ANGSTROM)";
const CARTESIAN_LANDMARK: &str = "CARTESIAN COORDINATES - PRIMITIVE CELL";
const SYMMOPS_LANDMARK: &str = "*** SYMMOPS - TRANSLATORS IN FRACTIONAL UNITS";
const SYMMOPS_COUNT: &str = "N. OF SYMMETRY OPERATORS";

/// "1 T  12 MG   0.0  0.0  0.0"
const ATOM_FIELDS: [(&str, FieldKind); 7] = [
    ("id", FieldKind::Int),
    ("tag", FieldKind::Str),
    ("z", FieldKind::Int),
    ("symbol", FieldKind::Str),
    ("x", FieldKind::Float),
    ("y", FieldKind::Float),
    ("z_coord", FieldKind::Float),
];

/// "1    12 MG    0.0  0.0  0.0"
const CARTESIAN_FIELDS: [(&str, FieldKind); 6] = [
    ("id", FieldKind::Int),
    ("z", FieldKind::Int),
    ("symbol", FieldKind::Str),
    ("x", FieldKind::Float),
    ("y", FieldKind::Float),
    ("z_coord", FieldKind::Float),
];

const STAR_TABLE: TableOptions = TableOptions {
    star_to_none: true,
    rule: '*',
    body_end: BodyEnd::Blank,
};

/// 给定维度下期望的原子表表头与周期性
pub fn layout_for(dimensionality: usize) -> Option<(&'static str, [bool; 3])> {
    match dimensionality {
        3 => Some(("ATOM X/A Y/B Z/C", [true, true, true])),
        2 => Some(("ATOM X/A Y/B Z(ANGSTROM)", [true, true, false])),
        1 => Some(("ATOM X/A Y(ANGSTROM) Z(ANGSTROM)", [true, false, false])),
        0 => Some(("ATOM X(ANGSTROM) Y(ANGSTROM) Z(ANGSTROM)", [false, false, false])),
        _ => None,
    }
}

/// 读取 `DIMENSIONALITY OF THE SYSTEM n` 标记行中的维度
pub fn read_dimensionality(lines: &[&str], line: usize) -> ScanResult<usize> {
    let text = lines.get(line).ok_or_else(|| ScanError::eof(line, "DIMENSIONALITY OF THE SYSTEM"))?;
    number_after(text, "DIMENSIONALITY OF THE SYSTEM")
        .map(|d| d as usize)
        .ok_or_else(|| ScanError::unexpected(line, "DIMENSIONALITY OF THE SYSTEM <n>", text.trim()))
}

/// 读取以维度标记行开始的几何段（初始或最终几何）
///
/// `start` 指向包含 `DIMENSIONALITY OF THE SYSTEM` 的行，窗口为 `[start, end)`。
pub fn read_geometry(lines: &[&str], start: usize, end: usize) -> ScanResult<(usize, Record)> {
    let dimensionality = read_dimensionality(lines, start)?;
    read_geometry_block(lines, start + 1, end, dimensionality)
}

/// 读取窗口内的晶格参数、原子表与可选的晶格向量/笛卡尔坐标/对称操作
pub fn read_geometry_block(
    lines: &[&str],
    start: usize,
    end: usize,
    dimensionality: usize,
) -> ScanResult<(usize, Record)> {
    let end = end.min(lines.len());
    let (expected_header, pbc) = layout_for(dimensionality).ok_or_else(|| {
        ScanError::unexpected(start, "dimensionality 0-3", dimensionality.to_string())
    })?;

    let parameters = match find_parameters(lines, start, end) {
        Some(p) => Some(p),
        None if dimensionality > 0 => {
            return Err(ScanError::eof(end, "A B C ALPHA BETA GAMMA"));
        }
        None => None,
    };

    let atoms_line = find_line(lines, start, end, ATOMS_LANDMARK)
        .ok_or_else(|| ScanError::eof(end, ATOMS_LANDMARK))?;
    // 原子表以前一条星号线为顶部边框，两行表头
    let (after_atoms, table) = read_table(lines, atoms_line.saturating_sub(1), &ATOM_FIELDS, STAR_TABLE)?;
    let mut next = after_atoms;
    let header = table.header_text();
    if !header.ends_with(expected_header) {
        return Err(ScanError::unexpected(atoms_line + 1, expected_header, header));
    }

    let mut lattice = match parameters {
        Some([a, b, c, alpha, beta, gamma]) => Lattice::from_parameters(a, b, c, alpha, beta, gamma),
        None => Lattice::molecule_box(),
    };
    // 可选块之间的先后顺序随版本变化，均从原子表之后开始查找
    if let Some(idx) = find_line(lines, after_atoms, end, VECTORS_LANDMARK) {
        let (after, vectors) = read_vectors(lines, idx + 1, end)?;
        for (row, v) in vectors.into_iter().enumerate().take(3) {
            lattice.matrix[row] = v;
        }
        next = next.max(after);
    }

    let mut positions: Vec<[f64; 3]> = (0..table.n_rows())
        .map(|row| {
            let coords = row_coords(&table, row, atoms_line)?;
            Ok(lattice.mixed_to_cartesian(coords, pbc))
        })
        .collect::<ScanResult<_>>()?;

    if let Some(idx) = find_line(lines, after_atoms, end, CARTESIAN_LANDMARK) {
        let (after, cart) = read_table(lines, idx + 1, &CARTESIAN_FIELDS, STAR_TABLE)?;
        if cart.n_rows() == positions.len() {
            positions = (0..cart.n_rows())
                .map(|row| row_coords(&cart, row, idx))
                .collect::<ScanResult<_>>()?;
        }
        next = next.max(after);
    }

    let atomic_numbers: Vec<i64> = table
        .column("z")
        .unwrap_or_default()
        .iter()
        .map(|c| c.as_i64().map(|z| z % 100).unwrap_or(0))
        .collect();
    let symbols: Vec<String> = table
        .column("symbol")
        .unwrap_or_default()
        .iter()
        .zip(&atomic_numbers)
        .map(|(cell, z)| match symbol_from_number(*z as u32) {
            Some(s) => s.to_string(),
            None => normalize_symbol(cell.as_str().unwrap_or("X")),
        })
        .collect();

    let (a, b, c, alpha, beta, gamma) = match parameters {
        Some([a, b, c, alpha, beta, gamma]) => (a, b, c, alpha, beta, gamma),
        None => lattice.parameters(),
    };
    let cell_vectors: Vec<Value> = lattice.matrix.iter().map(|v| Value::from(*v)).collect();
    let ccoords: Vec<Value> = positions.iter().map(|v| Value::from(*v)).collect();

    let primitive_cell = Record::new()
        .with("cell_vectors", cell_vectors)
        .with("pbc", pbc.to_vec())
        .with("n_atoms", table.n_rows())
        .with("atomic_numbers", atomic_numbers)
        .with("symbols", symbols)
        .with("ccoords", ccoords)
        .with(
            "lattice_parameters",
            Record::new()
                .with("a", a)
                .with("b", b)
                .with("c", c)
                .with("alpha", alpha)
                .with("beta", beta)
                .with("gamma", gamma),
        );

    let mut record = Record::new().with("primitive_cell", primitive_cell);

    if let Some(idx) = find_line(lines, after_atoms, end, SYMMOPS_LANDMARK) {
        let expected = find_line(lines, start, end, SYMMOPS_COUNT)
            .and_then(|i| number_after(lines[i], SYMMOPS_COUNT))
            .map(|n| n as usize);
        let (after, operations) = read_symmops(lines, idx + 1, end, expected)?;
        record.insert(
            "symmetry",
            Record::new()
                .with("operations", operations)
                .with("basis", "fractional"),
        );
        next = next.max(after);
    }

    Ok((next, record))
}

/// 查找 `A B C ALPHA BETA GAMMA` 表头并读取下一行的六个参数
fn find_parameters(lines: &[&str], start: usize, end: usize) -> Option<[f64; 6]> {
    (start..end).find_map(|i| {
        let tokens: Vec<&str> = lines[i].split_whitespace().collect();
        if tokens.len() >= 6 && tokens[..6] == ["A", "B", "C", "ALPHA", "BETA", "GAMMA"] {
            let values = extract_numbers(lines.get(i + 1)?);
            values.get(..6)?.try_into().ok()
        } else {
            None
        }
    })
}

fn row_coords(table: &Table, row: usize, line: usize) -> ScanResult<[f64; 3]> {
    let mut coords = [0.0; 3];
    for (axis, name) in ["x", "y", "z_coord"].iter().enumerate() {
        coords[axis] = table
            .column(name)
            .and_then(|c| c.get(row))
            .and_then(Cell::as_f64)
            .ok_or_else(|| ScanError::Conversion {
                line,
                field: name.to_string(),
                token: "******".to_string(),
            })?;
    }
    Ok(coords)
}

/// 读取晶格向量：表头 `X Y Z` 后最多三行纯数值行
fn read_vectors(lines: &[&str], start: usize, end: usize) -> ScanResult<(usize, Vec<[f64; 3]>)> {
    let mut idx = start;
    // 跳过 "X Y Z" 表头
    while idx < end && !is_numeric_row(lines[idx]) {
        idx += 1;
    }
    let mut vectors = Vec::new();
    while idx < end && vectors.len() < 3 && is_numeric_row(lines[idx]) {
        let values = extract_numbers(lines[idx]);
        if values.len() != 3 {
            return Err(ScanError::FieldCount {
                line: idx,
                expected: 3,
                found: values.len(),
            });
        }
        vectors.push([values[0], values[1], values[2]]);
        idx += 1;
    }
    if vectors.is_empty() {
        return Err(ScanError::eof(idx, "lattice vector rows"));
    }
    Ok((idx, vectors))
}

/// 读取对称操作：`V INV` + 9 个旋转分量 + 3 个平移分量
fn read_symmops(
    lines: &[&str],
    start: usize,
    end: usize,
    expected: Option<usize>,
) -> ScanResult<(usize, Vec<Vec<f64>>)> {
    let mut idx = start;
    // "V INV                    ROTATION MATRICES                   TRANSLATOR"
    while idx < end && !is_numeric_row(lines[idx]) {
        idx += 1;
    }
    let mut operations = Vec::new();
    while idx < end && is_numeric_row(lines[idx]) {
        let values = extract_numbers(lines[idx]);
        if values.len() != 14 {
            return Err(ScanError::FieldCount {
                line: idx,
                expected: 14,
                found: values.len(),
            });
        }
        operations.push(values[2..].to_vec());
        idx += 1;
    }
    if let Some(n) = expected {
        if operations.len() != n {
            return Err(ScanError::unexpected(
                idx,
                format!("{} symmetry operations", n),
                format!("{} symmetry operations", operations.len()),
            ));
        }
    }
    Ok((idx, operations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::structure::MOLECULE_BOX_LENGTH;
    use approx::assert_relative_eq;

    const RULE: &str = " *******************************************************************************";

    fn geometry_text(dimensionality: usize, header: &str, symmops: usize) -> String {
        let mut text = format!(
            " GEOMETRY FOR WAVE FUNCTION - DIMENSIONALITY OF THE SYSTEM    {}\n\
             (NON PERIODIC DIRECTION: LATTICE PARAMETER FORMALLY SET TO 500)\n\
             {RULE}\n\
             LATTICE PARAMETERS (ANGSTROMS AND DEGREES) - BOHR = 0.5291772083 ANGSTROM\n\
             PRIMITIVE CELL - CENTRING CODE 1/0 VOLUME=    64.000000 - DENSITY  3.588 g/cm^3\n\
                      A              B              C           ALPHA      BETA       GAMMA\n\
                  4.00000000     4.00000000     4.00000000    90.000000  90.000000  90.000000\n\
             {RULE}\n\
             ATOMS IN THE ASYMMETRIC UNIT    2 - ATOMS IN THE UNIT CELL:    2\n\
                  {header}\n\
             {RULE}\n\
                   1 T  12 MG    0.000000000000E+00  0.000000000000E+00  0.000000000000E+00\n\
                   2 T   8 O     5.000000000000E-01  5.000000000000E-01  5.000000000000E-01\n\
             \n\
             N. OF SYMMETRY OPERATORS    {symmops}\n\
             \n\
             *** SYMMOPS - TRANSLATORS IN FRACTIONAL UNITS\n\
             V INV                    ROTATION MATRICES                   TRANSLATOR\n\
               1  1  1.00  0.00  0.00  0.00  1.00  0.00  0.00  0.00  1.00     0.00  0.00  0.00\n\
               2  2 -1.00  0.00  0.00  0.00 -1.00  0.00  0.00  0.00 -1.00     0.00  0.00  0.00\n\
             \n",
            dimensionality
        );
        text.push_str(" TTTTTTTTTTTTTTTTTTTTTTTTTTTTTT END\n");
        text
    }

    #[test]
    fn test_read_3d_geometry() {
        let text = geometry_text(3, "ATOM                 X/A                 Y/B                 Z/C", 2);
        let lines: Vec<&str> = text.lines().collect();
        let (_, record) = read_geometry(&lines, 0, lines.len()).unwrap();

        let cell = record.get_record("primitive_cell").unwrap();
        assert_eq!(cell.get("n_atoms").and_then(|v| v.as_i64()), Some(2));
        let symbols: Vec<&str> = cell
            .get("symbols")
            .and_then(|v| v.as_list())
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(symbols, vec!["Mg", "O"]);

        let coords = cell.get("ccoords").and_then(|v| v.as_list()).unwrap();
        let second: Vec<f64> = coords[1].as_list().unwrap().iter().filter_map(|v| v.as_f64()).collect();
        assert_relative_eq!(second[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(second[2], 2.0, epsilon = 1e-9);

        let ops = record.get_path(&["symmetry", "operations"]).and_then(|v| v.as_list()).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].as_list().unwrap().len(), 12);
    }

    #[test]
    fn test_layout_mismatch_names_expected_header() {
        let text = geometry_text(2, "ATOM                 X/A                 Y/B                 Z/C", 2);
        let lines: Vec<&str> = text.lines().collect();
        let err = read_geometry(&lines, 0, lines.len()).unwrap_err();
        match err {
            ScanError::Unexpected { expected, found, .. } => {
                assert_eq!(expected, "ATOM X/A Y/B Z(ANGSTROM)");
                assert!(found.ends_with("ATOM X/A Y/B Z/C"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_slab_keeps_cartesian_z() {
        let text = geometry_text(2, "ATOM                 X/A                 Y/B             Z(ANGSTROM)", 2);
        let lines: Vec<&str> = text.lines().collect();
        let (_, record) = read_geometry(&lines, 0, lines.len()).unwrap();
        let pbc: Vec<bool> = record
            .get_path(&["primitive_cell", "pbc"])
            .and_then(|v| v.as_list())
            .unwrap()
            .iter()
            .filter_map(|v| v.as_bool())
            .collect();
        assert_eq!(pbc, vec![true, true, false]);
        let coords = record.get_path(&["primitive_cell", "ccoords"]).and_then(|v| v.as_list()).unwrap();
        let z = coords[1].as_list().unwrap()[2].as_f64().unwrap();
        assert_relative_eq!(z, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_polymer_keeps_cartesian_y_and_z() {
        let text = geometry_text(1, "ATOM                 X/A             Y(ANGSTROM)         Z(ANGSTROM)", 2);
        let lines: Vec<&str> = text.lines().collect();
        let (_, record) = read_geometry(&lines, 0, lines.len()).unwrap();
        let pbc: Vec<bool> = record
            .get_path(&["primitive_cell", "pbc"])
            .and_then(|v| v.as_list())
            .unwrap()
            .iter()
            .filter_map(|v| v.as_bool())
            .collect();
        assert_eq!(pbc, vec![true, false, false]);
        let coords = record.get_path(&["primitive_cell", "ccoords"]).and_then(|v| v.as_list()).unwrap();
        let second: Vec<f64> = coords[1].as_list().unwrap().iter().filter_map(|v| v.as_f64()).collect();
        assert_relative_eq!(second[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(second[1], 0.5, epsilon = 1e-9);
        assert_relative_eq!(second[2], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_symmop_count_mismatch() {
        let text = geometry_text(3, "ATOM                 X/A                 Y/B                 Z/C", 48);
        let lines: Vec<&str> = text.lines().collect();
        assert!(read_geometry(&lines, 0, lines.len()).is_err());
    }

    #[test]
    fn test_molecule_box() {
        let text = " GEOMETRY FOR WAVE FUNCTION - DIMENSIONALITY OF THE SYSTEM    0\n\
             *******************************************************************************\n\
             ATOMS IN THE ASYMMETRIC UNIT    1 - ATOMS IN THE UNIT CELL:    1\n\
                  ATOM          X(ANGSTROM)         Y(ANGSTROM)         Z(ANGSTROM)\n\
             *******************************************************************************\n\
                   1 T   8 O     1.000000000000E+00  0.000000000000E+00  0.000000000000E+00\n\
             \n";
        let lines: Vec<&str> = text.lines().collect();
        let (_, record) = read_geometry(&lines, 0, lines.len()).unwrap();
        let a = record
            .get_path(&["primitive_cell", "lattice_parameters", "a"])
            .and_then(|v| v.as_f64())
            .unwrap();
        assert_relative_eq!(a, MOLECULE_BOX_LENGTH);
        assert!(record.get("symmetry").is_none());
    }
}
