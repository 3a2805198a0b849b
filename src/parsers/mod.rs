//! # 解析器模块
//!
//! 提供 CRYSTAL 主输出、properties 输出、`.d12` 输入及各类辅助文件的读取器。
//! 各读取器只接受内存中的文本/字节；本模块负责从文件加载并把
//! `ScanError` 包装为带路径的 `CrystoolError::ParseError`。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: numbers, table, stdout, properties, d12, fort9, cube, ppan, doss_f25

pub mod cube;
pub mod d12;
pub mod doss_f25;
pub mod fort9;
pub mod numbers;
pub mod ppan;
pub mod properties;
pub mod stdout;
pub mod table;

use crate::error::{CrystoolError, Result, ScanError};
use crate::models::{AtomProps, BasisSet, CrystalConfig, Structure};
use std::fs;
use std::path::Path;

/// 读取文本文件
pub fn read_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CrystoolError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    fs::read_to_string(path).map_err(|e| CrystoolError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| CrystoolError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 为扫描错误附加文件格式与路径
fn scan_failure(format: &str, path: &Path) -> impl FnOnce(ScanError) -> CrystoolError {
    let format = format.to_string();
    let path = path.display().to_string();
    move |e| CrystoolError::ParseError {
        format,
        path,
        reason: e.to_string(),
    }
}

/// 解析 CRYSTAL 主输出文件
pub fn parse_stdout_file(path: &Path) -> Result<stdout::StdoutOutcome> {
    Ok(stdout::read_crystal_stdout(&read_text(path)?))
}

/// 解析 properties 输出文件
pub fn parse_properties_file(path: &Path) -> Result<stdout::StdoutOutcome> {
    Ok(properties::read_properties_stdout(&read_text(path)?))
}

/// 读取 `.d12` 输入文件
pub fn read_input_file(path: &Path) -> Result<(CrystalConfig, Vec<BasisSet>, AtomProps)> {
    d12::read_input(&read_text(path)?).map_err(scan_failure("d12", path))
}

/// 读取单个基组文件（可带结束行 `99 0`）
pub fn read_basis_file(path: &Path) -> Result<BasisSet> {
    let content = read_text(path)?;
    let body: Vec<&str> = content
        .lines()
        .take_while(|l| l.split_whitespace().collect::<Vec<_>>() != ["99", "0"])
        .collect();
    let basis = BasisSet::new(body.join("\n"));
    if basis.n_shells().is_none() {
        return Err(CrystoolError::ParseError {
            format: "basis".to_string(),
            path: path.display().to_string(),
            reason: "first line must be 'Z NSHELL'".to_string(),
        });
    }
    Ok(basis)
}

/// 读取 JSON 结构文件
pub fn read_structure_file(path: &Path) -> Result<Structure> {
    Ok(serde_json::from_str(&read_text(path)?)?)
}

pub fn read_fort9_file(path: &Path) -> Result<fort9::Fort9> {
    fort9::read_fort9(&read_bytes(path)?).map_err(scan_failure("fort.9", path))
}

pub fn read_cube_file(path: &Path) -> Result<cube::Cube> {
    cube::read_cube(&read_text(path)?).map_err(scan_failure("cube", path))
}

pub fn read_ppan_file(path: &Path) -> Result<ppan::Ppan> {
    ppan::read_ppan(&read_text(path)?).map_err(scan_failure("PPAN.DAT", path))
}

pub fn read_doss_f25_file(path: &Path) -> Result<doss_f25::DossF25> {
    doss_f25::read_doss_f25(&read_text(path)?).map_err(scan_failure("fort.25", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_basis_file_strips_terminator() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "8 2\n0 0 1 2.0 1.0\n 8020.0 1.0\n0 1 1 6.0 1.0\n 0.3 1.0 1.0\n99 0").unwrap();

        let basis = read_basis_file(file.path()).unwrap();
        assert_eq!(basis.atomic_number(), Some(8));
        assert!(!basis.content.contains("99 0"));
    }

    #[test]
    fn test_scan_error_carries_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "title\nCRYSTAL\nEND").unwrap();

        match read_input_file(file.path()) {
            Err(CrystoolError::ParseError { format, path, reason }) => {
                assert_eq!(format, "d12");
                assert_eq!(path, file.path().display().to_string());
                assert!(reason.contains("EXTERNAL"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_text(Path::new("/nonexistent/crystal.out")),
            Err(CrystoolError::FileNotFound { .. })
        ));
    }
}
