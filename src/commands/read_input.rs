//! # read-input 子命令实现
//!
//! 把 `.d12` 输入还原为 JSON 配置（含逐原子属性），
//! 可选地把每个基组写回单独文件。
//!
//! ## 依赖关系
//! - 使用 `cli/read_input.rs` 定义的参数
//! - 使用 `parsers/d12.rs`

use crate::cli::read_input::ReadInputArgs;
use crate::error::{CrystoolError, Result};
use crate::models::{AtomProps, CrystalConfig};
use crate::parsers;
use crate::utils::{self, output};

use serde::Serialize;
use std::fs;

/// 输出 JSON 的顶层结构
#[derive(Debug, Serialize)]
struct InputDocument<'a> {
    config: &'a CrystalConfig,
    atom_props: &'a AtomProps,
    /// 基组对应的原子序数（按输入顺序）
    basis_sets: Vec<Option<u32>>,
}

/// 执行 read-input 命令
pub fn execute(args: ReadInputArgs) -> Result<()> {
    output::print_header("Reading CRYSTAL Input");

    let (config, basis_sets, atom_props) = parsers::read_input_file(&args.input)?;
    output::print_info(&format!(
        "'{}': {} basis sets, k-points {:?}",
        args.input.display(),
        basis_sets.len(),
        config.scf.k_points
    ));

    if let Some(dir) = &args.basis_dir {
        fs::create_dir_all(dir).map_err(|e| CrystoolError::FileWriteError {
            path: dir.display().to_string(),
            source: e,
        })?;
        for (i, basis) in basis_sets.iter().enumerate() {
            let name = match basis.raw_atomic_number() {
                Some(z) => format!("{}.basis", z),
                None => format!("basis_{}.basis", i + 1),
            };
            let path = dir.join(name);
            fs::write(&path, format!("{}\n", basis.content.trim_end())).map_err(|e| {
                CrystoolError::FileWriteError {
                    path: path.display().to_string(),
                    source: e,
                }
            })?;
            log::debug!("basis set written to {}", path.display());
        }
        output::print_success(&format!("Basis sets written to '{}'", dir.display()));
    }

    let document = InputDocument {
        config: &config,
        atom_props: &atom_props,
        basis_sets: basis_sets.iter().map(|b| b.atomic_number()).collect(),
    };
    utils::emit_json(&document, args.output.as_deref())?;
    if let Some(path) = &args.output {
        output::print_success(&format!("Configuration written to '{}'", path.display()));
    }
    Ok(())
}
