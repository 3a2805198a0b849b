//! # write 子命令实现
//!
//! 由 JSON 配置、基组文件与可选的逐原子属性生成 `.d12` 输入。
//! 逐原子属性有两种来源：
//! - `--atom-props`: 直接给出 `{spin_alpha: [..], ..}`
//! - `--structure` + `--kinds`: 按 kind 标记推导
//!
//! ## 依赖关系
//! - 使用 `cli/write.rs` 定义的参数
//! - 使用 `writers/`, `parsers/mod.rs`

use crate::cli::write::WriteArgs;
use crate::error::{CrystoolError, Result};
use crate::models::structure::number_from_symbol;
use crate::models::{AtomProps, BasisSet, CrystalConfig};
use crate::parsers;
use crate::utils::output;
use crate::writers::{self, KindTable};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    Ok(serde_json::from_str(&parsers::read_text(path)?)?)
}

fn load_atom_props(args: &WriteArgs) -> Result<AtomProps> {
    if let Some(path) = &args.atom_props {
        let map: BTreeMap<String, Vec<usize>> = read_json(path)?;
        return Ok(AtomProps::from_map(map)?);
    }
    match (&args.structure, &args.kinds) {
        (Some(structure), Some(kinds)) => {
            let structure = parsers::read_structure_file(structure)?;
            if let Some(atom) = structure.atoms.iter().find(|a| number_from_symbol(&a.element).is_none()) {
                return Err(CrystoolError::InvalidArgument(format!(
                    "unknown element '{}' in structure",
                    atom.element
                )));
            }
            output::print_info(&format!(
                "Structure {} ({} atoms, {}D)",
                structure.formula(),
                structure.atoms.len(),
                structure.dimensionality()
            ));
            let kinds: KindTable = read_json(kinds)?;
            Ok(writers::create_atom_props(&structure, &kinds)?)
        }
        _ => Ok(AtomProps::default()),
    }
}

/// 执行 write 命令
pub fn execute(args: WriteArgs) -> Result<()> {
    output::print_header("Writing CRYSTAL Input");

    if args.output.exists() && !args.overwrite {
        return Err(CrystoolError::InvalidArgument(format!(
            "'{}' already exists (use --overwrite)",
            args.output.display()
        )));
    }

    let config: CrystalConfig = read_json(&args.config)?;
    let basis_sets = args
        .basis
        .iter()
        .map(|p| parsers::read_basis_file(p))
        .collect::<Result<Vec<BasisSet>>>()?;
    let atom_props = load_atom_props(&args)?;
    log::debug!(
        "{} basis sets, {} alpha / {} beta spins, {} ghosts",
        basis_sets.len(),
        atom_props.spin_alpha.len(),
        atom_props.spin_beta.len(),
        atom_props.ghosts.len()
    );

    let text = writers::write_input(&config, &basis_sets, &atom_props)?;
    fs::write(&args.output, &text).map_err(|e| CrystoolError::FileWriteError {
        path: args.output.display().to_string(),
        source: e,
    })?;

    output::print_success(&format!(
        "Wrote '{}' ({} lines, {} basis sets)",
        args.output.display(),
        text.lines().count(),
        basis_sets.len()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CONFIG: &str = r#"{
        "title": "MgO",
        "geometry": {},
        "basis_set": {},
        "scf": {"k_points": [8, 8], "numerical": {"TOLINTEG": [7, 7, 7, 7, 14]}}
    }"#;

    fn setup(dir: &Path) -> WriteArgs {
        fs::write(dir.join("config.json"), CONFIG).unwrap();
        fs::write(dir.join("Mg.basis"), "12 1\n0 0 1 2.0 1.0\n 1.0 1.0\n99 0\n").unwrap();
        fs::write(dir.join("O.basis"), "8 1\n0 0 1 2.0 1.0\n 1.0 1.0\n").unwrap();
        WriteArgs {
            config: dir.join("config.json"),
            basis: vec![dir.join("Mg.basis"), dir.join("O.basis")],
            atom_props: None,
            structure: None,
            kinds: None,
            output: dir.join("INPUT"),
            overwrite: false,
        }
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempdir().unwrap();
        let args = setup(dir.path());
        let output = args.output.clone();
        execute(args).unwrap();

        let (config, basis_sets, _) = parsers::read_input_file(&output).unwrap();
        assert_eq!(config.title.as_deref(), Some("MgO"));
        assert_eq!(basis_sets.len(), 2);
        assert_eq!(basis_sets[1].atomic_number(), Some(8));
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let args = setup(dir.path());
        fs::write(&args.output, "keep me").unwrap();
        assert!(matches!(execute(args), Err(CrystoolError::InvalidArgument(_))));
        assert_eq!(fs::read_to_string(dir.path().join("INPUT")).unwrap(), "keep me");
    }

    #[test]
    fn test_atom_props_from_kinds() {
        let dir = tempdir().unwrap();
        let mut args = setup(dir.path());
        fs::write(
            dir.path().join("structure.json"),
            r#"{
                "lattice": {"matrix": [[4.2,0,0],[0,4.2,0],[0,0,4.2]]},
                "atoms": [
                    {"element": "Mg", "position": [0,0,0]},
                    {"element": "O", "position": [2.1,2.1,2.1], "kind": "O1"}
                ]
            }"#,
        )
        .unwrap();
        fs::write(dir.path().join("kinds.json"), r#"{"O1": {"ghosts": true}}"#).unwrap();
        args.structure = Some(dir.path().join("structure.json"));
        args.kinds = Some(dir.path().join("kinds.json"));
        let output = args.output.clone();
        execute(args).unwrap();

        let (_, _, props) = parsers::read_input_file(&output).unwrap();
        assert_eq!(props.ghosts.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_unknown_atom_property() {
        let dir = tempdir().unwrap();
        let mut args = setup(dir.path());
        fs::write(dir.path().join("props.json"), r#"{"spin_up": [1]}"#).unwrap();
        args.atom_props = Some(dir.path().join("props.json"));
        assert!(matches!(execute(args), Err(CrystoolError::Input(_))));
    }
}
