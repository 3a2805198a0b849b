//! # `.d12` 输入文件生成
//!
//! 把类型化配置、基组文本与逐原子属性拼接为 CRYSTAL 主输入文件。
//! 几何固定为 `EXTERNAL`（由 fort.34 提供），因此输入只包含三个块：
//!
//! ```text
//! 标题
//! EXTERNAL ... END        几何块（可含 OPTGEOM ... ENDOPT）
//! 基组文本 ... 99 0 ... END
//! 哈密顿量 / SCF 块 ... END
//! ```
//!
//! 校验先于生成：任一校验失败时不产生任何输出。
//!
//! ## 依赖关系
//! - 被 `commands/write.rs` 使用
//! - 使用 `models/config.rs`, `models/basis.rs`

use crate::error::InputError;
use crate::models::config::{
    AtomProps, CrystalConfig, DftConfig, ExchangeCorrelation, KeywordArg, KeywordBlock, OptimiseConfig,
    ShrinkMesh,
};
use crate::models::{BasisSet, KPoints};

const DEFAULT_TITLE: &str = "CRYSTAL run";

/// 生成 `.d12` 输入文本
pub fn write_input(
    config: &CrystalConfig,
    basis_sets: &[BasisSet],
    atom_props: &AtomProps,
) -> Result<String, InputError> {
    validate(config, basis_sets, atom_props)?;

    let mut lines: Vec<String> = Vec::new();

    lines.push(title_line(config.title.as_deref()));

    // 几何块
    lines.push("EXTERNAL".to_string());
    lines.extend(config.geometry.info_print.iter().cloned());
    lines.extend(config.geometry.info_external.iter().cloned());
    if let Some(optimise) = &config.geometry.optimise {
        push_optgeom(&mut lines, optimise, atom_props);
    }
    lines.push("END".to_string());

    // 基组块
    for basis in basis_sets {
        lines.push(basis.content.clone());
    }
    lines.push("99 0".to_string());
    push_keywords(&mut lines, &config.basis_set);
    if !atom_props.ghosts.is_empty() {
        lines.push("GHOSTS".to_string());
        lines.push(atom_props.ghosts.len().to_string());
        lines.push(join_indices(atom_props.ghosts.iter()));
    }
    lines.push("END".to_string());

    // 哈密顿量与 SCF 块
    let scf = &config.scf;
    if let Some(single) = &scf.single {
        lines.push(single.clone());
    }
    if let Some(dft) = &scf.dft {
        push_dft(&mut lines, dft);
    }

    let KPoints(mesh, isp) = scf.k_points;
    lines.push("SHRINK".to_string());
    match mesh {
        ShrinkMesh::Uniform(is) => lines.push(format!("{} {}", is, isp)),
        ShrinkMesh::Vector([a, b, c]) => {
            lines.push(format!("0 {}", isp));
            lines.push(format!("{} {} {}", a, b, c));
        }
    }

    if scf.guessp {
        lines.push("GUESSP".to_string());
    }
    push_atomspin(&mut lines, atom_props);
    push_keywords(&mut lines, &scf.numerical);
    lines.extend(scf.post_scf.iter().cloned());
    lines.push("END".to_string());

    let mut text = lines.join("\n");
    text.push('\n');
    Ok(text)
}

fn validate(config: &CrystalConfig, basis_sets: &[BasisSet], atom_props: &AtomProps) -> Result<(), InputError> {
    if basis_sets.is_empty() {
        return Err(InputError::NoBasisSets);
    }
    atom_props.validate()?;

    let has_atomspin = !atom_props.spin_alpha.is_empty() || !atom_props.spin_beta.is_empty();
    if has_atomspin && !config.scf.numerical.contains_key("SPINLOCK") {
        return Err(InputError::AtomSpinWithoutSpinlock);
    }
    Ok(())
}

/// 标题只占一行
fn title_line(title: Option<&str>) -> String {
    let joined = title
        .unwrap_or(DEFAULT_TITLE)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        joined
    }
}

fn join_indices<'a>(indices: impl Iterator<Item = &'a usize>) -> String {
    indices.map(|i| i.to_string()).collect::<Vec<_>>().join(" ")
}

fn push_optgeom(lines: &mut Vec<String>, optimise: &OptimiseConfig, atom_props: &AtomProps) {
    lines.push("OPTGEOM".to_string());
    if let Some(kind) = &optimise.kind {
        lines.push(kind.clone());
    }
    if !atom_props.unfixed.is_empty() {
        lines.push("FRAGMENT".to_string());
        lines.push(atom_props.unfixed.len().to_string());
        lines.push(format!("{} ", join_indices(atom_props.unfixed.iter())));
    }
    if let Some(hessian) = &optimise.hessian {
        lines.push(hessian.clone());
    }
    if let Some(gradient) = &optimise.gradient {
        lines.push(gradient.clone());
    }
    lines.extend(optimise.info_print.iter().cloned());
    push_keywords(lines, &optimise.convergence);
    lines.push("ENDOPT".to_string());
}

fn push_dft(lines: &mut Vec<String>, dft: &DftConfig) {
    lines.push("DFT".to_string());
    match &dft.xc {
        ExchangeCorrelation::Functional(name) => lines.push(name.clone()),
        ExchangeCorrelation::Pair(correlation, exchange) => {
            lines.push("CORRELAT".to_string());
            lines.push(correlation.clone());
            lines.push("EXCHANGE".to_string());
            lines.push(exchange.clone());
        }
        ExchangeCorrelation::Block(block) => push_keywords(lines, block),
    }
    if dft.spin {
        lines.push("SPIN".to_string());
    }
    if let Some(grid) = &dft.grid {
        lines.push(grid.clone());
    }
    if let Some(weights) = &dft.grid_weights {
        lines.push(weights.clone());
    }
    push_keywords(lines, &dft.numerical);
    lines.push("END".to_string());
}

// "ATOMSPIN\n2\n1 1\n2 -1"
fn push_atomspin(lines: &mut Vec<String>, atom_props: &AtomProps) {
    let mut spins: Vec<(usize, i8)> = atom_props
        .spin_alpha
        .iter()
        .map(|i| (*i, 1))
        .chain(atom_props.spin_beta.iter().map(|i| (*i, -1)))
        .collect();
    if spins.is_empty() {
        return;
    }
    spins.sort_unstable();

    lines.push("ATOMSPIN".to_string());
    lines.push(spins.len().to_string());
    for (index, spin) in spins {
        lines.push(format!("{} {}", index, spin));
    }
}

/// 关键字块：开关只输出关键字，参数另起一行
pub fn push_keywords(lines: &mut Vec<String>, block: &KeywordBlock) {
    for (key, arg) in block {
        match arg {
            KeywordArg::Flag(true) => lines.push(key.clone()),
            KeywordArg::Flag(false) => {}
            KeywordArg::Value(value) => {
                lines.push(key.clone());
                lines.push(value.to_string());
            }
            KeywordArg::List(values) => {
                lines.push(key.clone());
                lines.push(values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" "));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{Scalar, ScfConfig};

    const MG_BASIS: &str = "12 3\n0 0 1 2.0 1.0\n 68370.0 1.0\n0 1 1 8.0 1.0\n 0.5 1.0 1.0\n0 1 1 0.0 1.0\n 0.2 1.0 1.0";
    const O_BASIS: &str = "8 2\n0 0 1 2.0 1.0\n 8020.0 1.0\n0 1 1 6.0 1.0\n 0.3 1.0 1.0";

    fn basis_sets() -> Vec<BasisSet> {
        vec![BasisSet::new(MG_BASIS), BasisSet::new(O_BASIS)]
    }

    #[test]
    fn test_minimal_input() {
        let config = CrystalConfig::minimal(KPoints(ShrinkMesh::Uniform(8), 8));
        let text = write_input(&config, &basis_sets(), &AtomProps::default()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "CRYSTAL run");
        assert_eq!(lines[1], "EXTERNAL");
        assert_eq!(lines[2], "END");
        assert_eq!(lines[3], "12 3");
        let sentinel = lines.iter().position(|l| *l == "99 0").unwrap();
        assert_eq!(lines[sentinel + 1], "END");
        assert_eq!(&lines[sentinel + 2..], &["SHRINK", "8 8", "END"]);
    }

    #[test]
    fn test_vector_shrink() {
        let config = CrystalConfig::minimal(KPoints(ShrinkMesh::Vector([10, 8, 2]), 16));
        let text = write_input(&config, &basis_sets(), &AtomProps::default()).unwrap();
        assert!(text.contains("SHRINK\n0 16\n10 8 2\nEND\n"));
    }

    #[test]
    fn test_requires_basis_sets() {
        let config = CrystalConfig::minimal(KPoints(ShrinkMesh::Uniform(8), 8));
        assert_eq!(
            write_input(&config, &[], &AtomProps::default()),
            Err(InputError::NoBasisSets)
        );
    }

    #[test]
    fn test_spin_conflict_rejected() {
        let mut config = CrystalConfig::minimal(KPoints(ShrinkMesh::Uniform(8), 8));
        config
            .scf
            .numerical
            .insert("SPINLOCK".to_string(), KeywordArg::List(vec![Scalar::Int(0), Scalar::Int(30)]));
        let props = AtomProps {
            spin_alpha: [1, 2].into_iter().collect(),
            spin_beta: [2].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            write_input(&config, &basis_sets(), &props),
            Err(InputError::SpinConflict(vec![2]))
        );
    }

    #[test]
    fn test_atomspin_needs_spinlock() {
        let config = CrystalConfig::minimal(KPoints(ShrinkMesh::Uniform(8), 8));
        let props = AtomProps {
            spin_alpha: [1].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            write_input(&config, &basis_sets(), &props),
            Err(InputError::AtomSpinWithoutSpinlock)
        );
    }

    #[test]
    fn test_full_input_layout() {
        let mut numerical = KeywordBlock::new();
        numerical.insert("FMIXING".to_string(), KeywordArg::Value(Scalar::Int(30)));
        numerical.insert(
            "SPINLOCK".to_string(),
            KeywordArg::List(vec![Scalar::Int(0), Scalar::Int(30)]),
        );
        numerical.insert("PPAN".to_string(), KeywordArg::Flag(false));

        let mut convergence = KeywordBlock::new();
        convergence.insert("TOLDEG".to_string(), KeywordArg::Value(Scalar::Float(0.0003)));

        let config = CrystalConfig {
            title: Some("MgO\nbulk".to_string()),
            geometry: crate::models::config::GeometryConfig {
                info_print: vec![],
                info_external: vec![],
                optimise: Some(OptimiseConfig {
                    kind: Some("FULLOPTG".to_string()),
                    hessian: Some("HESSIDEN".to_string()),
                    convergence,
                    ..Default::default()
                }),
            },
            basis_set: KeywordBlock::new(),
            scf: ScfConfig {
                single: Some("UHF".to_string()),
                dft: Some(DftConfig {
                    xc: ExchangeCorrelation::Pair("PBE".to_string(), "PBE".to_string()),
                    spin: true,
                    grid: Some("XLGRID".to_string()),
                    grid_weights: None,
                    numerical: KeywordBlock::new(),
                }),
                k_points: KPoints(ShrinkMesh::Uniform(8), 8),
                guessp: true,
                numerical,
                post_scf: vec!["PPAN".to_string()],
            },
        };
        let props = AtomProps {
            spin_alpha: [2].into_iter().collect(),
            spin_beta: [1].into_iter().collect(),
            unfixed: [2, 1].into_iter().collect(),
            ghosts: [3].into_iter().collect(),
        };

        let text = write_input(&config, &basis_sets(), &props).unwrap();
        let expected_head = "MgO bulk\nEXTERNAL\nOPTGEOM\nFULLOPTG\nFRAGMENT\n2\n1 2 \nHESSIDEN\nTOLDEG\n0.0003\nENDOPT\nEND\n";
        assert!(text.starts_with(expected_head), "{}", text);
        assert!(text.contains("99 0\nGHOSTS\n1\n3\nEND\n"));
        assert!(text.contains("UHF\nDFT\nCORRELAT\nPBE\nEXCHANGE\nPBE\nSPIN\nXLGRID\nEND\n"));
        assert!(text.ends_with(
            "SHRINK\n8 8\nGUESSP\nATOMSPIN\n2\n1 -1\n2 1\nFMIXING\n30\nSPINLOCK\n0 30\nPPAN\nEND\n"
        ));
    }
}
