//! # 逐原子属性构建
//!
//! 按 kind 名称为结构中的每个原子打标签，得到写入器使用的 `AtomProps`。
//! kind 表示例（JSON）：
//! ```text
//! {"Fe1": {"spin_alpha": true}, "Fe2": {"spin_beta": true}, "O": {"fixed": true}}
//! ```
//! 未出现在表中的 kind 不带任何属性。`unfixed` 是 `fixed` 的补集，
//! 没有任何原子被固定时为空（不输出 FRAGMENT）。
//!
//! ## 依赖关系
//! - 被 `commands/write.rs` 使用
//! - 使用 `models/structure.rs`, `models/config.rs`

use crate::error::InputError;
use crate::models::{AtomProps, Structure};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 单个 kind 的属性开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindFlags {
    #[serde(default)]
    pub spin_alpha: bool,
    #[serde(default)]
    pub spin_beta: bool,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub ghosts: bool,
}

/// kind 名称 -> 属性开关
pub type KindTable = BTreeMap<String, KindFlags>;

/// 由结构与 kind 表生成逐原子属性
pub fn create_atom_props(structure: &Structure, kinds: &KindTable) -> Result<AtomProps, InputError> {
    let present: BTreeSet<&str> = structure.atoms.iter().map(|a| a.kind_name()).collect();
    if let Some(unknown) = kinds.keys().find(|k| !present.contains(k.as_str())) {
        return Err(InputError::UnknownKind(unknown.clone()));
    }

    let mut props = AtomProps::default();
    let mut fixed = BTreeSet::new();
    for (i, atom) in structure.atoms.iter().enumerate() {
        let index = i + 1;
        let Some(flags) = kinds.get(atom.kind_name()) else {
            continue;
        };
        if flags.spin_alpha {
            props.spin_alpha.insert(index);
        }
        if flags.spin_beta {
            props.spin_beta.insert(index);
        }
        if flags.ghosts {
            props.ghosts.insert(index);
        }
        if flags.fixed {
            fixed.insert(index);
        }
    }

    if !fixed.is_empty() {
        props.unfixed = (1..=structure.atoms.len()).filter(|i| !fixed.contains(i)).collect();
    }

    props.validate()?;
    Ok(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn feo() -> Structure {
        Structure::new(
            Lattice::from_parameters(4.3, 4.3, 4.3, 90.0, 90.0, 90.0),
            vec![
                Atom::new("Fe", [0.0, 0.0, 0.0]).with_kind("Fe1"),
                Atom::new("Fe", [2.15, 2.15, 0.0]).with_kind("Fe2"),
                Atom::new("O", [2.15, 0.0, 0.0]),
                Atom::new("O", [0.0, 2.15, 0.0]),
            ],
        )
    }

    #[test]
    fn test_kind_flags() {
        let kinds: KindTable = serde_json::from_str(
            r#"{"Fe1": {"spin_alpha": true}, "Fe2": {"spin_beta": true}, "O": {"fixed": true}}"#,
        )
        .unwrap();
        let props = create_atom_props(&feo(), &kinds).unwrap();

        assert_eq!(props.spin_alpha, BTreeSet::from([1]));
        assert_eq!(props.spin_beta, BTreeSet::from([2]));
        assert_eq!(props.unfixed, BTreeSet::from([1, 2]));
        assert!(props.ghosts.is_empty());
    }

    #[test]
    fn test_nothing_fixed_means_no_fragment() {
        let kinds: KindTable = serde_json::from_str(r#"{"O": {"ghosts": true}}"#).unwrap();
        let props = create_atom_props(&feo(), &kinds).unwrap();
        assert!(props.unfixed.is_empty());
        assert_eq!(props.ghosts, BTreeSet::from([3, 4]));
    }

    #[test]
    fn test_unknown_kind() {
        let kinds: KindTable = serde_json::from_str(r#"{"Mn": {"spin_alpha": true}}"#).unwrap();
        assert_eq!(
            create_atom_props(&feo(), &kinds),
            Err(InputError::UnknownKind("Mn".to_string()))
        );
    }

    #[test]
    fn test_conflicting_spins() {
        let kinds: KindTable =
            serde_json::from_str(r#"{"Fe1": {"spin_alpha": true, "spin_beta": true}}"#).unwrap();
        assert_eq!(
            create_atom_props(&feo(), &kinds),
            Err(InputError::SpinConflict(vec![1]))
        );
    }
}
