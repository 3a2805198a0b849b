//! # 晶体结构数据模型
//!
//! 统一的结构表示：晶格、周期性、原子（元素、笛卡尔坐标、kind 标签）。
//! 既用于解析输出中的几何，也作为输入生成时的结构描述（JSON 反序列化）。
//!
//! ## 依赖关系
//! - 被 `parsers/stdout/geometry.rs` 使用
//! - 被 `writers/atom_props.rs`, `commands/write.rs` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};

/// 0D 体系使用的人工盒子边长 (Å)
pub const MOLECULE_BOX_LENGTH: f64 = 500.0;

/// 元素符号表，下标 + 1 即原子序数
const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// 原子序数 -> 元素符号
pub fn symbol_from_number(z: u32) -> Option<&'static str> {
    if z == 0 {
        return None;
    }
    ELEMENTS.get(z as usize - 1).copied()
}

/// 元素符号（大小写不敏感）-> 原子序数
pub fn number_from_symbol(symbol: &str) -> Option<u32> {
    ELEMENTS
        .iter()
        .position(|e| e.eq_ignore_ascii_case(symbol))
        .map(|i| i as u32 + 1)
}

/// 规范化元素符号，例如 "MG" -> "Mg"
pub fn normalize_symbol(symbol: &str) -> String {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) => {
            first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
        }
        None => String::new(),
    }
}

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let cos_gamma = gamma.to_radians().cos();
        let sin_gamma = gamma.to_radians().sin();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).max(0.0).sqrt();

        Lattice {
            matrix: [a_vec, b_vec, [c1, c2, c3]],
        }
    }

    /// 0D 体系的人工立方盒子
    pub fn molecule_box() -> Self {
        let l = MOLECULE_BOX_LENGTH;
        Lattice {
            matrix: [[l, 0.0, 0.0], [0.0, l, 0.0], [0.0, 0.0, l]],
        }
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a_vec, b_vec, c_vec] = self.matrix;

        let a = norm(a_vec);
        let b = norm(b_vec);
        let c = norm(c_vec);

        let alpha = (dot(b_vec, c_vec) / (b * c)).acos().to_degrees();
        let beta = (dot(a_vec, c_vec) / (a * c)).acos().to_degrees();
        let gamma = (dot(a_vec, b_vec) / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 混合坐标转笛卡尔坐标
    ///
    /// 周期方向上的分量视为分数坐标，非周期方向上的分量视为笛卡尔坐标 (Å)。
    pub fn mixed_to_cartesian(&self, coords: [f64; 3], pbc: [bool; 3]) -> [f64; 3] {
        let mut cart = [0.0; 3];
        for axis in 0..3 {
            if pbc[axis] {
                for (k, c) in cart.iter_mut().enumerate() {
                    *c += coords[axis] * self.matrix[axis][k];
                }
            } else {
                cart[axis] += coords[axis];
            }
        }
        cart
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 笛卡尔坐标 [x, y, z] (Å)
    pub position: [f64; 3],

    /// 可选：kind 标签（用于区分同种元素的不同自旋/约束设置）
    #[serde(default)]
    pub kind: Option<String>,
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// kind 名称，缺省为元素符号
    pub fn kind_name(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.element)
    }
}

fn default_pbc() -> [bool; 3] {
    [true, true, true]
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// 晶格
    pub lattice: Lattice,

    /// 周期性
    #[serde(default = "default_pbc")]
    pub pbc: [bool; 3],

    /// 原子列表
    pub atoms: Vec<Atom>,
}

impl Structure {
    pub fn new(lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Structure {
            lattice,
            pbc: default_pbc(),
            atoms,
        }
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// 维度（周期方向数）
    pub fn dimensionality(&self) -> usize {
        self.pbc.iter().filter(|p| **p).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lattice_from_parameters_cubic() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let (a, b, c, alpha, beta, gamma) = lattice.parameters();

        assert_relative_eq!(a, 5.0, epsilon = 1e-6);
        assert_relative_eq!(b, 5.0, epsilon = 1e-6);
        assert_relative_eq!(c, 5.0, epsilon = 1e-6);
        assert_relative_eq!(alpha, 90.0, epsilon = 1e-6);
        assert_relative_eq!(beta, 90.0, epsilon = 1e-6);
        assert_relative_eq!(gamma, 90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_lattice_fcc_primitive() {
        // MgO 原胞
        let lattice = Lattice::from_parameters(2.977, 2.977, 2.977, 60.0, 60.0, 60.0);
        let (a, _, c, alpha, _, gamma) = lattice.parameters();
        assert_relative_eq!(a, 2.977, epsilon = 1e-6);
        assert_relative_eq!(c, 2.977, epsilon = 1e-6);
        assert_relative_eq!(alpha, 60.0, epsilon = 1e-6);
        assert_relative_eq!(gamma, 60.0, epsilon = 1e-6);
    }

    #[test]
    fn test_mixed_to_cartesian_slab() {
        let lattice = Lattice {
            matrix: [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 500.0]],
        };
        let cart = lattice.mixed_to_cartesian([0.5, 0.25, 1.2], [true, true, false]);
        assert_relative_eq!(cart[0], 2.0);
        assert_relative_eq!(cart[1], 1.0);
        assert_relative_eq!(cart[2], 1.2);
    }

    #[test]
    fn test_element_lookup() {
        assert_eq!(number_from_symbol("MG"), Some(12));
        assert_eq!(number_from_symbol("o"), Some(8));
        assert_eq!(symbol_from_number(26), Some("Fe"));
        assert_eq!(symbol_from_number(0), None);
        assert_eq!(normalize_symbol("MG"), "Mg");
    }

    #[test]
    fn test_structure_from_json_defaults() {
        let json = r#"{
            "lattice": {"matrix": [[4.0,0,0],[0,4.0,0],[0,0,4.0]]},
            "atoms": [
                {"element": "Ni", "position": [0,0,0], "kind": "Ni1"},
                {"element": "O", "position": [2,2,2]}
            ]
        }"#;
        let structure: Structure = serde_json::from_str(json).unwrap();
        assert_eq!(structure.pbc, [true, true, true]);
        assert_eq!(structure.atoms[0].kind_name(), "Ni1");
        assert_eq!(structure.atoms[1].kind_name(), "O");
        assert_eq!(structure.formula(), "NiO");
        assert_eq!(structure.dimensionality(), 3);
    }
}
