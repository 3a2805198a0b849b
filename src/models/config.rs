//! # 输入配置数据模型
//!
//! `.d12` 输入文件的类型化配置。原本 "可能是列表、字典或标量" 的字段
//! 在这里都是显式的标签联合（`KeywordArg`, `ShrinkMesh`, `ExchangeCorrelation`），
//! 由 `writers/d12.rs` 按变体分别序列化。
//!
//! 配置文件为 JSON，例如：
//! ```text
//! {
//!   "title": "MgO bulk",
//!   "geometry": {"optimise": {"type": "FULLOPTG", "convergence": {"TOLDEG": 0.0003}}},
//!   "scf": {
//!     "dft": {"xc": ["PBE", "PBE"], "SPIN": true},
//!     "k_points": [8, 8],
//!     "numerical": {"FMIXING": 30, "TOLINTEG": [7, 7, 7, 7, 14]}
//!   }
//! }
//! ```
//!
//! ## 依赖关系
//! - 被 `writers/d12.rs`, `parsers/d12.rs` 使用
//! - 被 `commands/write.rs` 反序列化

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 关键字参数中的标量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", format_float(*v)),
            Scalar::Text(v) => write!(f, "{}", v),
        }
    }
}

/// 浮点数格式化：整数值保留一位小数，其余使用最短表示
pub fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

/// 关键字参数：开关、单值或多值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordArg {
    Flag(bool),
    List(Vec<Scalar>),
    Value(Scalar),
}

/// 关键字块（按关键字字母序输出）
pub type KeywordBlock = BTreeMap<String, KeywordArg>;

/// 几何优化设置 (OPTGEOM)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimiseConfig {
    /// 优化类型，如 FULLOPTG, CELLONLY, ITATOCEL
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// 初始 Hessian，如 HESSIDEN, HESSMOD1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hessian: Option<String>,
    /// 梯度计算方式，如 NUMGRATO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info_print: Vec<String>,
    /// 收敛阈值，如 TOLDEG, TOLDEX, TOLDEE, MAXCYCLE
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub convergence: KeywordBlock,
}

/// 几何块设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometryConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info_print: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info_external: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimise: Option<OptimiseConfig>,
}

/// 交换关联泛函
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExchangeCorrelation {
    /// 单个关键字，如 "PBE0"
    Functional(String),
    /// [关联, 交换]，分别输出为 CORRELAT / EXCHANGE
    Pair(String, String),
    /// 带参数的关键字块
    Block(KeywordBlock),
}

/// DFT 块设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DftConfig {
    pub xc: ExchangeCorrelation,
    #[serde(rename = "SPIN", default)]
    pub spin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_weights: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub numerical: KeywordBlock,
}

/// Monkhorst-Pack 收缩因子：标量或三分量向量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShrinkMesh {
    Uniform(u32),
    Vector([u32; 3]),
}

/// k 点网格 [IS, ISP]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KPoints(pub ShrinkMesh, pub u32);

/// 哈密顿量与 SCF 块设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScfConfig {
    /// 单行列式类型：RHF, UHF, ROHF
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dft: Option<DftConfig>,
    pub k_points: KPoints,
    /// 从上一次计算的密度矩阵重启
    #[serde(rename = "GUESSP", default)]
    pub guessp: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub numerical: KeywordBlock,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_scf: Vec<String>,
}

/// 完整输入配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrystalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub geometry: GeometryConfig,
    /// 基组块可选关键字（在 `99 0` 之后输出）
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub basis_set: KeywordBlock,
    pub scf: ScfConfig,
}

impl CrystalConfig {
    /// 仅含 k 点的最小配置
    pub fn minimal(k_points: KPoints) -> Self {
        CrystalConfig {
            title: None,
            geometry: GeometryConfig::default(),
            basis_set: KeywordBlock::new(),
            scf: ScfConfig {
                single: None,
                dft: None,
                k_points,
                guessp: false,
                numerical: KeywordBlock::new(),
                post_scf: Vec::new(),
            },
        }
    }
}

/// 逐原子属性集合（1-based 原子序号）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomProps {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub spin_alpha: BTreeSet<usize>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub spin_beta: BTreeSet<usize>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unfixed: BTreeSet<usize>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ghosts: BTreeSet<usize>,
}

impl AtomProps {
    /// 属性名允许值
    pub const NAMES: [&'static str; 4] = ["spin_alpha", "spin_beta", "unfixed", "ghosts"];

    /// 从名称映射构造，拒绝未知属性名
    pub fn from_map(map: BTreeMap<String, Vec<usize>>) -> Result<Self, InputError> {
        let mut props = AtomProps::default();
        for (name, indices) in map {
            let target = match name.as_str() {
                "spin_alpha" => &mut props.spin_alpha,
                "spin_beta" => &mut props.spin_beta,
                "unfixed" => &mut props.unfixed,
                "ghosts" => &mut props.ghosts,
                _ => return Err(InputError::UnknownAtomProperty(name)),
            };
            target.extend(indices);
        }
        Ok(props)
    }

    /// 同时出现在两个自旋列表中的原子
    pub fn spin_conflicts(&self) -> Vec<usize> {
        self.spin_alpha.intersection(&self.spin_beta).copied().collect()
    }

    /// 校验属性集合不变量
    pub fn validate(&self) -> Result<(), InputError> {
        let conflicts = self.spin_conflicts();
        if !conflicts.is_empty() {
            return Err(InputError::SpinConflict(conflicts));
        }
        if let Some(zero) = [&self.spin_alpha, &self.spin_beta, &self.unfixed, &self.ghosts]
            .iter()
            .find_map(|set| set.iter().find(|i| **i == 0))
        {
            return Err(InputError::AtomIndexOutOfRange {
                index: *zero,
                n_atoms: 0,
            });
        }
        Ok(())
    }
}
