//! # 数据模型模块
//!
//! 定义解析记录、诊断信息、输入配置、基组与结构模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `writers/` 和 `commands/` 使用
//! - 子模块: record, diagnostics, config, basis, structure

pub mod basis;
pub mod config;
pub mod diagnostics;
pub mod record;
pub mod structure;

pub use basis::BasisSet;
pub use config::{AtomProps, CrystalConfig, KPoints, ShrinkMesh};
pub use diagnostics::{Diagnostics, ExitCode, OutcomeFlags};
pub use record::{deep_merge, Record, Value};
pub use structure::{Atom, Lattice, Structure};
