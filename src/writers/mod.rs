//! # 输入文件生成模块
//!
//! ## 依赖关系
//! - 被 `commands/write.rs` 使用
//! - 子模块: d12, atom_props

pub mod atom_props;
pub mod d12;

pub use atom_props::{create_atom_props, KindTable};
pub use d12::write_input;
