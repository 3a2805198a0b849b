//! # cube 文件分析
//!
//! ## 依赖关系
//! - 使用 `parsers/cube.rs`

use crate::cli::analyze::CubeArgs;
use crate::error::Result;
use crate::models::Value;
use crate::parsers;
use crate::utils::output;

use tabled::{Table, Tabled};

#[derive(Debug, Clone, Tabled)]
struct CubeRow {
    #[tabled(rename = "Property")]
    property: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// 执行 cube 分析
pub fn execute(args: CubeArgs) -> Result<()> {
    output::print_header("Analyzing Cube File");

    let cube = parsers::read_cube_file(&args.input)?;
    let [nx, ny, nz] = cube.shape;
    let summary = cube.summary();
    let bound = |key: &str| {
        summary
            .get(key)
            .and_then(Value::as_f64)
            .map(|v| format!("{:.6e}", v))
            .unwrap_or_else(|| "-".to_string())
    };

    let rows = vec![
        CubeRow {
            property: "Title",
            value: cube.comments[0].trim().to_string(),
        },
        CubeRow {
            property: "Grid",
            value: format!("{} x {} x {}", nx, ny, nz),
        },
        CubeRow {
            property: "Atoms",
            value: cube.atoms.len().to_string(),
        },
        CubeRow {
            property: "Datasets",
            value: cube.dataset_ids.len().max(1).to_string(),
        },
        CubeRow {
            property: "Voxel volume (bohr^3)",
            value: format!("{:.6e}", cube.voxel_volume()),
        },
        CubeRow {
            property: "Min / Max",
            value: format!("{} / {}", bound("min"), bound("max")),
        },
        CubeRow {
            property: "Integral",
            value: format!("{:.6}", cube.integrate()),
        },
    ];
    println!("{}", Table::new(&rows));
    Ok(())
}
