//! # DOSS 态密度导出
//!
//! 读取 fort.25 中的 DOSS 投影，导出 CSV 并可选绘图。
//!
//! ## 功能
//! - 能量以 eV 为单位，可平移使 Fermi 能级为零
//! - 每个投影一列 CSV
//! - 使用 plotters 绘制所有投影曲线
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 使用 `parsers/doss_f25.rs`

use crate::cli::analyze::DossArgs;
use crate::error::{CrystoolError, Result};
use crate::parsers::{self, doss_f25::DossF25};
use crate::utils::output;

use std::path::Path;

/// 能量网格（可选平移到 Fermi 能级）
fn energy_axis(doss: &DossF25, shift_fermi: bool) -> Vec<f64> {
    let shift = if shift_fermi { doss.fermi_energy } else { 0.0 };
    doss.energies.iter().map(|e| e - shift).collect()
}

/// 执行 DOSS 导出
pub fn execute(args: DossArgs) -> Result<()> {
    output::print_header("Exporting DOSS");

    let doss = parsers::read_doss_f25_file(&args.input)?;
    output::print_info(&format!(
        "{} projections x {} points, Fermi level {:.4} eV",
        doss.projections.len(),
        doss.n_points(),
        doss.fermi_energy
    ));

    let energies = energy_axis(&doss, args.shift_fermi);
    save_csv(&energies, &doss.projections, &args.output_csv)?;
    output::print_success(&format!("DOS data saved to '{}'", args.output_csv.display()));

    if let Some(plot) = &args.plot {
        let fermi = if args.shift_fermi { 0.0 } else { doss.fermi_energy };
        generate_plot(&energies, &doss.projections, fermi, plot, (args.width, args.height))?;
        output::print_success(&format!("DOS plot saved to '{}'", plot.display()));
    }
    Ok(())
}

/// 保存 DOS 到 CSV
fn save_csv(energies: &[f64], projections: &[Vec<f64>], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    let mut header = vec!["energy_eV".to_string()];
    header.extend((1..=projections.len()).map(|i| format!("projection_{}", i)));
    wtr.write_record(&header)?;

    for (i, energy) in energies.iter().enumerate() {
        let mut row = vec![format!("{:.6}", energy)];
        row.extend(projections.iter().map(|p| format!("{:.6e}", p[i])));
        wtr.write_record(&row)?;
    }

    wtr.flush().map_err(|e| CrystoolError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

/// 绘制所有投影
fn generate_plot(
    energies: &[f64],
    projections: &[Vec<f64>],
    fermi: f64,
    output_path: &Path,
    size: (u32, u32),
) -> Result<()> {
    use plotters::prelude::*;

    let (Some(&x_min), Some(&x_max)) = (energies.first(), energies.last()) else {
        return Err(CrystoolError::Other("No data to plot".to_string()));
    };
    let y_min = projections
        .iter()
        .flatten()
        .copied()
        .fold(0.0_f64, f64::min);
    let y_max = projections
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let y_margin = (y_max - y_min).abs().max(1e-12) * 0.05;

    let root = BitMapBackend::new(output_path, size).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| CrystoolError::Other(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Density of States", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, (y_min - y_margin)..(y_max + y_margin))
        .map_err(|e| CrystoolError::Other(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc("Energy (eV)")
        .y_desc("DOS (states/Hartree)")
        .draw()
        .map_err(|e| CrystoolError::Other(e.to_string()))?;

    for (i, projection) in projections.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(
                energies.iter().copied().zip(projection.iter().copied()),
                color.stroke_width(2),
            ))
            .map_err(|e| CrystoolError::Other(e.to_string()))?
            .label(format!("Projection {}", i + 1))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }

    // Fermi 能级
    chart
        .draw_series(LineSeries::new(
            vec![(fermi, y_min - y_margin), (fermi, y_max + y_margin)],
            BLACK.stroke_width(1),
        ))
        .map_err(|e| CrystoolError::Other(e.to_string()))?
        .label("Fermi level")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLACK));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(|e| CrystoolError::Other(e.to_string()))?;

    root.present()
        .map_err(|e| CrystoolError::Other(e.to_string()))?;

    Ok(())
}
