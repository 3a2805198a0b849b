//! # 几何优化扫描器
//!
//! 优化段以 `OPTOPTOPT...` 开始、以 `OPT END -` 结束，中间按
//! `OPTIMIZATION - POINT n` 切分为若干步；第一个标记之前的前导部分是初始点（第 1 步）。
//!
//! 每一步提取：嵌套 SCF、总能量、（打印时的）几何、四项收敛判据。
//! 含 `WITH SMALLER STEP` 的步是被引擎回退重做的尝试，不作为记录点保留。
//!
//! ## 依赖关系
//! - 被 `parsers/stdout/mod.rs` 使用
//! - 使用 `scf.rs`, `energy.rs`, `geometry.rs`

use super::energy::read_post_scf;
use super::geometry::read_geometry_block;
use super::scf::{read_scf, SCF_START};
use super::{find_line, HARTREE_TO_EV};
use crate::error::{ScanError, ScanResult};
use crate::models::{deep_merge, Record, Value};
use crate::parsers::numbers::{extract_numbers, number_after};

pub const OPT_START: &str = "OPTOPTOPT";
pub const OPT_FIRST_CYCLE: &str = "CONVERGENCE TESTS SATISFIED AFTER THE FIRST OPTIMIZATION CYCLE";
pub const OPT_END: &str = "OPT END -";
const POINT_LANDMARK: &str = "OPTIMIZATION - POINT";
const RETRY_LANDMARK: &str = "WITH SMALLER STEP";

/// 收敛判据：(输出键, 行首标记)
const CRITERIA: [(&str, &str); 4] = [
    ("max_gradient", "MAX GRADIENT"),
    ("rms_gradient", "RMS GRADIENT"),
    ("max_displacement", "MAX DISPLAC."),
    ("rms_displacement", "RMS DISPLAC."),
];

/// 优化段的扫描结果
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisationOutcome {
    /// 保留的优化步（按出现顺序）
    pub steps: Vec<Record>,
    /// `OPT END - CONVERGED`
    pub converged: bool,
    /// `OPT END` 行报告的最终能量 (eV)
    pub energy: Option<f64>,
    /// `OPT END` 行报告的点数
    pub n_points: Option<i64>,
    /// 所有嵌套 SCF 是否收敛（没有嵌套 SCF 时为 None）
    pub scf_converged: Option<bool>,
}

// " MAX GRADIENT      0.000033  THRESHOLD              0.000450 CONVERGED YES"
fn read_criteria(lines: &[&str], start: usize, end: usize) -> Record {
    let mut convergence = Record::new();
    for line in &lines[start..end] {
        let trimmed = line.trim_start();
        for (key, marker) in CRITERIA {
            if !trimmed.starts_with(marker) {
                continue;
            }
            let values = extract_numbers(&trimmed[marker.len()..]);
            if values.len() >= 2 {
                convergence.insert(
                    key,
                    Record::new()
                        .with("value", values[0])
                        .with("threshold", values[1])
                        .with("converged", line.contains("CONVERGED YES")),
                );
            }
        }
    }
    convergence
}

/// 读取一个优化步 `[start, end)`
fn read_step(
    lines: &[&str],
    start: usize,
    end: usize,
    point: i64,
    dimensionality: usize,
    scf_flags: &mut Vec<bool>,
) -> ScanResult<Record> {
    let mut step = Record::new().with("point", point);

    let mut scf_runs = Vec::new();
    let mut idx = start;
    while let Some(scf_start) = find_line(lines, idx, end, SCF_START) {
        let (next, scf) = read_scf(lines, scf_start, end)?;
        if let Some(converged) = scf.get("converged").and_then(Value::as_bool) {
            scf_flags.push(converged);
        }
        scf_runs.push(Value::Record(scf));
        idx = next;
    }
    if !scf_runs.is_empty() {
        step.insert("scf", scf_runs);
    }

    step = deep_merge(step, read_post_scf(lines, start, end)?);

    if find_line(lines, start, end, "ATOMS IN THE ASYMMETRIC UNIT").is_some() {
        let (_, geometry) = read_geometry_block(lines, start, end, dimensionality)?;
        step = deep_merge(step, geometry);
    }

    let convergence = read_criteria(lines, start, end);
    if !convergence.is_empty() {
        step.insert("convergence", convergence);
    }
    Ok(step)
}

/// 读取优化段
///
/// `start` 指向 `OPTOPTOPT` 或首轮即收敛的标记行，窗口 `[start, end)` 必须包含 `OPT END -` 行。
pub fn read_optimisation(
    lines: &[&str],
    start: usize,
    end: usize,
    dimensionality: usize,
) -> ScanResult<(usize, OptimisationOutcome)> {
    let end = end.min(lines.len());
    let opt_end = find_line(lines, start, end, OPT_END).ok_or_else(|| ScanError::eof(end, OPT_END))?;

    let points: Vec<usize> = (start..opt_end)
        .filter(|&i| lines[i].contains(POINT_LANDMARK))
        .collect();

    let mut bounds = Vec::with_capacity(points.len() + 1);
    let first = points.first().copied().unwrap_or(opt_end);
    bounds.push((1, start, first));
    for (k, &p) in points.iter().enumerate() {
        let number = number_after(lines[p], POINT_LANDMARK)
            .map(|n| n as i64)
            .ok_or_else(|| ScanError::unexpected(p, "OPTIMIZATION - POINT <n>", lines[p].trim()))?;
        let block_end = points.get(k + 1).copied().unwrap_or(opt_end);
        bounds.push((number, p, block_end));
    }

    let mut steps = Vec::new();
    let mut scf_flags = Vec::new();
    for (point, block_start, block_end) in bounds {
        if find_line(lines, block_start, block_end, RETRY_LANDMARK).is_some() {
            log::debug!("discarding optimisation point {} retried with a smaller step", point);
            continue;
        }
        let step = read_step(lines, block_start, block_end, point, dimensionality, &mut scf_flags)?;
        steps.push(step);
    }

    // "* OPT END - CONVERGED * E(AU):  -2.756574581553E+02  POINTS    4 *"
    let end_line = lines[opt_end];
    let converged = end_line.contains("OPT END - CONVERGED");
    if !converged && !end_line.contains("OPT END - FAILED") {
        return Err(ScanError::unexpected(opt_end, "OPT END - CONVERGED|FAILED", end_line.trim()));
    }

    let outcome = OptimisationOutcome {
        steps,
        converged,
        energy: number_after(end_line, "E(AU):").map(|e| e * HARTREE_TO_EV),
        n_points: number_after(end_line, "POINTS").map(|n| n as i64),
        scf_converged: if scf_flags.is_empty() {
            None
        } else {
            Some(scf_flags.iter().all(|c| *c))
        },
    };
    Ok((opt_end + 1, outcome))
}
