//! # CRYSTAL 主输出解析器
//!
//! 对引擎 stdout 做一次自上而下的扫描：
//! 1. 预扫描错误/警告/耗时
//! 2. 读取启动横幅中的版本信息
//! 3. 通过地标规则表定位各段（几何输入、SCF、优化、最终几何、Mulliken）
//! 4. 将各段交给对应扫描器，扫描失败按段捕获
//! 5. 深度合并各段片段为 `initial` / `optimisation` / `final` / `mulliken`
//! 6. 按固定优先级给出退出分类
//!
//! ## 依赖关系
//! - 被 `commands/parse.rs`, `commands/collect.rs` 使用
//! - 子模块: geometry, setup, scf, energy, optimisation, mulliken, band_gap
//! - 使用 `models/record.rs`, `models/diagnostics.rs`

pub mod band_gap;
pub mod energy;
pub mod geometry;
pub mod mulliken;
pub mod optimisation;
pub mod scf;
pub mod setup;

use crate::error::ScanError;
use crate::models::diagnostics::classify_exit;
use crate::models::{deep_merge, Diagnostics, ExitCode, OutcomeFlags, Record, Value};
use crate::parsers::numbers::number_after;
use regex::Regex;
use std::sync::LazyLock;

/// Hartree -> eV (CODATA 2014)
pub const HARTREE_TO_EV: f64 = 27.21138602;

pub const RUN_START: &str = "EEEEEEEEEE STARTING";
pub const RUN_END: &str = "EEEEEEEEEE TERMINATION";

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bCRYSTAL(\d{2})\b").expect("version regex is valid"));
static SUBVERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:public|user)\s*:\s*(\d+(?:\.\d+)*)").expect("subversion regex is valid")
});

/// 在 `[from, to)` 中查找第一个包含 `pattern` 的行
pub fn find_line(lines: &[&str], from: usize, to: usize, pattern: &str) -> Option<usize> {
    let to = to.min(lines.len());
    (from..to).find(|&i| lines[i].contains(pattern))
}

/// 输出单位说明
pub fn units_record() -> Record {
    Record::new()
        .with("angle", "degrees")
        .with("energy", "eV")
        .with("length", "angstrom")
        .with("conversion", "CODATA2014")
}

/// 预扫描：收集引擎错误与警告，返回最后一个 `TELAPSE` 值
pub fn prescan(lines: &[&str], diagnostics: &mut Diagnostics) -> Option<f64> {
    let mut elapsed = None;
    for line in lines {
        let text = line.trim();
        // 每行只归入一类；警告中可能出现 "ERROR ESTIMATE" 之类的字样
        if line.contains("WARNING") {
            diagnostics.warnings.push(text.to_string());
        } else if line.contains("ERROR") || line.contains("SCF abnormal end") {
            diagnostics.errors.push(text.to_string());
        } else if line.contains("MPI_Abort") {
            // 每个进程都会打印一次，只保留一条
            if !diagnostics.errors.iter().any(|e| e.contains("MPI_Abort")) {
                diagnostics.errors.push(text.to_string());
            }
        }
        if let Some(t) = number_after(line, "TELAPSE") {
            elapsed = Some(t);
        }
    }
    elapsed
}

/// 读取启动横幅中的版本号
pub fn read_header(lines: &[&str], end: usize) -> Record {
    let mut header = Record::new();
    for line in &lines[..end.min(lines.len())] {
        if !header.contains_key("crystal_version") {
            if let Some(v) = VERSION_RE.captures(line).and_then(|c| c[1].parse::<i64>().ok()) {
                header.insert("crystal_version", v);
            }
        }
        if !header.contains_key("crystal_subversion") {
            if let Some(c) = SUBVERSION_RE.captures(line) {
                header.insert("crystal_subversion", &c[1]);
            }
        }
    }
    header
}

/// 段落地标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Landmark {
    GeometryEditing,
    InitialGeometry,
    ScfStart,
    ScfEnd,
    OptStart,
    OptEnd,
    FinalGeometry,
    Mulliken,
}

/// 地标规则表：按顺序匹配，每行至多命中一条
const LANDMARKS: &[(&str, Landmark)] = &[
    ("GEOMETRY EDITING", Landmark::GeometryEditing),
    ("GEOMETRY FOR WAVE FUNCTION - DIMENSIONALITY OF THE SYSTEM", Landmark::InitialGeometry),
    ("FINAL OPTIMIZED GEOMETRY - DIMENSIONALITY OF THE SYSTEM", Landmark::FinalGeometry),
    (scf::SCF_START, Landmark::ScfStart),
    (scf::SCF_END, Landmark::ScfEnd),
    (optimisation::OPT_START, Landmark::OptStart),
    (optimisation::OPT_FIRST_CYCLE, Landmark::OptStart),
    (optimisation::OPT_END, Landmark::OptEnd),
    (mulliken::MULLIKEN_LANDMARK, Landmark::Mulliken),
];

/// 各地标出现的行号
#[derive(Debug, Default)]
struct SectionIndex {
    geometry_editing: Option<usize>,
    initial_geometry: Vec<usize>,
    scf_start: Vec<usize>,
    scf_end: Vec<usize>,
    opt_start: Option<usize>,
    opt_end: Vec<usize>,
    final_geometry: Vec<usize>,
    mulliken: Vec<usize>,
}

impl SectionIndex {
    fn build(lines: &[&str], start: usize, end: usize) -> Self {
        let mut index = SectionIndex::default();
        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let Some((_, landmark)) = LANDMARKS.iter().find(|(p, _)| line.contains(p)) else {
                continue;
            };
            match landmark {
                Landmark::GeometryEditing => {
                    index.geometry_editing.get_or_insert(i);
                }
                Landmark::InitialGeometry => index.initial_geometry.push(i),
                Landmark::ScfStart => index.scf_start.push(i),
                Landmark::ScfEnd => index.scf_end.push(i),
                Landmark::OptStart => {
                    index.opt_start.get_or_insert(i);
                }
                Landmark::OptEnd => index.opt_end.push(i),
                Landmark::FinalGeometry => index.final_geometry.push(i),
                Landmark::Mulliken => index.mulliken.push(i),
            }
        }
        index
    }
}

/// 将 SCF 起止地标配对，每个起点必须在下一个起点之前闭合
fn pair_scf(starts: &[usize], ends: &[usize]) -> Result<Vec<(usize, usize)>, ScanError> {
    let mut pairs = Vec::new();
    let mut ends = ends.iter().copied().peekable();
    for (k, &s) in starts.iter().enumerate() {
        if let Some(&e) = ends.peek() {
            if e < s {
                return Err(ScanError::unexpected(e, scf::SCF_START, unmatched(scf::SCF_END)));
            }
        }
        let next_start = starts.get(k + 1).copied().unwrap_or(usize::MAX);
        match ends.next() {
            Some(e) if e < next_start => pairs.push((s, e)),
            _ => {
                return Err(ScanError::unexpected(
                    s,
                    format!("{} before the next SCF start", scf::SCF_END),
                    "unterminated SCF",
                ))
            }
        }
    }
    if let Some(e) = ends.next() {
        return Err(ScanError::unexpected(e, scf::SCF_START, unmatched(scf::SCF_END)));
    }
    Ok(pairs)
}

fn unmatched(landmark: &str) -> String {
    format!("{} without a matching start", landmark)
}

/// `candidates` 中不小于 `from` 的最小值（窗口右边界）
fn next_boundary(from: usize, candidates: &[Option<usize>], default: usize) -> usize {
    candidates
        .iter()
        .flatten()
        .copied()
        .filter(|&c| c >= from)
        .min()
        .unwrap_or(default)
        .min(default)
}

/// 主输出解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct StdoutOutcome {
    /// 嵌套结果（含 units 与四类诊断列表）
    pub data: Record,
    pub diagnostics: Diagnostics,
    pub flags: OutcomeFlags,
    /// `None` 表示成功
    pub exit_code: Option<ExitCode>,
}

impl StdoutOutcome {
    pub(crate) fn finish(data: Record, diagnostics: Diagnostics, flags: OutcomeFlags) -> Self {
        let exit_code = classify_exit(&diagnostics, flags);
        let data = deep_merge(data, diagnostics.to_record());
        StdoutOutcome {
            data,
            diagnostics,
            flags,
            exit_code,
        }
    }
}

/// 扫描失败时记录诊断并返回 None
pub(crate) fn attempt<T>(diagnostics: &mut Diagnostics, section: &str, result: Result<T, ScanError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            diagnostics.report_scan_failure(section, e);
            None
        }
    }
}

/// 解析 CRYSTAL 主输出
pub fn read_crystal_stdout(content: &str) -> StdoutOutcome {
    let mut diagnostics = Diagnostics::new();
    let mut flags = OutcomeFlags::default();
    let mut data = Record::new().with("units", units_record());

    if content.trim().is_empty() {
        let mut outcome = StdoutOutcome::finish(data, diagnostics, flags);
        outcome.exit_code = Some(ExitCode::ErrorStdoutEmpty);
        return outcome;
    }

    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();

    if let Some(elapsed) = prescan(&lines, &mut diagnostics) {
        data.insert("meta", Record::new().with("elapsed_time", elapsed));
    }

    let Some(start) = find_line(&lines, 0, total, RUN_START) else {
        diagnostics.report_scan_failure("header", ScanError::eof(total, RUN_START));
        return StdoutOutcome::finish(data, diagnostics, flags);
    };

    let header = read_header(&lines, start);
    if !header.is_empty() {
        data.insert("header", header);
    }

    let body_end = match find_line(&lines, start, total, RUN_END) {
        Some(i) => i,
        None => {
            diagnostics.report_scan_failure("termination", ScanError::eof(total, RUN_END));
            total
        }
    };

    let index = SectionIndex::build(&lines, start, body_end);
    log::debug!("section landmarks: {:?}", index);

    // ── 段落平衡检查 ──────────────────────────────────────────────
    let scf_pairs = attempt(&mut diagnostics, "scf", pair_scf(&index.scf_start, &index.scf_end))
        .unwrap_or_default();

    let opt_range = match (index.opt_start, index.opt_end.as_slice()) {
        (None, []) => None,
        (Some(s), [e]) if *e > s => Some((s, *e)),
        (Some(_), [_, second, ..]) => {
            diagnostics.report_scan_failure(
                "optimisation",
                ScanError::Duplicate {
                    line: *second,
                    what: optimisation::OPT_END.to_string(),
                },
            );
            None
        }
        (Some(_), []) => {
            diagnostics.report_scan_failure("optimisation", ScanError::eof(body_end, optimisation::OPT_END));
            None
        }
        (_, [e, ..]) => {
            diagnostics.report_scan_failure(
                "optimisation",
                ScanError::unexpected(*e, optimisation::OPT_START, unmatched(optimisation::OPT_END)),
            );
            None
        }
    };

    if let [_, second, ..] = index.final_geometry.as_slice() {
        diagnostics.report_scan_failure(
            "final geometry",
            ScanError::Duplicate {
                line: *second,
                what: "FINAL OPTIMIZED GEOMETRY".to_string(),
            },
        );
    }
    if index.mulliken.len() > 2 {
        diagnostics.report_scan_failure(
            "mulliken",
            ScanError::Duplicate {
                line: index.mulliken[2],
                what: mulliken::MULLIKEN_LANDMARK.to_string(),
            },
        );
    }

    let opt_start = opt_range.map(|(s, _)| s);
    let opt_end = opt_range.map(|(_, e)| e);
    let final_geometry = index.final_geometry.first().copied();
    let first_mulliken = index.mulliken.first().copied();

    // ── 初始段 ────────────────────────────────────────────────────
    let mut initial = Record::new();
    let lower = index.geometry_editing.unwrap_or(start);
    let initial_geometry = index.initial_geometry.iter().copied().find(|&g| g >= lower);
    let initial_scf = scf_pairs
        .iter()
        .copied()
        .find(|&(s, _)| s < opt_start.unwrap_or(body_end));

    let pre_scf_end = next_boundary(
        initial_geometry.map(|g| g + 1).unwrap_or(start),
        &[initial_scf.map(|(s, _)| s), opt_start, final_geometry, first_mulliken],
        body_end,
    );

    let mut dimensionality = 3;
    match initial_geometry {
        Some(g) => {
            if let Some(d) = attempt(&mut diagnostics, "initial geometry", geometry::read_dimensionality(&lines, g)) {
                dimensionality = d;
            }
            if let Some((_, geom)) = attempt(
                &mut diagnostics,
                "initial geometry",
                geometry::read_geometry(&lines, g, pre_scf_end),
            ) {
                initial = deep_merge(initial, geom);
            }
        }
        None => diagnostics.report_scan_failure(
            "initial geometry",
            ScanError::eof(body_end, "GEOMETRY FOR WAVE FUNCTION"),
        ),
    }

    let calculation = setup::read_setup(&lines, start, pre_scf_end);
    if !calculation.is_empty() {
        initial.insert("calculation", calculation);
    }

    let mut scf_flags = Vec::new();
    let post_scf_start = match initial_scf {
        Some((s, e)) => {
            if let Some((_, scf)) = attempt(&mut diagnostics, "scf", scf::read_scf(&lines, s, e + 1)) {
                if let Some(c) = scf.get("converged").and_then(Value::as_bool) {
                    scf_flags.push(c);
                }
                initial.insert("scf", scf);
            }
            e + 1
        }
        None => pre_scf_end,
    };
    let post_scf_end = next_boundary(post_scf_start, &[opt_start, final_geometry, first_mulliken], body_end);

    if let Some(energy) = attempt(
        &mut diagnostics,
        "post-scf",
        energy::read_post_scf(&lines, post_scf_start, post_scf_end),
    ) {
        initial = deep_merge(initial, energy);
    }

    let gap_start = initial_scf.map(|(s, _)| s).unwrap_or(pre_scf_end);
    if let Some(Some(gaps)) = attempt(
        &mut diagnostics,
        "band gaps",
        band_gap::read_band_gaps(&lines, gap_start, post_scf_end),
    ) {
        initial.insert("band_gaps", gaps);
    }

    // ── 优化段 ────────────────────────────────────────────────────
    let mut steps: Vec<Record> = Vec::new();
    let mut final_record = Record::new();
    if let Some((s, e)) = opt_range {
        if let Some((_, outcome)) = attempt(
            &mut diagnostics,
            "optimisation",
            optimisation::read_optimisation(&lines, s, e + 1, dimensionality),
        ) {
            flags.opt_converged = Some(outcome.converged);
            if let Some(c) = outcome.scf_converged {
                scf_flags.push(c);
            }
            if let Some(energy) = outcome.energy {
                final_record.insert("energy", Record::new().with("total", energy));
            }
            steps = outcome.steps;
        }
    }
    if !initial.contains_key("energy") {
        if let Some(energy) = steps.first().and_then(|s| s.get("energy")) {
            initial.insert("energy", energy.clone());
        }
    }
    if !scf_flags.is_empty() {
        flags.scf_converged = Some(scf_flags.iter().all(|c| *c));
    }

    // ── 最终段 ────────────────────────────────────────────────────
    if let Some(f) = final_geometry {
        let window_end = next_boundary(f + 1, &[first_mulliken], body_end);
        if let Some((_, geom)) = attempt(
            &mut diagnostics,
            "final geometry",
            geometry::read_geometry(&lines, f, window_end),
        ) {
            final_record = deep_merge(final_record, geom);
        }
    }

    for key in ["primitive_cell", "symmetry"] {
        if final_record.contains_key(key) {
            continue;
        }
        let carried = steps
            .iter()
            .rev()
            .find_map(|s| s.get(key))
            .or_else(|| initial.get(key));
        if let Some(value) = carried {
            final_record.insert(key, value.clone());
        }
    }
    if !final_record.contains_key("energy") {
        let carried = steps
            .iter()
            .rev()
            .find_map(|s| s.get("energy"))
            .or_else(|| initial.get("energy"));
        if let Some(value) = carried {
            final_record.insert("energy", value.clone());
        }
    }

    if let Some(e) = opt_end {
        let window_end = next_boundary(e, &[first_mulliken], body_end);
        if let Some(Some(gaps)) = attempt(
            &mut diagnostics,
            "band gaps",
            band_gap::read_band_gaps(&lines, e + 1, window_end),
        ) {
            final_record = deep_merge(final_record, Record::new().with("band_gaps", gaps));
        }
    }

    // ── Mulliken ──────────────────────────────────────────────────
    let mut mulliken_record = Record::new();
    for (k, &m) in index.mulliken.iter().take(2).enumerate() {
        let window_end = index.mulliken.get(k + 1).copied().unwrap_or(body_end);
        if let Some((_, channel, table)) = attempt(
            &mut diagnostics,
            "mulliken",
            mulliken::read_mulliken(&lines, m, window_end),
        ) {
            if mulliken_record.contains_key(channel) {
                diagnostics.report_scan_failure(
                    "mulliken",
                    ScanError::Duplicate {
                        line: m,
                        what: format!("{} channel", channel),
                    },
                );
                continue;
            }
            mulliken_record.insert(channel, table);
        }
    }

    // ── 组装 ──────────────────────────────────────────────────────
    if !initial.is_empty() {
        data.insert("initial", initial);
    }
    if !steps.is_empty() {
        data.insert("optimisation", steps.into_iter().map(Value::Record).collect::<Vec<_>>());
    }
    if !final_record.is_empty() {
        data.insert("final", final_record);
    }
    if !mulliken_record.is_empty() {
        data.insert("mulliken", mulliken_record);
    }

    StdoutOutcome::finish(data, diagnostics, flags)
}
