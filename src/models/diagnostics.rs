//! # 诊断信息与退出分类
//!
//! 收集解析过程中的引擎错误/警告与解析器错误/警告，并在解析结束时
//! 按固定优先级给出唯一的退出分类，供外部工作流决定重试或分支。
//!
//! ## 依赖关系
//! - 被 `parsers/stdout`, `parsers/properties` 使用
//! - 被 `commands/parse.rs`, `commands/collect.rs` 使用

use super::record::Record;
use serde::Serialize;

/// 四类诊断列表（只追加，不清空）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// 引擎报告的错误
    pub errors: Vec<String>,
    /// 引擎报告的警告
    pub warnings: Vec<String>,
    /// 解析器无法识别预期结构
    pub parser_errors: Vec<String>,
    /// 解析器的非致命问题
    pub parser_warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已有引擎级错误
    pub fn has_engine_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 记录扫描器失败
    ///
    /// 文件已报告引擎错误时，扫描器异常只作为解析器警告保留，
    /// 避免掩盖真正的引擎失败原因。
    pub fn report_scan_failure(&mut self, section: &str, message: impl std::fmt::Display) {
        let entry = format!("{}: {}", section, message);
        if self.has_engine_errors() {
            log::debug!("swallowing scanner failure after engine errors: {}", entry);
            self.parser_warnings.push(entry);
        } else {
            log::warn!("{}", entry);
            self.parser_errors.push(entry);
        }
    }

    /// 转换为记录片段
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("errors", self.errors.clone())
            .with("warnings", self.warnings.clone())
            .with("parser_errors", self.parser_errors.clone())
            .with("parser_warnings", self.parser_warnings.clone())
    }
}

/// 扫描器设置的计算结果标志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeFlags {
    /// 所有 SCF 是否收敛（未运行时为 None）
    pub scf_converged: Option<bool>,
    /// 几何优化是否收敛（未优化时为 None）
    pub opt_converged: Option<bool>,
}

/// 退出分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitCode {
    ErrorStdoutEmpty,
    ErrorParsingStdout,
    ErrorOutOfWalltime,
    ErrorOutOfMemory,
    ErrorScfAbnormalEnd,
    ErrorMpiAbort,
    ErrorBasisSetLinearlyDependent,
    UnconvergedScf,
    UnconvergedGeometry,
    ErrorCrystalRun,
}

impl ExitCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitCode::ErrorStdoutEmpty => "ERROR_STDOUT_EMPTY",
            ExitCode::ErrorParsingStdout => "ERROR_PARSING_STDOUT",
            ExitCode::ErrorOutOfWalltime => "ERROR_OUT_OF_WALLTIME",
            ExitCode::ErrorOutOfMemory => "ERROR_OUT_OF_MEMORY",
            ExitCode::ErrorScfAbnormalEnd => "ERROR_SCF_ABNORMAL_END",
            ExitCode::ErrorMpiAbort => "ERROR_MPI_ABORT",
            ExitCode::ErrorBasisSetLinearlyDependent => "ERROR_BASIS_SET_LINEARLY_DEPENDENT",
            ExitCode::UnconvergedScf => "UNCONVERGED_SCF",
            ExitCode::UnconvergedGeometry => "UNCONVERGED_GEOMETRY",
            ExitCode::ErrorCrystalRun => "ERROR_CRYSTAL_RUN",
        }
    }

    /// 人类可读描述
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::ErrorStdoutEmpty => "the stdout content was empty",
            ExitCode::ErrorParsingStdout => "the parser could not interpret the stdout",
            ExitCode::ErrorOutOfWalltime => "the run exceeded its time limit",
            ExitCode::ErrorOutOfMemory => "the run ran out of memory",
            ExitCode::ErrorScfAbnormalEnd => "the SCF ended abnormally",
            ExitCode::ErrorMpiAbort => "the run was terminated by MPI_Abort",
            ExitCode::ErrorBasisSetLinearlyDependent => "the basis set is linearly dependent",
            ExitCode::UnconvergedScf => "the SCF did not converge",
            ExitCode::UnconvergedGeometry => "the geometry optimisation did not converge",
            ExitCode::ErrorCrystalRun => "the engine reported an unhandled error",
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 引擎错误签名（按优先级排列）
const ERROR_SIGNATURES: &[(&[&str], ExitCode)] = &[
    (&["TIME EXCEEDED", "TIME LIMIT", "DUE TO TIME LIMIT"], ExitCode::ErrorOutOfWalltime),
    (
        &["OUT OF MEMORY", "INSUFFICIENT MEMORY", "NOT ENOUGH MEMORY", "MEMORY ALLOCATION"],
        ExitCode::ErrorOutOfMemory,
    ),
    (&["SCF ABNORMAL END"], ExitCode::ErrorScfAbnormalEnd),
    (&["MPI_ABORT"], ExitCode::ErrorMpiAbort),
    (&["LINEARLY DEPENDENT"], ExitCode::ErrorBasisSetLinearlyDependent),
];

/// 从诊断信息与结果标志推导退出分类
///
/// 优先级：资源耗尽/崩溃签名 > 未收敛 > 其他引擎错误 > 解析器错误。
pub fn classify_exit(diagnostics: &Diagnostics, flags: OutcomeFlags) -> Option<ExitCode> {
    let upper_errors: Vec<String> = diagnostics.errors.iter().map(|e| e.to_uppercase()).collect();

    for (patterns, code) in ERROR_SIGNATURES {
        let matched = upper_errors
            .iter()
            .any(|e| patterns.iter().any(|p| e.contains(p)));
        if matched {
            return Some(*code);
        }
    }

    if flags.scf_converged == Some(false) {
        return Some(ExitCode::UnconvergedScf);
    }
    if flags.opt_converged == Some(false) {
        return Some(ExitCode::UnconvergedGeometry);
    }
    if !diagnostics.errors.is_empty() {
        return Some(ExitCode::ErrorCrystalRun);
    }
    if !diagnostics.parser_errors.is_empty() {
        return Some(ExitCode::ErrorParsingStdout);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_errors(errors: &[&str]) -> Diagnostics {
        Diagnostics {
            errors: errors.iter().map(|s| s.to_string()).collect(),
            ..Diagnostics::default()
        }
    }

    #[test]
    fn test_success_when_clean() {
        assert_eq!(classify_exit(&Diagnostics::new(), OutcomeFlags::default()), None);
    }

    #[test]
    fn test_generic_engine_error() {
        let diag = with_errors(&["!! ERROR : input file is empty"]);
        assert_eq!(
            classify_exit(&diag, OutcomeFlags::default()),
            Some(ExitCode::ErrorCrystalRun)
        );
    }

    #[test]
    fn test_specific_signature_beats_generic() {
        let diag = with_errors(&["ERROR **** SOMETHING", "MPI_Abort was invoked on rank 0"]);
        assert_eq!(
            classify_exit(&diag, OutcomeFlags::default()),
            Some(ExitCode::ErrorMpiAbort)
        );
    }

    #[test]
    fn test_walltime_beats_scf_abnormal_end() {
        let diag = with_errors(&["SCF abnormal end", "ERROR - TIME EXCEEDED"]);
        assert_eq!(
            classify_exit(&diag, OutcomeFlags::default()),
            Some(ExitCode::ErrorOutOfWalltime)
        );
    }

    #[test]
    fn test_engine_error_beats_parser_error() {
        let mut diag = with_errors(&["ERROR **** GENERIC"]);
        diag.parser_errors.push("could not find table".to_string());
        assert_eq!(
            classify_exit(&diag, OutcomeFlags::default()),
            Some(ExitCode::ErrorCrystalRun)
        );
    }

    #[test]
    fn test_parser_error_only() {
        let mut diag = Diagnostics::new();
        diag.parser_errors.push("missing header".to_string());
        assert_eq!(
            classify_exit(&diag, OutcomeFlags::default()),
            Some(ExitCode::ErrorParsingStdout)
        );
    }

    #[test]
    fn test_unconverged_flags() {
        let flags = OutcomeFlags {
            scf_converged: Some(true),
            opt_converged: Some(false),
        };
        assert_eq!(
            classify_exit(&Diagnostics::new(), flags),
            Some(ExitCode::UnconvergedGeometry)
        );

        let flags = OutcomeFlags {
            scf_converged: Some(false),
            opt_converged: Some(false),
        };
        assert_eq!(
            classify_exit(&Diagnostics::new(), flags),
            Some(ExitCode::UnconvergedScf)
        );
    }

    #[test]
    fn test_scan_failure_swallowed_after_engine_error() {
        let mut diag = with_errors(&["ERROR **** X"]);
        diag.report_scan_failure("scf", "line 3: bad");
        assert!(diag.parser_errors.is_empty());
        assert_eq!(diag.parser_warnings, vec!["scf: line 3: bad".to_string()]);

        let mut clean = Diagnostics::new();
        clean.report_scan_failure("scf", "line 3: bad");
        assert_eq!(clean.parser_errors.len(), 1);
    }
}
