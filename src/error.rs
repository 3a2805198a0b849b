//! # 统一错误处理模块
//!
//! 定义 crystool 的所有错误类型，使用 `thiserror` 派生。
//!
//! 错误分为三层：
//! - `CrystoolError`: 命令层错误（I/O、JSON、CSV 等）
//! - `ScanError`: 解析器自身无法识别预期结构（带绝对行号）
//! - `InputError`: 输入文件生成前的校验失败（全有或全无）
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// crystool 统一错误类型
#[derive(Error, Debug)]
pub enum CrystoolError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error(transparent)]
    Scan(#[from] ScanError),

    // ─────────────────────────────────────────────────────────────
    // 输入生成错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid input configuration: {0}")]
    Input(#[from] InputError),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 序列化错误
    // ─────────────────────────────────────────────────────────────
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

/// 结构性解析错误
///
/// 所有变体都携带绝对行号（从 0 开始），以便定位由引擎版本差异引起的地标漂移。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("line {line}: expected '{expected}', found '{found}'")]
    Unexpected {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("reached end of input (line {line}) while looking for '{expected}'")]
    UnexpectedEof { line: usize, expected: String },

    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: could not convert '{token}' in field '{field}'")]
    Conversion {
        line: usize,
        field: String,
        token: String,
    },

    #[error("line {line}: '{what}' reported more than once")]
    Duplicate { line: usize, what: String },
}

impl ScanError {
    /// 构造 "期望 / 实际" 形式的错误
    pub fn unexpected(line: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        ScanError::Unexpected {
            line,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// 构造文件提前结束错误
    pub fn eof(line: usize, expected: impl Into<String>) -> Self {
        ScanError::UnexpectedEof {
            line,
            expected: expected.into(),
        }
    }
}

/// 输入文件生成的校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("at least one basis set is required")]
    NoBasisSets,

    #[error("unknown atom property '{0}' (allowed: spin_alpha, spin_beta, unfixed, ghosts)")]
    UnknownAtomProperty(String),

    #[error("atom indices {0:?} are in both spin_alpha and spin_beta")]
    SpinConflict(Vec<usize>),

    #[error("atom index {index} is out of range for a structure with {n_atoms} atoms")]
    AtomIndexOutOfRange { index: usize, n_atoms: usize },

    #[error("ATOMSPIN is only supported together with SPINLOCK in scf.numerical")]
    AtomSpinWithoutSpinlock,

    #[error("kind '{0}' is not present in the structure")]
    UnknownKind(String),

    #[error("{0}")]
    Invalid(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, CrystoolError>;

/// 扫描器 Result 类型别名
pub type ScanResult<T> = std::result::Result<T, ScanError>;
