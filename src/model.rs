//! Core data shapes shared across the arena, parser, rule engine, pipeline,
//! and scheduler: source positions/ranges, edits, violations, and the
//! typed result/error types the rest of the crate threads through.

use std::{cmp::Ordering, path::PathBuf, sync::Arc};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// A 1-based `(line, column)` pair. Lines and columns are both 1-based to
/// match how editors and compilers report positions to humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// An ordered `[start, end)` pair of source positions.
///
/// Invariant: `end.line > start.line`, or (`end.line == start.line` and
/// `end.column >= start.column`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: SourcePosition,
    pub end: SourcePosition,
    /// Byte offsets into the source text, kept alongside line/column so
    /// edits can be applied without re-deriving offsets from positions.
    pub start_byte: u32,
    pub end_byte: u32,
}

impl SourceRange {
    pub fn new(start: SourcePosition, end: SourcePosition, start_byte: u32, end_byte: u32) -> Self {
        debug_assert!(start_byte <= end_byte);
        debug_assert!(
            end.line > start.line || (end.line == start.line && end.column >= start.column)
        );
        Self {
            start,
            end,
            start_byte,
            end_byte,
        }
    }

    /// Two ranges conflict iff they share a byte position strictly between
    /// the endpoints of both (i.e. their byte intervals overlap).
    pub fn overlaps(&self, other: &SourceRange) -> bool {
        self.start_byte < other.end_byte && other.start_byte < self.end_byte
    }
}

/// Ordering used to sort edits: by start, then end, then originating
/// priority, then rule id — see `RuleEngine::merge_edits`.
pub(crate) fn compare_ranges(a: &SourceRange, b: &SourceRange) -> Ordering {
    a.start_byte
        .cmp(&b.start_byte)
        .then(a.end_byte.cmp(&b.end_byte))
}

/// A `(range, replacement)` pair produced by a rule.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct TextEdit {
    pub range: SourceRange,
    pub replacement: String,
    pub originating_rule_id: String,
    #[builder(default)]
    pub originating_priority: u32,
}

impl TextEdit {
    pub fn conflicts_with(&self, other: &TextEdit) -> bool {
        self.range.overlaps(&other.range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "INFO")]
    Info,
    #[default]
    #[serde(rename = "WARNING")]
    Warning,
    #[serde(rename = "ERROR")]
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A diagnostic: a rule either reporting an edit-backed fix or a purely
/// informational observation.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into, strip_option))]
pub struct Violation {
    pub rule_id: String,
    pub range: SourceRange,
    #[builder(default = "Severity::Warning")]
    pub severity: Severity,
    pub message: String,
    #[builder(default)]
    pub suggested_fix: Option<String>,
}

/// The stage/kind taxonomy for pipeline failures (spec §3, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineErrorKind {
    ParseError,
    IO,
    SecurityViolation,
    RuleFailure,
    Timeout,
    EditConflict,
}

impl std::fmt::Display for PipelineErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineErrorKind::ParseError => "ParseError",
            PipelineErrorKind::IO => "IO",
            PipelineErrorKind::SecurityViolation => "SecurityViolation",
            PipelineErrorKind::RuleFailure => "RuleFailure",
            PipelineErrorKind::Timeout => "Timeout",
            PipelineErrorKind::EditConflict => "EditConflict",
        };
        write!(f, "{name}")
    }
}

/// A single canonical error type for the whole pipeline. The original
/// reference implementation grew three divergent `PipelineException`
/// variants; this crate intentionally has exactly one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} in stage {stage_name:?} for {source_path:?}: {message}")]
pub struct PipelineError {
    pub kind: PipelineErrorKind,
    pub stage_name: String,
    pub source_path: PathBuf,
    pub message: String,
    #[source]
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl PipelineError {
    pub fn new(
        kind: PipelineErrorKind,
        stage_name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            stage_name: stage_name.into(),
            source_path: source_path.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }
}

/// Exactly `Success(T)` or `Failure(PipelineError)` — no other states.
#[derive(Debug, Clone)]
pub enum StageResult<T> {
    Success(T),
    Failure(PipelineError),
}

impl<T> StageResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageResult<U> {
        match self {
            StageResult::Success(value) => StageResult::Success(f(value)),
            StageResult::Failure(error) => StageResult::Failure(error),
        }
    }

    /// Converts to a `std::result::Result`, which is occasionally more
    /// convenient for `?`-based plumbing inside a single stage.
    pub fn into_result(self) -> Result<T, PipelineError> {
        match self {
            StageResult::Success(value) => Ok(value),
            StageResult::Failure(error) => Err(error),
        }
    }
}

impl<T> From<Result<T, PipelineError>> for StageResult<T> {
    fn from(result: Result<T, PipelineError>) -> Self {
        match result {
            Ok(value) => StageResult::Success(value),
            Err(error) => StageResult::Failure(error),
        }
    }
}

/// Output of a fully-run per-file pipeline.
#[derive(Debug, Clone)]
pub struct FormattedOutput {
    pub source_path: PathBuf,
    pub final_text: String,
    pub violations: Vec<Violation>,
    pub edits_applied_count: usize,
}

pub type PerFileResult = StageResult<FormattedOutput>;

/// Aggregate result of a batch run across many files.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub success_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub errors: Vec<PipelineError>,
}

impl BatchResult {
    pub fn record(&mut self, result: &PerFileResult) {
        match result {
            StageResult::Success(_) => self.success_count += 1,
            StageResult::Failure(error) => {
                self.error_count += 1;
                self.errors.push(error.clone());
            }
        }
    }

    pub fn record_skipped(&mut self) {
        self.skipped_count += 1;
    }
}
