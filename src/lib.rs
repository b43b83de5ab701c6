//! `styler`: a concurrent Java source-code formatter. Parses `.java` files
//! onto an arena-backed AST, runs a configurable set of style rules over
//! it, and either reports violations (`check`) or rewrites the files
//! (`format`). See each module for the piece of the pipeline it owns.

mod arena;
mod config;
mod lexer;
mod model;
mod parser;
mod pipeline;
mod report;
mod rule;
mod rule_engine;
mod rule_testing;
mod rules;
mod scheduler;
mod security;

pub use arena::{ArenaError, Comment, CommentKind, NodeArena, NodeIndex, NodeType};
pub use config::{
    RuleConfigSet, RuleConfigSetBuilder, RuleConfiguration, RuleConfigurationBuilder,
    RuleConfigurationValue,
};
pub use parser::{parse, ParseError, ParseErrorKind, ParseOutcome, TargetVersion};
pub use pipeline::{
    FormattedFile, NoopProgressObserver, ParsedFile, Pipeline, PipelineOptions, ProgressObserver,
};
pub use report::{
    ReportFix, ReportLocation, ReportSummary, ReportViolation, RuleGroupCount, ViolationReport,
};
pub use rule::{
    ProcessingContext, Rule, RuleMetrics, RuleOutcome, ValidationResult,
    DEFAULT_MAX_EXECUTION_TIME, DEFAULT_MAX_MEMORY_BYTES,
};
pub use rule_engine::{exceeds_severity_threshold, EngineOutcome, ExecutionMode, RuleEngine};
pub use rule_testing::{ExpectedViolation, RuleTestInvalid, RuleTestValid, RuleTester, RuleTests};
pub use rules::LineLengthRule;
pub use scheduler::{
    MemoryMonitor, Scheduler, SchedulerOptions, SysinfoMemoryMonitor,
    DEFAULT_MAX_CONCURRENT_FILES, DEFAULT_MEMORY_SOFT_LIMIT_BYTES,
};
pub use security::{
    check_extension, normalize_lexical, resolve_symlinks, sanitize_path, RecursionGuard,
    SecurityError, SecurityLimits, DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_MAX_RECURSION_DEPTH,
    DEFAULT_MAX_SYMLINK_DEPTH,
};

pub use model::{
    BatchResult, FormattedOutput, PerFileResult, PipelineError, PipelineErrorKind, Severity,
    SourcePosition, SourceRange, StageResult, TextEdit, TextEditBuilder, Violation,
    ViolationBuilder,
};

pub use proc_macros::{rule_tests, violation};
