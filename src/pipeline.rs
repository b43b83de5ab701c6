//! The per-file pipeline (spec §4.4): parse → rule application → write,
//! expressed as a Chain-of-Responsibility of typed stages with
//! railway-style result propagation. A `Failure` from any stage
//! short-circuits the rest.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{instrument, warn};

use crate::arena::{Comment, NodeArena, NodeIndex};
use crate::config::RuleConfigSet;
use crate::model::{FormattedOutput, PerFileResult, PipelineError, PipelineErrorKind, StageResult, Violation};
use crate::parser::{self, ParseErrorKind, TargetVersion};
use crate::rule::ProcessingContext;
use crate::rule_engine::{ExecutionMode, RuleEngine};
use crate::security::{self, SecurityLimits};

/// Callbacks a pipeline invokes at stage boundaries. Implementations must
/// be safe to call from any worker thread (spec §4.4) — the scheduler
/// fans pipelines across many file tasks concurrently. The default is a
/// no-op.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _path: &Path, _stage_count: usize) {}
    fn on_stage_start(&self, _path: &Path, _stage_name: &str, _index: usize) {}
    fn on_stage_complete(&self, _path: &Path, _stage_name: &str, _index: usize) {}
    fn on_complete(&self, _path: &Path) {}
    fn on_failure(&self, _path: &Path, _stage_name: &str, _error: &PipelineError) {}
    fn on_close(&self) {}
}

#[derive(Default)]
pub struct NoopProgressObserver;
impl ProgressObserver for NoopProgressObserver {}

/// Parsed-but-not-yet-formatted state handed from the parse stage to the
/// format stage. Owns the arena for the remainder of this file's pipeline.
pub struct ParsedFile {
    pub source_path: PathBuf,
    pub source_text: String,
    pub arena: NodeArena,
    pub root: NodeIndex,
    pub comments: Vec<Comment>,
}

/// Output of the format stage: the engine's merged result plus everything
/// the write stage needs, after the arena has been dropped.
pub struct FormattedFile {
    pub source_path: PathBuf,
    pub original_text: String,
    pub final_text: String,
    pub violations: Vec<Violation>,
    pub edits_applied_count: usize,
}

const STAGE_PARSE: &str = "parse";
const STAGE_FORMAT: &str = "format";
const STAGE_WRITE: &str = "write";

/// How the pipeline should run: `Check` never writes; `Format` writes
/// (unless `dry_run` is also set, matching `--dry-run`'s spec behavior of
/// running the format path without touching disk).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub mode: ExecutionMode,
    pub dry_run: bool,
    pub target_version: TargetVersion,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Check,
            dry_run: false,
            target_version: TargetVersion::default(),
        }
    }
}

/// A pipeline is built once (rule engine, options, observer) and may be
/// reused across many files; it supports idempotent `close()`, after which
/// further `process` calls are rejected (spec §4.4's pipeline lifecycle).
pub struct Pipeline {
    engine: RuleEngine,
    config: RuleConfigSet,
    security_limits: SecurityLimits,
    options: PipelineOptions,
    observer: Arc<dyn ProgressObserver>,
    closed: AtomicBool,
}

impl Pipeline {
    pub fn new(
        engine: RuleEngine,
        config: RuleConfigSet,
        security_limits: SecurityLimits,
        options: PipelineOptions,
    ) -> Self {
        Self {
            engine,
            config,
            security_limits,
            options,
            observer: Arc::new(NoopProgressObserver),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Idempotent: calling `close` more than once is a no-op.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.observer.on_close();
        }
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    pub fn process(&self, path: &Path) -> PerFileResult {
        if self.closed.load(Ordering::SeqCst) {
            return StageResult::Failure(PipelineError::new(
                PipelineErrorKind::IO,
                "pipeline",
                path,
                "pipeline is closed and rejects further process() calls",
            ));
        }

        self.observer.on_start(path, 3);

        let parsed = match self.run_parse_stage(path) {
            StageResult::Success(parsed) => parsed,
            StageResult::Failure(error) => {
                self.observer.on_failure(path, STAGE_PARSE, &error);
                return StageResult::Failure(error);
            }
        };

        let formatted = match self.run_format_stage(parsed) {
            StageResult::Success(formatted) => formatted,
            StageResult::Failure(error) => {
                self.observer.on_failure(path, STAGE_FORMAT, &error);
                return StageResult::Failure(error);
            }
        };

        match self.run_write_stage(formatted) {
            StageResult::Success(output) => {
                self.observer.on_complete(path);
                StageResult::Success(output)
            }
            StageResult::Failure(error) => {
                self.observer.on_failure(path, STAGE_WRITE, &error);
                StageResult::Failure(error)
            }
        }
    }

    fn run_parse_stage(&self, path: &Path) -> StageResult<ParsedFile> {
        self.observer.on_stage_start(path, STAGE_PARSE, 0);

        if let Err(reason) = security::check_extension(path, &self.security_limits) {
            return StageResult::Failure(PipelineError::new(
                PipelineErrorKind::SecurityViolation,
                STAGE_PARSE,
                path,
                reason,
            ));
        }

        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                return StageResult::Failure(
                    PipelineError::new(PipelineErrorKind::IO, STAGE_PARSE, path, e.to_string())
                        .with_cause(e),
                )
            }
        };
        if metadata.len() > self.security_limits.max_file_size_bytes {
            return StageResult::Failure(PipelineError::new(
                PipelineErrorKind::SecurityViolation,
                STAGE_PARSE,
                path,
                format!(
                    "file size {} exceeds the {}-byte cap",
                    metadata.len(),
                    self.security_limits.max_file_size_bytes
                ),
            ));
        }

        let source_text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                return StageResult::Failure(
                    PipelineError::new(PipelineErrorKind::IO, STAGE_PARSE, path, e.to_string())
                        .with_cause(e),
                )
            }
        };

        let outcome = parser::parse(
            &source_text,
            self.options.target_version,
            self.security_limits.arena_memory_soft_limit_bytes,
        );

        if let Some(first_error) = outcome.errors.first() {
            let kind = if matches!(first_error.kind, ParseErrorKind::NestingTooDeep) {
                PipelineErrorKind::SecurityViolation
            } else {
                PipelineErrorKind::ParseError
            };
            return StageResult::Failure(PipelineError::new(
                kind,
                STAGE_PARSE,
                path,
                first_error.to_string(),
            ));
        }

        self.observer.on_stage_complete(path, STAGE_PARSE, 0);
        StageResult::Success(ParsedFile {
            source_path: path.to_path_buf(),
            source_text,
            arena: outcome.arena,
            root: outcome.root,
            comments: outcome.comments,
        })
    }

    fn run_format_stage(&self, parsed: ParsedFile) -> StageResult<FormattedFile> {
        let path = parsed.source_path.clone();
        self.observer.on_stage_start(&path, STAGE_FORMAT, 1);

        let all_rule_ids = self.engine.rule_ids();
        let enabled_rule_ids = self.config.enabled_rule_ids(&all_rule_ids);

        let ctx = ProcessingContext {
            source_path: &parsed.source_path,
            source_text: &parsed.source_text,
            arena: &parsed.arena,
            root: parsed.root,
            comments: &parsed.comments,
            rule_config: &self.config,
            enabled_rule_ids: &enabled_rule_ids,
            deadline: Instant::now() + Duration::from_secs(5 * 60),
        };

        let outcome = match self.engine.run(&ctx, self.options.mode) {
            Ok(outcome) => outcome,
            Err(error) => return StageResult::Failure(error),
        };

        // The arena is dropped here, at the end of this function, once
        // `ctx`/`parsed` go out of scope — the format stage owns its bulk
        // deallocation (spec §4.4, §5).
        self.observer.on_stage_complete(&path, STAGE_FORMAT, 1);
        StageResult::Success(FormattedFile {
            source_path: parsed.source_path,
            original_text: parsed.source_text,
            final_text: outcome.final_text,
            violations: outcome.violations,
            edits_applied_count: outcome.edits_applied_count,
        })
    }

    fn run_write_stage(&self, formatted: FormattedFile) -> PerFileResult {
        let path = formatted.source_path.clone();
        self.observer.on_stage_start(&path, STAGE_WRITE, 2);

        let should_write = self.options.mode == ExecutionMode::Format
            && !self.options.dry_run
            && formatted.final_text != formatted.original_text;

        if should_write {
            if let Err(e) = atomic_write(&path, &formatted.final_text) {
                return StageResult::Failure(
                    PipelineError::new(PipelineErrorKind::IO, STAGE_WRITE, &path, e.to_string())
                        .with_cause(e),
                );
            }
        }

        self.observer.on_stage_complete(&path, STAGE_WRITE, 2);
        StageResult::Success(FormattedOutput {
            source_path: formatted.source_path,
            final_text: formatted.final_text,
            violations: formatted.violations,
            edits_applied_count: formatted.edits_applied_count,
        })
    }
}

/// Atomic write: temp file in the target directory, fsync, rename over
/// the original (spec §4.4, §6). Writing into the same directory (rather
/// than a system temp dir) keeps the rename on one filesystem so it's
/// actually atomic.
fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    let tmp_path = dir.join(format!(".{file_name}.styler-tmp"));

    {
        let mut file = File::create(&tmp_path)?;
        use std::io::Write;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }

    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            warn!(path = %path.display(), error = %e, "atomic rename failed");
            Err(e)
        }
    }
}
