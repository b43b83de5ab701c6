//! The rule contract (spec §4.3): the capability set every rule satisfies,
//! and the read-only context each rule is handed. Rules are stateless and
//! shared by reference across every file's pipeline invocation (spec §5).

use std::path::Path;
use std::time::{Duration, Instant};

use crate::arena::NodeArena;
use crate::arena::NodeIndex;
use crate::config::{RuleConfigSet, RuleConfiguration};
use crate::model::{SourceRange, TextEdit, Violation};

/// Default per-rule execution budget (spec §4.3).
pub const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(5);
/// Default per-rule memory budget, in bytes (spec §4.3).
pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 100 * 1024 * 1024;

/// Outcome of a rule's cheap precheck: either it participates in this file,
/// or it opts out with a reason (recorded for diagnostics, never surfaced
/// as a violation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Ok,
    Error(String),
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationResult::Ok)
    }
}

/// What `Rule::apply` produces for one file: edits, diagnostics, and a few
/// cheap metrics for observability. Never contains I/O side effects.
#[derive(Debug, Clone, Default)]
pub struct RuleOutcome {
    pub edits: Vec<TextEdit>,
    pub violations: Vec<Violation>,
    pub metrics: RuleMetrics,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleMetrics {
    pub nodes_visited: u64,
}

/// The immutable, per-file context every stage after parsing reads from
/// (spec §3's `ProcessingContext`). Constructed once by the parse stage.
pub struct ProcessingContext<'a> {
    pub source_path: &'a Path,
    pub source_text: &'a str,
    pub arena: &'a NodeArena,
    pub root: NodeIndex,
    pub comments: &'a [crate::arena::Comment],
    pub rule_config: &'a RuleConfigSet,
    pub enabled_rule_ids: &'a [&'a str],
    pub deadline: Instant,
}

impl<'a> ProcessingContext<'a> {
    pub fn line_count(&self) -> usize {
        self.source_text.lines().count().max(1)
    }

    /// Convenience accessor: a rule's own configuration within the
    /// enclosing set, defaulted if the file/config didn't mention it.
    pub fn config_for(&self, rule_id: &str) -> RuleConfiguration {
        self.rule_config.config_for(rule_id)
    }

    /// Translates a byte offset into a 1-based `(line, column)` position.
    /// Used by rules that need human-facing locations rather than raw
    /// offsets — the arena only stores the latter.
    pub fn position_at(&self, byte_offset: u32) -> crate::model::SourcePosition {
        let offset = byte_offset as usize;
        let prefix = &self.source_text[..offset.min(self.source_text.len())];
        let line = prefix.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
        let column = match prefix.rfind('\n') {
            Some(nl) => (offset - nl) as u32,
            None => offset as u32 + 1,
        };
        crate::model::SourcePosition::new(line, column)
    }

    pub fn range_for_bytes(&self, start_byte: u32, end_byte: u32) -> SourceRange {
        SourceRange::new(
            self.position_at(start_byte),
            self.position_at(end_byte),
            start_byte,
            end_byte,
        )
    }

    pub fn deadline_exceeded(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// The capability set any rule must satisfy (spec §4.3). Implementors must
/// be `Send + Sync`: rule instances are shared by reference across every
/// concurrently-running file task (spec §5).
pub trait Rule: Send + Sync {
    /// Stable, dotted identifier, e.g. `"line-length"`.
    fn rule_id(&self) -> &str;

    /// Lower runs earlier and wins edit conflicts. Must be in `[0, 1000]`.
    fn priority(&self) -> u32;

    /// Cheap precheck; a rule may opt out of a file here (e.g. an
    /// import-organization rule on a file with no imports).
    fn validate(&self, ctx: &ProcessingContext<'_>) -> ValidationResult {
        let _ = ctx;
        ValidationResult::Ok
    }

    /// The real work. Must be pure with respect to the arena: no mutation,
    /// no I/O. Implementations should check `ctx.deadline_exceeded()`
    /// periodically in any loop over large inputs so the engine's timeout
    /// enforcement (spec §4.3) has somewhere to bite.
    fn apply(&self, ctx: &ProcessingContext<'_>) -> RuleOutcome;

    fn max_execution_time(&self) -> Duration {
        DEFAULT_MAX_EXECUTION_TIME
    }

    fn max_memory_bytes(&self) -> u64 {
        DEFAULT_MAX_MEMORY_BYTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOk;
    impl Rule for AlwaysOk {
        fn rule_id(&self) -> &str {
            "test.always-ok"
        }
        fn priority(&self) -> u32 {
            500
        }
        fn apply(&self, _ctx: &ProcessingContext<'_>) -> RuleOutcome {
            RuleOutcome::default()
        }
    }

    #[test]
    fn default_validate_is_ok() {
        let arena = NodeArena::new(0, u64::MAX);
        let config = RuleConfigSet::default();
        let ctx = ProcessingContext {
            source_path: Path::new("Foo.java"),
            source_text: "",
            arena: &arena,
            root: NodeIndex::NONE,
            comments: &[],
            rule_config: &config,
            enabled_rule_ids: &[],
            deadline: Instant::now() + Duration::from_secs(5),
        };
        assert_eq!(AlwaysOk.validate(&ctx), ValidationResult::Ok);
        assert!(!ctx.deadline_exceeded());
    }

    #[test]
    fn position_at_tracks_lines_and_columns() {
        let arena = NodeArena::new(0, u64::MAX);
        let config = RuleConfigSet::default();
        let text = "abc\ndef\nghi";
        let ctx = ProcessingContext {
            source_path: Path::new("Foo.java"),
            source_text: text,
            arena: &arena,
            root: NodeIndex::NONE,
            comments: &[],
            rule_config: &config,
            enabled_rule_ids: &[],
            deadline: Instant::now() + Duration::from_secs(5),
        };
        let pos = ctx.position_at(5); // 'e' in "def"
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 2);
    }
}
