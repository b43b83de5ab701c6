//! Runs every enabled rule against a `ProcessingContext` and merges their
//! outputs into a single edit list plus violation list (spec §4.3).
//!
//! Rules never observe each other's edits — each receives the same
//! original, unmodified context. Edits are composed post-hoc: sorted,
//! checked for overlap, and applied in reverse order so earlier offsets
//! stay valid while later ones are rewritten.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use crate::model::{compare_ranges, PipelineError, Severity, TextEdit, Violation, ViolationBuilder};
use crate::rule::{ProcessingContext, Rule, ValidationResult};

/// Whether the engine should apply edits to produce formatted text, or
/// instead convert would-be edits into diagnostic violations (spec §4.3,
/// point 6, and spec §6's `check`/`format` subcommands).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Check,
    Format,
}

pub struct RuleEngine {
    rules: Vec<Arc<dyn Rule>>,
}

/// What one rule run produces before conflict resolution: its own edits
/// plus violations, tagged with its priority for the merge step.
struct RuleRun {
    rule_id: String,
    priority: u32,
    edits: Vec<TextEdit>,
    violations: Vec<Violation>,
}

/// The merged result of running every enabled rule: the final text (in
/// `Format` mode, edits already applied; in `Check` mode, unchanged),
/// every violation (including `EditSuppressed`/`RuleFailure` diagnostics),
/// and how many edits actually landed.
pub struct EngineOutcome {
    pub final_text: String,
    pub violations: Vec<Violation>,
    pub edits_applied_count: usize,
}

impl RuleEngine {
    /// Rules are sorted by priority ascending, ties broken by rule id
    /// lexicographic order (spec §4.3, point 1) — this ordering is also
    /// the deterministic conflict-resolution order, so it's computed once
    /// here rather than re-sorted per file.
    pub fn new(mut rules: Vec<Arc<dyn Rule>>) -> Self {
        rules.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.rule_id().cmp(b.rule_id()))
        });
        Self { rules }
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.rule_id()).collect()
    }

    #[instrument(level = "debug", skip_all, fields(path = %ctx.source_path.display(), rules = self.rules.len()))]
    pub fn run(
        &self,
        ctx: &ProcessingContext<'_>,
        mode: ExecutionMode,
    ) -> Result<EngineOutcome, PipelineError> {
        let mut runs = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            if !ctx.enabled_rule_ids.contains(&rule.rule_id()) {
                continue;
            }

            match rule.validate(ctx) {
                ValidationResult::Ok => {}
                ValidationResult::Error(reason) => {
                    debug!(rule_id = rule.rule_id(), reason, "rule opted out of file");
                    continue;
                }
            }

            runs.push(self.run_one_rule(rule.as_ref(), ctx));
        }

        let mut all_violations: Vec<Violation> =
            runs.iter().flat_map(|r| r.violations.clone()).collect();
        let mut all_edits: Vec<(TextEdit, u32)> = Vec::new();
        for run in &runs {
            for edit in &run.edits {
                all_edits.push((edit.clone(), run.priority));
            }
        }

        // Spec §4.3 point 3: sort by (range.start, range.end, priority, rule_id).
        all_edits.sort_by(|(a, a_priority), (b, b_priority)| {
            a.range
                .start_byte
                .cmp(&b.range.start_byte)
                .then(a.range.end_byte.cmp(&b.range.end_byte))
                .then(a_priority.cmp(b_priority))
                .then(a.originating_rule_id.cmp(&b.originating_rule_id))
        });

        let accepted = resolve_conflicts(all_edits, &mut all_violations);

        // Rules that already report their own violations (e.g. `line-length`,
        // which anchors its violation at a different column than its edit
        // starts wrapping at) have said everything they need to; the
        // generic edit-to-violation fallback below is only for rules that
        // report edits and nothing else.
        let self_reporting: std::collections::HashSet<&str> = runs
            .iter()
            .filter(|run| !run.violations.is_empty())
            .map(|run| run.rule_id.as_str())
            .collect();

        let final_text = match mode {
            ExecutionMode::Format => apply_edits(ctx.source_text, &accepted),
            ExecutionMode::Check => {
                for edit in &accepted {
                    if !self_reporting.contains(edit.originating_rule_id.as_str()) {
                        all_violations.push(edit_as_violation(edit, ctx));
                    }
                }
                ctx.source_text.to_string()
            }
        };

        Ok(EngineOutcome {
            final_text,
            edits_applied_count: match mode {
                ExecutionMode::Format => accepted.len(),
                ExecutionMode::Check => 0,
            },
            violations: all_violations,
        })
    }

    /// Runs a single rule with its declared timeout and a panic boundary:
    /// a rule raising an error (or panicking) is contained and converted
    /// into a warning-severity `RuleFailure` violation; the rest of the
    /// engine continues (spec §4.3's failure semantics).
    fn run_one_rule(&self, rule: &dyn Rule, ctx: &ProcessingContext<'_>) -> RuleRun {
        let rule_id = rule.rule_id().to_string();
        let priority = rule.priority();
        let started = Instant::now();

        let result = panic::catch_unwind(AssertUnwindSafe(|| rule.apply(ctx)));

        let max_execution_time = rule.max_execution_time();
        let elapsed = started.elapsed();

        match result {
            Ok(outcome) if elapsed <= max_execution_time => RuleRun {
                rule_id,
                priority,
                edits: outcome.edits,
                violations: outcome.violations,
            },
            Ok(_) => RuleRun {
                rule_id: rule_id.clone(),
                priority,
                edits: Vec::new(),
                violations: vec![timeout_violation(&rule_id, ctx, max_execution_time)],
            },
            Err(panic) => {
                let message = panic_message(panic);
                warn!(rule_id, message, "rule panicked; discarding its output");
                RuleRun {
                    rule_id: rule_id.clone(),
                    priority,
                    edits: Vec::new(),
                    violations: vec![rule_failure_violation(&rule_id, ctx, &message)],
                }
            }
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn timeout_violation(rule_id: &str, ctx: &ProcessingContext<'_>, budget: Duration) -> Violation {
    ViolationBuilder::default()
        .rule_id(rule_id.to_string())
        .range(ctx.range_for_bytes(0, 0))
        .severity(Severity::Error)
        .message(format!(
            "rule '{rule_id}' exceeded its {budget:?} execution budget"
        ))
        .build()
        .expect("required fields set")
}

fn rule_failure_violation(rule_id: &str, ctx: &ProcessingContext<'_>, message: &str) -> Violation {
    ViolationBuilder::default()
        .rule_id(rule_id.to_string())
        .range(ctx.range_for_bytes(0, 0))
        .severity(Severity::Warning)
        .message(format!("rule '{rule_id}' failed: {message}"))
        .build()
        .expect("required fields set")
}

fn edit_as_violation(edit: &TextEdit, _ctx: &ProcessingContext<'_>) -> Violation {
    ViolationBuilder::default()
        .rule_id(edit.originating_rule_id.clone())
        .range(edit.range)
        .severity(Severity::Warning)
        .message(format!(
            "would replace with {:?} (check mode: not applied)",
            edit.replacement
        ))
        .suggested_fix(Some(edit.replacement.clone()))
        .build()
        .expect("required fields set")
}

/// Overlap detection and resolution (spec §4.3, point 4): two edits
/// conflict iff their ranges overlap. The edit from the lower-priority
/// (earlier-running) rule wins regardless of which one happens to start
/// earlier in the byte stream; the dropped edit becomes a
/// `Violation{severity=Warning}` tagged `EditSuppressed`.
///
/// `sorted_edits` arrives ordered by (start, end, priority, rule_id) per
/// spec §4.3 point 3 — that's the order callers see edits in, but
/// acceptance itself has to walk edits in priority order so a
/// late-starting, high-priority edit isn't shadowed by an early-starting,
/// low-priority one it hasn't been compared against yet.
fn resolve_conflicts(
    sorted_edits: Vec<(TextEdit, u32)>,
    violations: &mut Vec<Violation>,
) -> Vec<TextEdit> {
    let mut by_priority = sorted_edits;
    by_priority.sort_by(|(a, a_priority), (b, b_priority)| {
        a_priority
            .cmp(b_priority)
            .then(a.originating_rule_id.cmp(&b.originating_rule_id))
    });

    let mut accepted: Vec<(TextEdit, u32)> = Vec::with_capacity(by_priority.len());

    'next_edit: for (edit, priority) in by_priority {
        for (existing, _existing_priority) in &accepted {
            if edit.conflicts_with(existing) {
                violations.push(
                    ViolationBuilder::default()
                        .rule_id(edit.originating_rule_id.clone())
                        .range(edit.range)
                        .severity(Severity::Warning)
                        .message(format!(
                            "EditSuppressed: edit from '{}' conflicts with an edit from '{}' \
                             that ran at higher priority and was kept",
                            edit.originating_rule_id, existing.originating_rule_id
                        ))
                        .build()
                        .expect("required fields set"),
                );
                continue 'next_edit;
            }
        }
        accepted.push((edit, priority));
    }

    accepted.sort_by(|(a, _), (b, _)| compare_ranges(&a.range, &b.range));
    accepted.into_iter().map(|(edit, _)| edit).collect()
}

/// Applies non-conflicting edits in reverse order of `range.start` so
/// earlier byte offsets stay valid while later ones are rewritten (spec
/// §4.3, point 5).
fn apply_edits(source: &str, edits: &[TextEdit]) -> String {
    let mut text = source.to_string();
    let mut reverse_sorted: Vec<&TextEdit> = edits.iter().collect();
    reverse_sorted.sort_by(|a, b| b.range.start_byte.cmp(&a.range.start_byte));

    for edit in reverse_sorted {
        let start = edit.range.start_byte as usize;
        let end = edit.range.end_byte as usize;
        text.replace_range(start..end, &edit.replacement);
    }
    text
}

pub fn exceeds_severity_threshold(violations: &[Violation], threshold: Severity) -> bool {
    violations.iter().any(|v| v.severity >= threshold)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use crate::arena::NodeArena;
    use crate::arena::NodeIndex;
    use crate::config::RuleConfigSet;
    use crate::model::SourceRange;
    use crate::rule::RuleOutcome;

    use super::*;

    struct FixedEditRule {
        id: &'static str,
        priority: u32,
        start: u32,
        end: u32,
        replacement: &'static str,
    }

    impl Rule for FixedEditRule {
        fn rule_id(&self) -> &str {
            self.id
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        fn apply(&self, ctx: &ProcessingContext<'_>) -> RuleOutcome {
            let range = ctx.range_for_bytes(self.start, self.end);
            RuleOutcome {
                edits: vec![TextEdit {
                    range,
                    replacement: self.replacement.to_string(),
                    originating_rule_id: self.id.to_string(),
                    originating_priority: self.priority,
                }],
                violations: Vec::new(),
                metrics: Default::default(),
            }
        }
    }

    fn ctx<'a>(
        text: &'a str,
        arena: &'a NodeArena,
        config: &'a RuleConfigSet,
        enabled_rule_ids: &'a [&'a str],
    ) -> ProcessingContext<'a> {
        ProcessingContext {
            source_path: Path::new("Foo.java"),
            source_text: text,
            arena,
            root: NodeIndex::NONE,
            comments: &[],
            rule_config: config,
            enabled_rule_ids,
            deadline: Instant::now() + Duration::from_secs(5),
        }
    }

    #[test]
    fn conflicting_edits_keep_the_higher_priority_rule() {
        let text = "0123456789";
        let arena = NodeArena::new(text.len(), u64::MAX);
        let config = RuleConfigSet::default();
        let rule_a = Arc::new(FixedEditRule {
            id: "rule.a",
            priority: 10,
            start: 5,
            end: 10,
            replacement: "XX",
        });
        let rule_b = Arc::new(FixedEditRule {
            id: "rule.b",
            priority: 20,
            start: 8,
            end: 12,
            replacement: "YY",
        });
        let engine = RuleEngine::new(vec![rule_a.clone(), rule_b.clone()]);
        let enabled = ["rule.a", "rule.b"];
        let context = ctx(text, &arena, &config, &enabled);
        let outcome = engine.run(&context, ExecutionMode::Format).unwrap();

        assert_eq!(outcome.edits_applied_count, 1);
        assert!(outcome.final_text.starts_with("01234XX"));
        assert!(outcome
            .violations
            .iter()
            .any(|v| v.message.contains("EditSuppressed") && v.rule_id == "rule.b"));
    }

    #[test]
    fn conflict_resolution_prefers_priority_over_start_position() {
        // rule_x starts later in the file but runs at a lower priority
        // number (higher precedence); rule_y starts earlier but runs
        // later. Sorting acceptance by start position alone would pick
        // rule_y just because it comes first in that order — priority
        // must decide the winner instead.
        let text = "0123456789012345678901234567890";
        let arena = NodeArena::new(text.len(), u64::MAX);
        let config = RuleConfigSet::default();
        let rule_x = Arc::new(FixedEditRule {
            id: "rule.x",
            priority: 0,
            start: 10,
            end: 20,
            replacement: "XX",
        });
        let rule_y = Arc::new(FixedEditRule {
            id: "rule.y",
            priority: 50,
            start: 5,
            end: 15,
            replacement: "YY",
        });
        let engine = RuleEngine::new(vec![rule_x, rule_y]);
        let enabled = ["rule.x", "rule.y"];
        let context = ctx(text, &arena, &config, &enabled);
        let outcome = engine.run(&context, ExecutionMode::Format).unwrap();

        assert_eq!(outcome.edits_applied_count, 1);
        assert!(
            outcome
                .violations
                .iter()
                .any(|v| v.message.contains("EditSuppressed") && v.rule_id == "rule.y"),
            "the later-starting but lower-priority-number rule.x should win: {:#?}",
            outcome.violations
        );
    }

    #[test]
    fn check_mode_does_not_modify_text() {
        let text = "0123456789";
        let arena = NodeArena::new(text.len(), u64::MAX);
        let config = RuleConfigSet::default();
        let rule = Arc::new(FixedEditRule {
            id: "rule.a",
            priority: 10,
            start: 0,
            end: 1,
            replacement: "Z",
        });
        let engine = RuleEngine::new(vec![rule]);
        let enabled = ["rule.a"];
        let context = ctx(text, &arena, &config, &enabled);
        let outcome = engine.run(&context, ExecutionMode::Check).unwrap();
        assert_eq!(outcome.final_text, text);
        assert_eq!(outcome.edits_applied_count, 0);
        assert_eq!(outcome.violations.len(), 1);
    }

    #[test]
    fn zero_enabled_rules_is_an_identity_transform() {
        let text = "class Foo {}\n";
        let arena = NodeArena::new(text.len(), u64::MAX);
        let config = RuleConfigSet::default();
        let engine = RuleEngine::new(Vec::new());
        let enabled: [&str; 0] = [];
        let context = ctx(text, &arena, &config, &enabled);
        let outcome = engine.run(&context, ExecutionMode::Format).unwrap();
        assert_eq!(outcome.final_text, text);
        assert!(outcome.violations.is_empty());
    }
}
