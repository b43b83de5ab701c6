//! `line-length`: flags (and, in format mode, rewraps) any line longer
//! than a configurable maximum (spec §8, scenario 2-3). The illustrative
//! rule named throughout the rest of the spec as a worked example of the
//! rule contract.

use crate::model::{Severity, TextEdit, TextEditBuilder, Violation, ViolationBuilder};
use crate::rule::{ProcessingContext, Rule, RuleMetrics, RuleOutcome};

pub const DEFAULT_MAX_LINE_LENGTH: usize = 120;
const DEFAULT_PRIORITY: u32 = 500;

#[derive(Debug, Default)]
pub struct LineLengthRule;

impl LineLengthRule {
    fn max_line_length(&self, ctx: &ProcessingContext<'_>) -> usize {
        ctx.config_for(self.rule_id())
            .option("max")
            .and_then(|v| v.as_integer())
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Finds the best place to break `line` (a byte range over `source`,
    /// with `line` holding its text) so the first segment fits within
    /// `max`: the last ASCII space at or before `max`, or `max` itself if
    /// the line has no earlier whitespace to break on.
    fn break_point(line: &str, max: usize) -> usize {
        let candidate = line.as_bytes()[..max.min(line.len())]
            .iter()
            .rposition(|&b| b == b' ')
            .map(|p| p + 1)
            .unwrap_or(max);
        // Guarantee forward progress even at a degenerate `max` of 0.
        candidate.max(1).min(line.len())
    }

    /// Wraps `rest` into as many `max`-or-shorter segments as it takes,
    /// joined by `\n`. A single call to `break_point` only guarantees the
    /// *first* segment fits — an early space (e.g. right after `// `) can
    /// leave a remainder that is still over length, so this keeps
    /// re-applying `break_point` to whatever remains.
    fn wrap_remainder(mut rest: &str, max: usize) -> String {
        let mut out = String::with_capacity(rest.len() + rest.len() / max.max(1));
        while rest.len() > max {
            let break_at = Self::break_point(rest, max);
            let drops_a_space = break_at > 0 && rest.as_bytes()[break_at - 1] == b' ';
            let seg_end = if drops_a_space { break_at - 1 } else { break_at };
            out.push_str(&rest[..seg_end]);
            out.push('\n');
            rest = &rest[break_at..];
        }
        out.push_str(rest);
        out
    }
}

impl Rule for LineLengthRule {
    fn rule_id(&self) -> &str {
        "line-length"
    }

    fn priority(&self) -> u32 {
        DEFAULT_PRIORITY
    }

    /// Reports its own violation for every over-length line, anchored at
    /// the first over-limit column (spec §8 scenario 2: `column == max +
    /// 1`) rather than wherever the accompanying edit happens to start
    /// wrapping — the edit's own range has to start at the chosen break
    /// point for the rewrap to apply correctly in format mode, which is
    /// usually short of `max` (the last space within budget), so the two
    /// locations are deliberately independent.
    fn apply(&self, ctx: &ProcessingContext<'_>) -> RuleOutcome {
        let max = self.max_line_length(ctx);
        let mut edits = Vec::new();
        let mut violations = Vec::new();
        let mut nodes_visited = 0u64;

        let mut line_start = 0usize;
        for line in ctx.source_text.split('\n') {
            nodes_visited += 1;
            let stripped = line.strip_suffix('\r').unwrap_or(line);
            if stripped.len() > max {
                let break_at = Self::break_point(stripped, max);
                let drops_a_space = break_at > 0 && stripped.as_bytes()[break_at - 1] == b' ';
                let edit_start_in_line = if drops_a_space { break_at - 1 } else { break_at };

                let mut replacement = String::with_capacity(stripped.len() - break_at + 1);
                replacement.push('\n');
                replacement.push_str(&Self::wrap_remainder(&stripped[break_at..], max));

                let edit: TextEdit = TextEditBuilder::default()
                    .range(ctx.range_for_bytes(
                        (line_start + edit_start_in_line) as u32,
                        (line_start + stripped.len()) as u32,
                    ))
                    .replacement(replacement.clone())
                    .originating_rule_id(self.rule_id())
                    .originating_priority(self.priority())
                    .build()
                    .expect("all required TextEdit fields are set above");

                let violation: Violation = ViolationBuilder::default()
                    .rule_id(self.rule_id())
                    .range(ctx.range_for_bytes(
                        (line_start + max) as u32,
                        (line_start + stripped.len()) as u32,
                    ))
                    .severity(Severity::Warning)
                    .message(format!("line exceeds the {max}-character limit"))
                    .suggested_fix(Some(replacement))
                    .build()
                    .expect("all required Violation fields are set above");

                edits.push(edit);
                violations.push(violation);
            }
            line_start += line.len() + 1;
        }

        RuleOutcome {
            edits,
            violations,
            metrics: RuleMetrics { nodes_visited },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proc_macros::rule_tests_crate_internal as rule_tests;
    use std::sync::Arc;

    #[test]
    fn short_lines_are_valid() {
        crate::rule_testing::RuleTester::run(
            Arc::new(LineLengthRule),
            rule_tests! {
                valid => ["class Foo {}\n"],
                invalid => [],
            },
        );
    }

    #[test]
    fn long_line_is_flagged_at_column_after_max() {
        let long_comment = "x".repeat(125);
        let code = format!("// {long_comment}\n");
        crate::rule_testing::RuleTester::run(
            Arc::new(LineLengthRule),
            rule_tests! {
                valid => [],
                invalid => [
                    {
                        code => code,
                        errors => [
                            { message => "exceeds the 120-character limit", severity => crate::model::Severity::Warning },
                        ],
                    },
                ],
            },
        );
    }

    #[test]
    fn break_point_prefers_last_space_within_budget() {
        let line = "a ".repeat(70); // plenty of spaces before byte 120
        assert!(LineLengthRule::break_point(&line, 120) <= 120);
    }

    #[test]
    fn break_point_falls_back_to_hard_break_with_no_whitespace() {
        let line = "x".repeat(130);
        assert_eq!(LineLengthRule::break_point(&line, 120), 120);
    }

    /// An early space (e.g. the one right after `//`) can put `break_point`
    /// well short of `max`, leaving a remainder that is itself still over
    /// length. `wrap_remainder` must keep re-wrapping until every produced
    /// segment fits, not just the first one.
    #[test]
    fn wrap_remainder_keeps_wrapping_past_an_early_break_point() {
        let rest = "x".repeat(140);
        let wrapped = LineLengthRule::wrap_remainder(&rest, 120);
        assert!(
            wrapped.lines().all(|line| line.len() <= 120),
            "every wrapped segment must fit max: {wrapped:?}"
        );
        assert_eq!(wrapped.replace('\n', ""), rest, "no bytes are lost while wrapping");
    }

    #[test]
    fn format_mode_fully_wraps_a_line_with_only_an_early_space() {
        use crate::config::RuleConfigSet;
        use crate::parser::{self, TargetVersion};
        use crate::rule_engine::{ExecutionMode, RuleEngine};
        use std::time::{Duration, Instant};

        let code = format!("// {}\n", "x".repeat(140));
        let outcome = parser::parse(&code, TargetVersion::default(), u64::MAX);
        assert!(outcome.errors.is_empty());

        let config = RuleConfigSet::default();
        let enabled = ["line-length"];
        let ctx = ProcessingContext {
            source_path: std::path::Path::new("Wide.java"),
            source_text: &code,
            arena: &outcome.arena,
            root: outcome.root,
            comments: &outcome.comments,
            rule_config: &config,
            enabled_rule_ids: &enabled,
            deadline: Instant::now() + Duration::from_secs(5),
        };

        let engine = RuleEngine::new(vec![Arc::new(LineLengthRule)]);
        let result = engine.run(&ctx, ExecutionMode::Format).unwrap();
        assert!(
            result.final_text.lines().all(|line| line.len() <= 120),
            "every line of the formatted output must fit max: {:?}",
            result.final_text
        );
    }

    /// The wrap point the accompanying edit applies at (the last space
    /// within budget) is well short of column 120 for a `// `-prefixed
    /// comment; the reported violation must still anchor at the first
    /// over-limit column, not at that break point.
    #[test]
    fn check_mode_violation_anchors_at_the_first_over_limit_column() {
        use crate::config::RuleConfigSet;
        use crate::parser::{self, TargetVersion};
        use crate::rule_engine::{ExecutionMode, RuleEngine};
        use std::time::{Duration, Instant};

        let code = format!("// {}\n", "x".repeat(125));
        let outcome = parser::parse(&code, TargetVersion::default(), u64::MAX);
        assert!(outcome.errors.is_empty());

        let config = RuleConfigSet::default();
        let enabled = ["line-length"];
        let ctx = ProcessingContext {
            source_path: std::path::Path::new("Wide.java"),
            source_text: &code,
            arena: &outcome.arena,
            root: outcome.root,
            comments: &outcome.comments,
            rule_config: &config,
            enabled_rule_ids: &enabled,
            deadline: Instant::now() + Duration::from_secs(5),
        };

        let engine = RuleEngine::new(vec![Arc::new(LineLengthRule)]);
        let result = engine.run(&ctx, ExecutionMode::Check).unwrap();
        assert_eq!(
            result.violations.len(),
            1,
            "one violation per over-length line, not a second one from the generic \
             edit-to-violation fallback: {:#?}",
            result.violations
        );
        assert_eq!(result.violations[0].range.start.column, 121);
    }
}
