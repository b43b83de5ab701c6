//! Test harness for rule authors, mirroring the teacher's `RuleTester`
//! pattern but collapsed to this crate's single-language, single-rule
//! shape: feed a rule `valid`/`invalid` source snippets, run it through
//! the real [`RuleEngine`], and assert the resulting violations and
//! (for `invalid` cases with `output` set) the formatted text match.
//!
//! The `violation!`/`rule_tests!` proc macros expand into the types here,
//! so rule modules write their test tables declaratively and this module
//! does the actual parsing/running/asserting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RuleConfigSet;
use crate::model::Severity;
use crate::parser::{self, TargetVersion};
use crate::rule::{ProcessingContext, Rule};
use crate::rule_engine::{ExecutionMode, RuleEngine};

/// A single constraint a test expects some violation to satisfy. Both
/// fields are optional: an empty `ExpectedViolation` just asserts "at
/// least one violation was reported".
#[derive(Debug, Clone, Default)]
pub struct ExpectedViolation {
    pub message_contains: Option<String>,
    pub severity: Option<Severity>,
}

impl ExpectedViolation {
    fn matches(&self, violation: &crate::model::Violation) -> bool {
        if let Some(needle) = self.message_contains.as_deref() {
            if !violation.message.contains(needle) {
                return false;
            }
        }
        if let Some(expected_severity) = self.severity {
            if violation.severity != expected_severity {
                return false;
            }
        }
        true
    }
}

/// A source snippet expected to produce no violations from the rule
/// under test.
#[derive(Debug, Clone)]
pub struct RuleTestValid {
    pub code: String,
}

/// A source snippet expected to trip the rule under test, with an
/// optional expected post-format text.
#[derive(Debug, Clone)]
pub struct RuleTestInvalid {
    pub code: String,
    pub errors: Vec<ExpectedViolation>,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleTests {
    pub valid: Vec<RuleTestValid>,
    pub invalid: Vec<RuleTestInvalid>,
}

/// Runs every case in `tests` against `rule`, panicking with a message
/// naming the failing snippet on the first mismatch. Intended to be
/// called directly from a `#[test]` function.
pub struct RuleTester {
    rule: Arc<dyn Rule>,
}

impl RuleTester {
    pub fn new(rule: Arc<dyn Rule>) -> Self {
        Self { rule }
    }

    pub fn run(rule: Arc<dyn Rule>, tests: RuleTests) {
        Self::new(rule).run_tests(&tests)
    }

    pub fn run_tests(&self, tests: &RuleTests) {
        for valid in &tests.valid {
            self.run_valid(valid);
        }
        for invalid in &tests.invalid {
            self.run_invalid(invalid);
        }
    }

    fn run_valid(&self, test: &RuleTestValid) {
        let outcome = self.run_rule(&test.code, ExecutionMode::Check);
        assert!(
            outcome.violations.is_empty(),
            "expected no violations for valid case {:?}, got {:#?}",
            test.code,
            outcome.violations
        );
    }

    fn run_invalid(&self, test: &RuleTestInvalid) {
        let check_outcome = self.run_rule(&test.code, ExecutionMode::Check);
        assert_eq!(
            check_outcome.final_text, test.code,
            "Check mode must never modify the source text"
        );

        for expected in &test.errors {
            assert!(
                check_outcome.violations.iter().any(|v| expected.matches(v)),
                "no violation in {:#?} matched expectation {:#?} for case {:?}",
                check_outcome.violations,
                expected,
                test.code
            );
        }
        assert!(
            !check_outcome.violations.is_empty(),
            "expected at least one violation for invalid case {:?}",
            test.code
        );

        if let Some(expected_output) = test.output.as_deref() {
            let format_outcome = self.run_rule(&test.code, ExecutionMode::Format);
            assert_eq!(
                format_outcome.final_text, expected_output,
                "formatted output mismatch for case {:?}",
                test.code
            );
        }
    }

    fn run_rule(&self, code: &str, mode: ExecutionMode) -> crate::rule_engine::EngineOutcome {
        let parsed = parser::parse(code, TargetVersion::default(), u64::MAX);
        assert!(
            parsed.errors.is_empty(),
            "test snippet failed to parse: {:?}\n{:#?}",
            code,
            parsed.errors
        );

        let config = RuleConfigSet::default();
        let rule_id = self.rule.rule_id().to_string();
        let enabled_rule_ids = [rule_id.as_str()];
        let ctx = ProcessingContext {
            source_path: std::path::Path::new("Test.java"),
            source_text: code,
            arena: &parsed.arena,
            root: parsed.root,
            comments: &parsed.comments,
            rule_config: &config,
            enabled_rule_ids: &enabled_rule_ids,
            deadline: Instant::now() + Duration::from_secs(5),
        };

        let engine = RuleEngine::new(vec![self.rule.clone()]);
        engine
            .run(&ctx, mode)
            .expect("rule engine run should not fail in tests")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceRange, Violation, ViolationBuilder};
    use crate::rule::{ProcessingContext as Ctx, RuleOutcome};

    struct AlwaysFlagsNonEmptyFiles;
    impl Rule for AlwaysFlagsNonEmptyFiles {
        fn rule_id(&self) -> &str {
            "test.always-flags"
        }
        fn priority(&self) -> u32 {
            100
        }
        fn apply(&self, ctx: &Ctx<'_>) -> RuleOutcome {
            if ctx.source_text.is_empty() {
                return RuleOutcome::default();
            }
            let violation: Violation = ViolationBuilder::default()
                .rule_id(self.rule_id())
                .range(SourceRange::new(
                    ctx.position_at(0),
                    ctx.position_at(0),
                    0,
                    0,
                ))
                .message("non-empty file")
                .build()
                .unwrap();
            RuleOutcome {
                edits: vec![],
                violations: vec![violation],
                metrics: Default::default(),
            }
        }
    }

    #[test]
    fn valid_case_passes_when_rule_reports_nothing() {
        RuleTester::run(
            Arc::new(AlwaysFlagsNonEmptyFiles),
            RuleTests {
                valid: vec![RuleTestValid {
                    code: String::new(),
                }],
                invalid: vec![],
            },
        );
    }

    #[test]
    fn invalid_case_matches_message_and_severity() {
        RuleTester::run(
            Arc::new(AlwaysFlagsNonEmptyFiles),
            RuleTests {
                valid: vec![],
                invalid: vec![RuleTestInvalid {
                    code: "class Foo {}".to_string(),
                    errors: vec![ExpectedViolation {
                        message_contains: Some("non-empty".to_string()),
                        severity: Some(Severity::Warning),
                    }],
                    output: None,
                }],
            },
        );
    }

    #[test]
    #[should_panic(expected = "no violation")]
    fn invalid_case_fails_when_expectation_does_not_match() {
        RuleTester::run(
            Arc::new(AlwaysFlagsNonEmptyFiles),
            RuleTests {
                valid: vec![],
                invalid: vec![RuleTestInvalid {
                    code: "class Foo {}".to_string(),
                    errors: vec![ExpectedViolation {
                        message_contains: Some("nonexistent-phrase".to_string()),
                        severity: None,
                    }],
                    output: None,
                }],
            },
        );
    }
}
