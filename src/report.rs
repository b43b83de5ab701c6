//! The violation report's stable JSON data model (spec §6). Owned by the
//! core because it is the contract between the pipeline and any renderer;
//! turning it into ANSI-colored terminal text is a rendering concern left
//! to the demo binary (or any other consumer).

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{Severity, Violation};

const REPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportLocation {
    pub line: u32,
    pub column: u32,
    #[serde(rename = "startPosition")]
    pub start_position: u32,
    #[serde(rename = "endPosition")]
    pub end_position: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFix {
    pub description: String,
    #[serde(rename = "autoFixable")]
    pub auto_fixable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportViolation {
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub location: ReportLocation,
    pub fixes: Vec<ReportFix>,
}

impl From<&Violation> for ReportViolation {
    fn from(violation: &Violation) -> Self {
        let fixes = match violation.suggested_fix.as_ref() {
            Some(description) => vec![ReportFix {
                description: description.clone(),
                auto_fixable: true,
            }],
            None => Vec::new(),
        };
        Self {
            rule_id: violation.rule_id.clone(),
            severity: violation.severity,
            message: violation.message.clone(),
            location: ReportLocation {
                line: violation.range.start.line,
                column: violation.range.start.column,
                start_position: violation.range.start_byte,
                end_position: violation.range.end_byte,
            },
            fixes,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    #[serde(rename = "totalViolations")]
    pub total_violations: usize,
    #[serde(rename = "errorCount")]
    pub error_count: usize,
    #[serde(rename = "warningCount")]
    pub warning_count: usize,
    #[serde(rename = "infoCount")]
    pub info_count: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RuleGroupCount {
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationReport {
    pub version: String,
    pub file: String,
    pub timestamp: String,
    pub summary: ReportSummary,
    pub violations: Vec<ReportViolation>,
    #[serde(rename = "groupedByRule")]
    pub grouped_by_rule: BTreeMap<String, RuleGroupCount>,
}

impl ViolationReport {
    /// Builds a report for one file's violations, stamping `timestamp`
    /// as the current UTC instant. Kept as a separate parameter-free
    /// wrapper around [`ViolationReport::with_timestamp`] so callers that
    /// need a deterministic timestamp (tests, replay) can supply one.
    pub fn new(source_path: &Path, violations: &[Violation]) -> Self {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        Self::with_timestamp(source_path, violations, timestamp)
    }

    pub fn with_timestamp(
        source_path: &Path,
        violations: &[Violation],
        timestamp: impl Into<String>,
    ) -> Self {
        let mut summary = ReportSummary::default();
        let mut grouped_by_rule: BTreeMap<String, RuleGroupCount> = BTreeMap::new();
        let report_violations: Vec<ReportViolation> = violations
            .iter()
            .map(|violation| {
                summary.total_violations += 1;
                match violation.severity {
                    Severity::Error => summary.error_count += 1,
                    Severity::Warning => summary.warning_count += 1,
                    Severity::Info => summary.info_count += 1,
                }
                grouped_by_rule
                    .entry(violation.rule_id.clone())
                    .or_default()
                    .count += 1;
                ReportViolation::from(violation)
            })
            .collect();

        Self {
            version: REPORT_VERSION.to_string(),
            file: source_path.display().to_string(),
            timestamp: timestamp.into(),
            summary,
            violations: report_violations,
            grouped_by_rule,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourcePosition, SourceRange, ViolationBuilder};
    use std::path::PathBuf;

    fn violation(rule_id: &str, severity: Severity) -> Violation {
        ViolationBuilder::default()
            .rule_id(rule_id)
            .range(SourceRange::new(
                SourcePosition::new(1, 121),
                SourcePosition::new(1, 126),
                120,
                125,
            ))
            .severity(severity)
            .message("line exceeds 120 characters")
            .build()
            .unwrap()
    }

    #[test]
    fn empty_violations_yield_zeroed_summary() {
        let report = ViolationReport::with_timestamp(Path::new("Foo.java"), &[], "2026-01-01T00:00:00Z");
        assert_eq!(report.summary.total_violations, 0);
        assert!(report.violations.is_empty());
        assert!(report.grouped_by_rule.is_empty());
    }

    #[test]
    fn summary_counts_by_severity_and_groups_by_rule() {
        let violations = vec![
            violation("line-length", Severity::Warning),
            violation("line-length", Severity::Warning),
            violation("brace-style", Severity::Error),
        ];
        let report = ViolationReport::with_timestamp(
            Path::new("Foo.java"),
            &violations,
            "2026-01-01T00:00:00Z",
        );
        assert_eq!(report.summary.total_violations, 3);
        assert_eq!(report.summary.warning_count, 2);
        assert_eq!(report.summary.error_count, 1);
        assert_eq!(report.grouped_by_rule["line-length"].count, 2);
        assert_eq!(report.grouped_by_rule["brace-style"].count, 1);
    }

    #[test]
    fn location_reflects_the_violation_range() {
        let violations = vec![violation("line-length", Severity::Warning)];
        let report = ViolationReport::with_timestamp(
            Path::new("Foo.java"),
            &violations,
            "2026-01-01T00:00:00Z",
        );
        let location = &report.violations[0].location;
        assert_eq!(location.line, 1);
        assert_eq!(location.column, 121);
        assert_eq!(location.start_position, 120);
        assert_eq!(location.end_position, 125);
    }

    #[test]
    fn report_serializes_to_the_documented_shape() {
        let violations = vec![violation("line-length", Severity::Warning)];
        let report = ViolationReport::with_timestamp(
            Path::new("Foo.java"),
            &violations,
            "2026-01-01T00:00:00Z",
        );
        let json = report.to_json().unwrap();
        assert!(json.contains("\"ruleId\": \"line-length\""));
        assert!(json.contains("\"totalViolations\": 1"));
        assert!(json.contains("\"groupedByRule\""));
    }

    #[test]
    fn an_unmarked_violation_has_no_auto_fixable_entries() {
        let violations = vec![violation("line-length", Severity::Warning)];
        let report = ViolationReport::with_timestamp(
            Path::new("Foo.java"),
            &violations,
            "2026-01-01T00:00:00Z",
        );
        assert!(report.violations[0].fixes.is_empty());
    }
}
