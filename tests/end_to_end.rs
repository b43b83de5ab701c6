//! Black-box pipeline/scheduler tests (driving `styler` the way a
//! downstream consumer would, through its public API only).

use std::fs;
use std::sync::Arc;

use styler::{
    ExecutionMode, LineLengthRule, Pipeline, PipelineOptions, Rule, RuleConfigSet, RuleEngine,
    Scheduler, SchedulerOptions, SecurityLimits, StageResult, SysinfoMemoryMonitor, TargetVersion,
};
use tempfile::tempdir;

fn pipeline(mode: ExecutionMode) -> Pipeline {
    let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(LineLengthRule)];
    let engine = RuleEngine::new(rules);
    Pipeline::new(
        engine,
        RuleConfigSet::default(),
        SecurityLimits::default(),
        PipelineOptions {
            mode,
            dry_run: false,
            target_version: TargetVersion::default(),
        },
    )
}

#[test]
fn format_then_check_yields_zero_violations() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Wide.java");
    let long_comment = "x".repeat(140);
    fs::write(&path, format!("// {long_comment}\n")).unwrap();

    let format_result = pipeline(ExecutionMode::Format).process(&path);
    let StageResult::Success(output) = format_result else {
        panic!("format stage should succeed");
    };
    assert!(output.violations.is_empty(), "format mode applies, not reports");

    let rewritten = fs::read_to_string(&path).unwrap();
    assert!(
        rewritten.lines().all(|line| line.len() <= 120),
        "every line of the rewritten file fits the configured max"
    );

    let check_result = pipeline(ExecutionMode::Check).process(&path);
    let StageResult::Success(output) = check_result else {
        panic!("check stage should succeed");
    };
    assert!(
        output.violations.is_empty(),
        "running check on the reformatted output finds nothing left to flag"
    );
}

#[test]
fn check_mode_reports_without_touching_the_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Wide.java");
    let long_comment = "y".repeat(140);
    let original = format!("// {long_comment}\n");
    fs::write(&path, &original).unwrap();

    let result = pipeline(ExecutionMode::Check).process(&path);
    let StageResult::Success(output) = result else {
        panic!("check stage should succeed");
    };
    assert_eq!(output.violations.len(), 1);
    assert_eq!(output.violations[0].rule_id, "line-length");

    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[tokio::test]
async fn batch_isolates_one_unreadable_file_from_its_peers() {
    let dir = tempdir().unwrap();
    let good_path = dir.path().join("Good.java");
    fs::write(&good_path, "class Good {}\n").unwrap();
    let missing_path = dir.path().join("DoesNotExist.java");

    let pipeline = Arc::new(pipeline(ExecutionMode::Check));
    let scheduler = Scheduler::new(
        pipeline,
        Arc::new(SysinfoMemoryMonitor::default()),
        SchedulerOptions::default(),
    );

    let batch = scheduler
        .run_batch(vec![good_path, missing_path])
        .await;

    assert_eq!(batch.success_count, 1);
    assert_eq!(batch.error_count, 1);
    assert_eq!(batch.errors.len(), 1);
}
