//! The parallel-file scheduler (spec §4.5): fans a [`Pipeline`] across many
//! files with a bounded concurrency permit, coarse memory-pressure
//! admission control, per-file panic isolation, and cooperative
//! cancellation. Grounded on the bounded-`Semaphore` worker-pool pattern
//! used for concurrent per-item work elsewhere in the retrieval pack
//! (`ferrex-core`'s `image_service` variant downloads).

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sysinfo::{System, SystemExt};
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::model::{BatchResult, PerFileResult, PipelineError, PipelineErrorKind, StageResult};
use crate::pipeline::Pipeline;

/// Default concurrency permit capacity (spec §4.5).
pub const DEFAULT_MAX_CONCURRENT_FILES: usize = 100;
/// Default memory soft limit the scheduler throttles admission against.
pub const DEFAULT_MEMORY_SOFT_LIMIT_BYTES: u64 = 512 * 1024 * 1024;
const MEMORY_THROTTLE_SLEEP: Duration = Duration::from_millis(100);

/// Abstraction over host memory usage so the throttling policy is
/// testable without a real `sysinfo` sample (spec §4.5, §9).
pub trait MemoryMonitor: Send + Sync {
    fn used_bytes(&self) -> u64;
}

/// The shipped `MemoryMonitor`: samples host memory usage via `sysinfo`,
/// lazily and only at admission time, never on every scheduler tick.
pub struct SysinfoMemoryMonitor {
    system: Mutex<System>,
}

impl SysinfoMemoryMonitor {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }
}

impl Default for SysinfoMemoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMonitor for SysinfoMemoryMonitor {
    fn used_bytes(&self) -> u64 {
        let mut system = self.system.lock().expect("memory monitor mutex poisoned");
        system.refresh_memory();
        system.used_memory() * 1024
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub max_concurrent_files: usize,
    pub memory_soft_limit_bytes: u64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_concurrent_files: DEFAULT_MAX_CONCURRENT_FILES,
            memory_soft_limit_bytes: DEFAULT_MEMORY_SOFT_LIMIT_BYTES,
        }
    }
}

/// Fans a shared [`Pipeline`] across many files (spec §4.5). Cheap to
/// clone the handles it hands to worker tasks; the scheduler itself is
/// typically built once per batch run.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    memory_monitor: Arc<dyn MemoryMonitor>,
    options: SchedulerOptions,
    cancelled: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        memory_monitor: Arc<dyn MemoryMonitor>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            pipeline,
            memory_monitor,
            options,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals every not-yet-started task to skip itself. Tasks already
    /// running complete normally (spec §4.5's "no hard kill").
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Runs `paths` through the scheduler's pipeline with bounded
    /// concurrency, returning only after every task has finished or been
    /// skipped (spec §4.5's "Result").
    #[instrument(level = "info", skip(self, paths), fields(file_count = paths.len()))]
    pub async fn run_batch(&self, paths: Vec<PathBuf>) -> BatchResult {
        let (result, _) = self.run_batch_detailed(paths).await;
        result
    }

    /// As [`Scheduler::run_batch`], but also returns each path's own
    /// result alongside the aggregate — callers that need per-file
    /// reporting (the demo binary's `--json`/human renderers) use this;
    /// `BatchResult` alone only carries counts (spec §4.5).
    pub async fn run_batch_detailed(
        &self,
        paths: Vec<PathBuf>,
    ) -> (BatchResult, Vec<(PathBuf, PerFileResult)>) {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_files.max(1)));
        let mut handles = Vec::with_capacity(paths.len());

        for path in paths {
            if self.cancelled.load(Ordering::SeqCst) {
                handles.push((path, None));
                continue;
            }

            while self.memory_monitor.used_bytes() > self.options.memory_soft_limit_bytes {
                if self.cancelled.load(Ordering::SeqCst) {
                    break;
                }
                debug!(path = %path.display(), "memory pressure high, throttling admission");
                tokio::time::sleep(MEMORY_THROTTLE_SLEEP).await;
            }

            if self.cancelled.load(Ordering::SeqCst) {
                handles.push((path, None));
                continue;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("scheduler semaphore should never be closed mid-batch");
            let pipeline = self.pipeline.clone();
            let task_path = path.clone();

            handles.push((
                path,
                Some(tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    run_one_file(&pipeline, &task_path)
                })),
            ));
        }

        let mut result = BatchResult::default();
        let mut per_file = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            match handle {
                None => result.record_skipped(),
                Some(handle) => match handle.await {
                    Ok(per_file_result) => {
                        result.record(&per_file_result);
                        per_file.push((path, per_file_result));
                    }
                    Err(join_error) => {
                        warn!(error = %join_error, "file task panicked or was cancelled");
                        let error = PipelineError::new(
                            PipelineErrorKind::RuleFailure,
                            "scheduler",
                            path.clone(),
                            format!("file task terminated abnormally: {join_error}"),
                        );
                        let failure = StageResult::Failure(error);
                        result.record(&failure);
                        per_file.push((path, failure));
                    }
                },
            }
        }
        (result, per_file)
    }
}

/// Runs one file's pipeline with panic containment: a panic inside
/// `Pipeline::process` becomes a `RuleFailure` result rather than
/// unwinding into the worker thread (spec §4.5's isolation requirement;
/// this is a belt-and-suspenders layer on top of the rule engine's own
/// per-rule `catch_unwind`).
fn run_one_file(pipeline: &Pipeline, path: &PathBuf) -> PerFileResult {
    match panic::catch_unwind(AssertUnwindSafe(|| pipeline.process(path))) {
        Ok(result) => result,
        Err(panic_payload) => {
            let message = panic_message(&panic_payload);
            StageResult::Failure(PipelineError::new(
                PipelineErrorKind::RuleFailure,
                "scheduler",
                path.clone(),
                format!("pipeline panicked: {message}"),
            ))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfigSet;
    use crate::pipeline::PipelineOptions;
    use crate::rule_engine::RuleEngine;
    use crate::security::SecurityLimits;
    use std::io::Write;

    struct FakeMemoryMonitor {
        bytes: std::sync::atomic::AtomicU64,
    }

    impl MemoryMonitor for FakeMemoryMonitor {
        fn used_bytes(&self) -> u64 {
            self.bytes.load(Ordering::SeqCst)
        }
    }

    fn pipeline() -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            RuleEngine::new(vec![]),
            RuleConfigSet::default(),
            SecurityLimits::default(),
            PipelineOptions::default(),
        ))
    }

    #[tokio::test]
    async fn empty_batch_is_trivially_successful() {
        let scheduler = Scheduler::new(
            pipeline(),
            Arc::new(FakeMemoryMonitor {
                bytes: std::sync::atomic::AtomicU64::new(0),
            }),
            SchedulerOptions::default(),
        );
        let result = scheduler.run_batch(vec![]).await;
        assert_eq!(result.success_count, 0);
        assert_eq!(result.error_count, 0);
        assert_eq!(result.skipped_count, 0);
    }

    #[tokio::test]
    async fn cancelling_before_submission_skips_every_file() {
        let scheduler = Scheduler::new(
            pipeline(),
            Arc::new(FakeMemoryMonitor {
                bytes: std::sync::atomic::AtomicU64::new(0),
            }),
            SchedulerOptions::default(),
        );
        scheduler.cancel();
        let result = scheduler
            .run_batch(vec![PathBuf::from("a.java"), PathBuf::from("b.java")])
            .await;
        assert_eq!(result.skipped_count, 2);
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn unreadable_file_is_isolated_as_an_error_not_a_panic() {
        let scheduler = Scheduler::new(
            pipeline(),
            Arc::new(FakeMemoryMonitor {
                bytes: std::sync::atomic::AtomicU64::new(0),
            }),
            SchedulerOptions::default(),
        );
        let missing = std::env::temp_dir().join("styler-scheduler-test-missing.java");
        let _ = std::fs::remove_file(&missing);
        let result = scheduler.run_batch(vec![missing]).await;
        assert_eq!(result.success_count, 0);
        assert_eq!(result.error_count, 1);
    }

    #[tokio::test]
    async fn mixed_batch_counts_successes_and_errors_independently() {
        let dir = std::env::temp_dir().join("styler-scheduler-test-mixed");
        let _ = std::fs::create_dir_all(&dir);
        let good = dir.join("Good.java");
        let mut file = std::fs::File::create(&good).unwrap();
        file.write_all(b"class Good {}\n").unwrap();
        let missing = dir.join("DoesNotExist.java");
        let _ = std::fs::remove_file(&missing);

        let scheduler = Scheduler::new(
            pipeline(),
            Arc::new(FakeMemoryMonitor {
                bytes: std::sync::atomic::AtomicU64::new(0),
            }),
            SchedulerOptions::default(),
        );
        let result = scheduler.run_batch(vec![good, missing]).await;
        assert_eq!(result.success_count, 1);
        assert_eq!(result.error_count, 1);
    }
}
