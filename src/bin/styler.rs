//! Demo CLI binary (spec §6): `check`/`format` subcommands over one or
//! more file/directory paths, wired to the library's pipeline and
//! scheduler. Argument parsing, directory discovery, and human/JSON
//! rendering live here — they are the collaborators the core spec
//! deliberately excludes (spec §10); everything downstream of "which
//! files, in what mode" is the library's job.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use regex::Regex;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use styler::{
    exceeds_severity_threshold, ExecutionMode, LineLengthRule, Pipeline, PipelineOptions, Rule,
    RuleConfigSet, RuleEngine, SchedulerOptions, SecurityLimits, Severity, StageResult,
    SysinfoMemoryMonitor, TargetVersion, Violation, ViolationReport,
};

#[derive(Parser)]
#[command(name = "styler", version, about = "Concurrent Java source-code formatter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run rules in validation-only mode; no file is modified.
    Check(RunArgs),
    /// Run rules with writes enabled.
    Format(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// One or more file or directory paths.
    paths: Vec<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long = "include")]
    include: Vec<String>,

    #[arg(long = "exclude")]
    exclude: Vec<String>,

    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    fail_fast: bool,

    #[arg(long)]
    max_violations: Option<usize>,

    #[arg(long, value_enum, default_value = "warn")]
    severity: SeverityArg,

    #[arg(long)]
    json: bool,

    #[arg(long)]
    fail_on_changes: bool,
}

#[derive(Copy, Clone, ValueEnum)]
enum SeverityArg {
    Error,
    Warn,
    Info,
    Debug,
}

impl From<SeverityArg> for Severity {
    fn from(value: SeverityArg) -> Self {
        match value {
            SeverityArg::Error => Severity::Error,
            SeverityArg::Warn => Severity::Warning,
            // The core taxonomy has no `Debug` severity; `--severity debug`
            // is accepted for CLI compatibility and treated as the lowest
            // threshold, same as `info`.
            SeverityArg::Info | SeverityArg::Debug => Severity::Info,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{}: {error:#}", "error".red().bold());
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let (mode, args) = match cli.command {
        Command::Check(args) => (ExecutionMode::Check, args),
        Command::Format(args) => (ExecutionMode::Format, args),
    };

    if args.paths.is_empty() {
        eprintln!("{}: no file or directory paths given", "error".red().bold());
        return Ok(ExitCode::from(3));
    }

    let include = compile_globs(&args.include).context("invalid --include pattern")?;
    let exclude = compile_globs(&args.exclude).context("invalid --exclude pattern")?;
    let security_limits = SecurityLimits::default();

    let mut files = Vec::new();
    for root in &args.paths {
        discover_files(root, &security_limits, &include, &exclude, &mut files)?;
    }

    if args.config.is_some() {
        // Config-file discovery/parsing is an excluded collaborator (spec
        // §1, §10); the demo binary always runs with default rule config.
        eprintln!(
            "{}: --config is accepted but not implemented; running with default configuration",
            "warning".yellow().bold()
        );
    }

    let config = RuleConfigSet::default();
    let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(LineLengthRule)];
    let engine = RuleEngine::new(rules);
    let options = PipelineOptions {
        mode,
        dry_run: args.dry_run,
        target_version: TargetVersion::default(),
    };
    let pipeline = Arc::new(Pipeline::new(engine, config, security_limits, options));
    let scheduler = styler::Scheduler::new(
        pipeline,
        Arc::new(SysinfoMemoryMonitor::default()),
        SchedulerOptions::default(),
    );

    let threshold: Severity = args.severity.into();

    // `fail_fast` is driven at this layer by submitting one file at a time
    // and stopping at the first error; otherwise the whole set goes to the
    // scheduler as a single batch.
    let batch_size = if args.fail_fast { 1 } else { files.len().max(1) };
    let mut had_failure = false;
    let mut per_file_results: Vec<(PathBuf, styler::PerFileResult)> = Vec::new();
    let mut violation_count = 0usize;

    'outer: for chunk in files.chunks(batch_size.max(1)) {
        let (batch_result, chunk_results) = scheduler.run_batch_detailed(chunk.to_vec()).await;
        for error in &batch_result.errors {
            had_failure = true;
            eprintln!(
                "{}: {} [{}] {}",
                "error".red().bold(),
                error.source_path.display(),
                error.stage_name,
                error.message
            );
        }
        for (path, result) in chunk_results {
            if let StageResult::Success(output) = &result {
                violation_count += output.violations.len();
            }
            per_file_results.push((path, result));
        }
        if had_failure && args.fail_fast {
            break 'outer;
        }
        if let Some(max) = args.max_violations {
            if violation_count >= max {
                break 'outer;
            }
        }
    }

    let mut all_violations: Vec<Violation> = Vec::new();
    if args.json {
        for (path, result) in &per_file_results {
            if let StageResult::Success(output) = result {
                let report = ViolationReport::new(path, &output.violations);
                println!("{}", report.to_json()?);
                all_violations.extend(output.violations.iter().cloned());
            }
        }
    } else {
        for (path, result) in &per_file_results {
            if let StageResult::Success(output) = result {
                render_human(path, &output.violations);
                all_violations.extend(output.violations.iter().cloned());
            }
        }
    }

    if had_failure {
        return Ok(ExitCode::from(2));
    }
    if mode == ExecutionMode::Format && !args.fail_on_changes {
        return Ok(ExitCode::from(0));
    }
    if exceeds_severity_threshold(&all_violations, threshold) {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::from(0))
}

fn render_human(path: &Path, violations: &[Violation]) {
    for violation in violations {
        let severity_text = match violation.severity {
            Severity::Error => "ERROR".red().bold(),
            Severity::Warning => "WARNING".yellow().bold(),
            Severity::Info => "INFO".blue().bold(),
        };
        println!(
            "{}:{}:{} {} [{}] {}",
            path.display(),
            violation.range.start.line,
            violation.range.start.column,
            severity_text,
            violation.rule_id,
            violation.message
        );
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| Regex::new(&glob_to_regex(pattern)).context("invalid glob pattern"))
        .collect()
}

/// Translates a small, shell-glob-like subset (`*`, `**`, `?`, literals)
/// into an anchored regex, enough for `--include`/`--exclude` matching
/// against a path's string form.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    out
}

fn discover_files(
    root: &Path,
    limits: &SecurityLimits,
    include: &[Regex],
    exclude: &[Regex],
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let guard = styler::RecursionGuard::new(limits.max_recursion_depth);
    for entry in WalkDir::new(root).into_iter() {
        let entry = entry.context("failed to walk directory")?;
        let depth = entry.depth() as u32;
        guard
            .check(entry.path(), depth)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if styler::check_extension(path, limits).is_ok() {
            let path_text = path.to_string_lossy();
            let included = include.is_empty() || include.iter().any(|re| re.is_match(&path_text));
            let excluded = exclude.iter().any(|re| re.is_match(&path_text));
            if included && !excluded {
                out.push(path.to_path_buf());
            }
        }
    }
    Ok(())
}
