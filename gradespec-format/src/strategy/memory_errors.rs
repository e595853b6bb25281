use std::path::PathBuf;

use gradespec_exec::{ProcessCommand, ProgramCommand};
use gradespec_lang::BuildMode;

use crate::score::TestStatus;
use crate::spec::TestRecord;
use crate::strategy::{compile_step, exit_verdict, run_step, StrategyContext, StrategyResult};

/// Markers of the reports printed by the sanitizer runtimes.
const SANITIZER_REPORTS: &[&str] = &[
    "ERROR: AddressSanitizer",
    "ERROR: LeakSanitizer",
    "runtime error:",
];

/// Whether the standard error contains a sanitizer report.
fn has_sanitizer_report(stderr: &str) -> bool {
    SANITIZER_REPORTS.iter().any(|marker| stderr.contains(marker))
}

/// Build the sources with the sanitizers and run them. Passes iff the program exits with zero and
/// no sanitizer complains.
pub(super) fn evaluate(record: &TestRecord, sources: &[String], ctx: &StrategyContext) -> StrategyResult {
    let sources: Vec<PathBuf> = sources.iter().map(|s| ctx.source(s)).collect();
    let binary = ctx.scratch.join("memory_test");
    let build = ctx.config.toolchain.build_executable(
        BuildMode::Sanitized,
        &sources,
        &binary,
        &ctx.include_dirs(),
        ctx.scratch.path(),
    );
    let compile_output = compile_step(ctx, &build)?;

    let mut command = ProcessCommand::new("Memory test", ProgramCommand::local(&binary));
    command
        .cwd(ctx.scratch.path())
        .env("ASAN_OPTIONS", "detect_leaks=1")
        .env("UBSAN_OPTIONS", "print_stacktrace=1");
    let result = run_step(ctx, &command, record.header.timeout(), &compile_output)?;

    let mut outcome = exit_verdict(&compile_output, &result);
    if outcome.status == TestStatus::Pass && has_sanitizer_report(&result.stderr_lossy()) {
        debug!("Test {} passed but the sanitizers reported errors", record.header.number);
        outcome.status = TestStatus::Fail;
    }
    Ok(outcome)
}
