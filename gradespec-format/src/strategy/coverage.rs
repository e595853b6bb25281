use std::path::PathBuf;

use gradespec_exec::{ProcessCommand, ProgramCommand};
use gradespec_lang::{coverage_of, object_name, parse_gcov_output, BuildMode};

use crate::score::{TestOutcome, TestStatus};
use crate::spec::TestRecord;
use crate::strategy::{
    combined_output, compile_step, crash_message, join_outputs, run_step, StrategyContext,
    StrategyResult, Stop,
};

/// Build the driver and the sources with the coverage instrumentation, run the driver and measure
/// with `gcov` how many lines of the target it executed. Passes iff they are at least the
/// configured threshold.
pub(super) fn evaluate(
    record: &TestRecord,
    main: &str,
    sources: &[String],
    ctx: &StrategyContext,
) -> StrategyResult {
    let toolchain = &ctx.config.toolchain;
    let include_dirs = ctx.include_dirs();
    let inputs: Vec<PathBuf> = std::iter::once(main)
        .chain(sources.iter().map(String::as_str))
        .map(|s| ctx.source(s))
        .collect();

    let compile = toolchain.compile_objects(BuildMode::Coverage, &inputs, &include_dirs, ctx.scratch.path());
    let mut compile_output = compile_step(ctx, &compile)?;
    let objects: Vec<PathBuf> = inputs.iter().map(|i| ctx.scratch.join(object_name(i))).collect();
    let binary = ctx.scratch.join("coverage_test");
    let link = toolchain.build_executable(
        BuildMode::Coverage,
        &objects,
        &binary,
        &include_dirs,
        ctx.scratch.path(),
    );
    let link_output = compile_step(ctx, &link)?;
    compile_output = join_outputs(&[compile_output, link_output]);

    let mut command = ProcessCommand::new("Coverage driver", ProgramCommand::local(&binary));
    command.cwd(ctx.scratch.path());
    let run = run_step(ctx, &command, record.header.timeout(), &compile_output)?;
    let mut run_output = combined_output(&run);
    if let Some(crash) = run.status().and_then(crash_message) {
        run_output = join_outputs(&[run_output, crash]);
    }

    let target = ctx.source(&record.header.target);
    let gcov = toolchain.gcov_command(&target, ctx.scratch.path());
    let report = run_step(ctx, &gcov, ctx.compile_timeout(), "")?;
    if !report.is_success() {
        return Err(Stop::Outcome(TestOutcome::error(format!(
            "gcov failed: {}",
            combined_output(&report)
        ))));
    }
    let reports = parse_gcov_output(&report.stdout_lossy());
    let threshold = ctx.config.coverage_threshold;
    let (status, summary) = match coverage_of(&reports, &target) {
        Some(coverage) => {
            let status = if coverage.percent >= threshold {
                TestStatus::Pass
            } else {
                TestStatus::Fail
            };
            (
                status,
                format!(
                    "Lines executed: {:.2}% of {} (required {:.2}%)",
                    coverage.percent, coverage.lines, threshold
                ),
            )
        }
        None => (
            TestStatus::Fail,
            format!("No coverage data for {}", record.header.target),
        ),
    };
    let mut outcome = TestOutcome::new(status, join_outputs(&[compile_output, run_output, summary]));
    outcome.elapsed = run.elapsed();
    Ok(outcome)
}
