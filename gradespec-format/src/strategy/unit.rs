use std::path::PathBuf;

use anyhow::Context;

use gradespec_exec::{ProcessCommand, ProcessResult, ProgramCommand};
use gradespec_lang::{BuildMode, Driver, DriverKind};

use crate::spec::TestRecord;
use crate::strategy::{compile_step, exit_verdict, run_step, StrategyContext, StrategyResult, Stop};

/// Generate the driver of the record inside the scratch directory and build it. Returns the
/// executable and the compiler output.
pub(super) fn build_driver(
    record: &TestRecord,
    kind: DriverKind,
    code: &[String],
    ctx: &StrategyContext,
) -> Result<(PathBuf, String), Stop> {
    let toolchain = &ctx.config.toolchain;
    let driver = Driver {
        kind,
        target: &record.header.target,
        includes: &record.header.include,
        harness_header: &toolchain.harness_header,
        body: code,
    };
    let source = ctx
        .scratch
        .write(format!("{}.cpp", kind.file_stem()), driver.render())
        .context("Failed to write the driver")?;
    let binary = ctx.scratch.join(kind.file_stem());
    let build = toolchain.build_executable(
        BuildMode::Plain,
        &[source],
        &binary,
        &ctx.include_dirs(),
        ctx.scratch.path(),
    );
    let compile_output = compile_step(ctx, &build)?;
    Ok((binary, compile_output))
}

/// Run a built driver under the timeout of the record.
pub(super) fn run_driver(
    record: &TestRecord,
    binary: PathBuf,
    compile_output: &str,
    ctx: &StrategyContext,
) -> Result<ProcessResult, Stop> {
    let mut command = ProcessCommand::new(
        format!("Driver of test {}", record.header.number),
        ProgramCommand::local(binary),
    );
    command.cwd(ctx.scratch.path());
    run_step(ctx, &command, record.header.timeout(), compile_output)
}

/// Wrap the assertions in a driver, build it and run it. Passes iff the driver exits with zero.
pub(super) fn evaluate(record: &TestRecord, code: &[String], ctx: &StrategyContext) -> StrategyResult {
    let (binary, compile_output) = build_driver(record, DriverKind::Unit, code, ctx)?;
    let result = run_driver(record, binary, &compile_output, ctx)?;
    Ok(exit_verdict(&compile_output, &result))
}
