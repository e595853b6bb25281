//! The execution strategies, one per type of check.
//!
//! [`dispatch`](fn.dispatch.html) decodes the body of a record and runs the strategy of its type.
//! Every strategy works inside the scratch directory of the record and spawns its processes
//! through the [`ProcessRunner`] of the context, so it can be tested without a compiler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Error;

use gradespec_exec::{ProcessCommand, ProcessResult, ProcessRunner, ProcessStatus, Scratch};

use crate::config::GraderConfig;
use crate::score::{TestOutcome, TestStatus};
use crate::spec::{seconds, Payload, TestRecord};

mod approved_includes;
mod compile;
mod coverage;
mod io;
mod memory_errors;
mod performance;
mod script;
mod unit;

pub use script::SCRATCH_ENV;

/// Output of a run killed at its deadline.
pub const TIMEOUT_MESSAGE: &str = "Timeout during test execution, check for an infinite loop\n";
/// Output of a compilation killed at its deadline.
pub const COMPILE_TIMEOUT_MESSAGE: &str = "Timeout during compilation\n";

/// What a strategy can use.
pub struct StrategyContext<'a> {
    /// The directory with the sources of the submission.
    pub workdir: &'a Path,
    pub config: &'a GraderConfig,
    pub runner: &'a dyn ProcessRunner,
    /// The private directory of the record.
    pub scratch: &'a Scratch,
}

impl StrategyContext<'_> {
    /// Resolve a path of the specification against the working directory.
    fn source(&self, path: &str) -> PathBuf {
        self.workdir.join(path)
    }

    fn compile_timeout(&self) -> Duration {
        seconds(self.config.timeouts.compile_step)
    }

    fn include_dirs(&self) -> Vec<PathBuf> {
        self.config.toolchain.include_dirs(self.workdir)
    }
}

/// Why a strategy stopped before reaching its verdict.
#[derive(Debug)]
enum Stop {
    /// The check already has its final outcome, like a failed compilation.
    Outcome(TestOutcome),
    /// Something unexpected went wrong, the check is in error.
    Error(Error),
}

impl From<Error> for Stop {
    fn from(e: Error) -> Self {
        Stop::Error(e)
    }
}

type StrategyResult = Result<TestOutcome, Stop>;

/// Run the check of the record, returning its outcome.
///
/// A body that cannot be decoded, or a failure of the grader itself, makes the outcome an error.
pub fn dispatch(record: &TestRecord, ctx: &StrategyContext) -> TestOutcome {
    let payload = match Payload::decode(record) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Test {} has an invalid body: {}", record.header.number, e);
            return TestOutcome::error(e.to_string());
        }
    };
    debug!(
        "Dispatching test {} ({}) to the {} strategy",
        record.header.number, record.header.name, record.kind
    );
    let result = match payload {
        Payload::ApprovedIncludes { allowed } => approved_includes::evaluate(record, &allowed, ctx),
        Payload::Script { path, args } => script::evaluate(record, &path, &args, ctx),
        Payload::Compile { sources } => compile::evaluate(record, &sources, ctx),
        Payload::MemoryErrors { sources } => memory_errors::evaluate(record, &sources, ctx),
        Payload::Coverage { main, sources } => coverage::evaluate(record, &main, &sources, ctx),
        Payload::Unit { code } => unit::evaluate(record, &code, ctx),
        Payload::Io { input, output } => io::evaluate(record, &input, &output, ctx),
        Payload::Performance { code } => performance::evaluate(record, &code, ctx),
    };
    match result {
        Ok(outcome) | Err(Stop::Outcome(outcome)) => outcome,
        Err(Stop::Error(e)) => {
            warn!("Test {} failed to run: {:?}", record.header.number, e);
            TestOutcome::error(format!("{:#}", e))
        }
    }
}

/// The note appended to the output of a program that crashed, if it did.
pub fn crash_message(status: &ProcessStatus) -> Option<String> {
    match status {
        ProcessStatus::Signaled(8, _) => Some("Floating point exception (core dumped)".into()),
        ProcessStatus::Signaled(11, _) => Some("Segmentation fault (core dumped)".into()),
        ProcessStatus::Signaled(signal, _) => {
            Some(format!("Program exited with status -{} (crashed?)", signal))
        }
        ProcessStatus::Exited(code) if *code > 1 || *code < 0 => {
            Some(format!("Program exited with status {} (crashed?)", code))
        }
        ProcessStatus::Exited(_) => None,
    }
}

/// Join the non-empty pieces of output, trimmed, with a blank line between them.
fn join_outputs<S: AsRef<str>>(pieces: &[S]) -> String {
    pieces
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Both output streams of a process, standard output first.
fn combined_output(result: &ProcessResult) -> String {
    join_outputs(&[result.stdout_lossy(), result.stderr_lossy()])
}

/// Run a compiler invocation, under the compilation deadline. On success returns what the
/// compiler printed.
fn compile_step(ctx: &StrategyContext, command: &ProcessCommand) -> Result<String, Stop> {
    trace!("{}: {}", command.description, command.command_line());
    let result = ctx.runner.run(command, ctx.compile_timeout());
    match &result {
        ProcessResult::FailedToStart { error } => Err(Stop::Outcome(TestOutcome::error(format!(
            "{} failed to start: {}",
            command.description, error
        )))),
        ProcessResult::TimedOut { .. } => {
            let mut outcome = TestOutcome::new(
                TestStatus::Timeout,
                join_outputs(&[COMPILE_TIMEOUT_MESSAGE.to_string(), combined_output(&result)]),
            );
            outcome.compile_failed = true;
            Err(Stop::Outcome(outcome))
        }
        ProcessResult::Completed { .. } if result.is_success() => Ok(combined_output(&result)),
        ProcessResult::Completed { .. } => {
            debug!("{} failed", command.description);
            let mut outcome = TestOutcome::new(TestStatus::Fail, combined_output(&result));
            outcome.compile_failed = true;
            Err(Stop::Outcome(outcome))
        }
    }
}

/// Run the program of the check under the deadline of the record. A timeout stops the check, with
/// the message and whatever the program printed before being killed.
fn run_step(
    ctx: &StrategyContext,
    command: &ProcessCommand,
    timeout: Duration,
    previous_output: &str,
) -> Result<ProcessResult, Stop> {
    trace!("{}: {}", command.description, command.command_line());
    let result = ctx.runner.run(command, timeout);
    match &result {
        ProcessResult::FailedToStart { error } => Err(Stop::Outcome(TestOutcome::error(format!(
            "{} failed to start: {}",
            command.description, error
        )))),
        ProcessResult::TimedOut { elapsed, .. } => {
            debug!("{} timed out after {:?}", command.description, elapsed);
            let mut outcome = TestOutcome::new(
                TestStatus::Timeout,
                join_outputs(&[
                    previous_output.to_string(),
                    combined_output(&result),
                    TIMEOUT_MESSAGE.to_string(),
                ]),
            );
            outcome.elapsed = *elapsed;
            Err(Stop::Outcome(outcome))
        }
        ProcessResult::Completed { .. } => Ok(result),
    }
}

/// The verdict on a program that ran to completion: pass iff it exited with zero. The output has
/// the compiler output, the program output and the crash note, if any.
fn exit_verdict(compile_output: &str, result: &ProcessResult) -> TestOutcome {
    let mut pieces = vec![compile_output.to_string(), combined_output(result)];
    if let Some(status) = result.status() {
        pieces.extend(crash_message(status));
    }
    let status = if result.is_success() {
        TestStatus::Pass
    } else {
        TestStatus::Fail
    };
    let mut outcome = TestOutcome::new(status, join_outputs(&pieces));
    outcome.elapsed = result.elapsed();
    outcome
}
