use anyhow::Context;

use gradespec_exec::{ProcessCommand, ProgramCommand};

use crate::spec::TestRecord;
use crate::strategy::{exit_verdict, join_outputs, run_step, StrategyContext, StrategyResult};

/// The variable with the path of the scratch directory of the record.
pub const SCRATCH_ENV: &str = "GRADESPEC_SCRATCH";
/// A file that the script can write in the scratch directory to add notes to the output.
const DEBUG_FILE: &str = "DEBUG";

/// Run a script with the configured interpreter, from the working directory. Passes iff it exits
/// with zero.
pub(super) fn evaluate(
    record: &TestRecord,
    path: &str,
    args: &[String],
    ctx: &StrategyContext,
) -> StrategyResult {
    let mut command = ProcessCommand::new(
        format!("Script {}", path),
        ProgramCommand::system(&ctx.config.script_interpreter),
    );
    command
        .arg(path)
        .args(args.iter().cloned())
        .cwd(ctx.workdir)
        .env(SCRATCH_ENV, ctx.scratch.path().to_string_lossy());
    let result = run_step(ctx, &command, record.header.timeout(), "")?;
    let mut outcome = exit_verdict("", &result);

    let debug = ctx.scratch.join(DEBUG_FILE);
    if debug.exists() {
        let notes = std::fs::read_to_string(&debug)
            .with_context(|| format!("Cannot read {}", debug.display()))?;
        outcome.output = join_outputs(&[std::mem::take(&mut outcome.output), format!("Debug:\n{}", notes)]);
    }
    Ok(outcome)
}
