use gradespec_lang::DriverKind;

use crate::spec::TestRecord;
use crate::strategy::unit::{build_driver, run_driver};
use crate::strategy::{exit_verdict, join_outputs, StrategyContext, StrategyResult};

/// Like a unit check, with a driver that times its body. The time is reported, the verdict only
/// depends on the exit code and on the timeout.
pub(super) fn evaluate(record: &TestRecord, code: &[String], ctx: &StrategyContext) -> StrategyResult {
    let (binary, compile_output) = build_driver(record, DriverKind::Performance, code, ctx)?;
    let result = run_driver(record, binary, &compile_output, ctx)?;
    let mut outcome = exit_verdict(&compile_output, &result);
    let elapsed = format!("Elapsed: {:.3}s", result.elapsed().as_secs_f64());
    outcome.output = join_outputs(&[std::mem::take(&mut outcome.output), elapsed]);
    Ok(outcome)
}
