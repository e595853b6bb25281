use std::path::PathBuf;

use gradespec_exec::ProcessResult;
use gradespec_lang::BuildMode;

use crate::score::{TestOutcome, TestStatus};
use crate::spec::TestRecord;
use crate::strategy::{combined_output, StrategyContext, StrategyResult, COMPILE_TIMEOUT_MESSAGE};

/// Compile the sources to objects with the warnings enabled. Passes iff the compiler succeeds
/// without printing anything. The whole build is bound by the timeout of the record.
pub(super) fn evaluate(record: &TestRecord, sources: &[String], ctx: &StrategyContext) -> StrategyResult {
    let sources: Vec<PathBuf> = sources.iter().map(|s| ctx.source(s)).collect();
    let command = ctx.config.toolchain.compile_objects(
        BuildMode::Strict,
        &sources,
        &ctx.include_dirs(),
        ctx.scratch.path(),
    );
    trace!("{}: {}", command.description, command.command_line());
    let result = ctx.runner.run(&command, record.header.timeout());
    let output = combined_output(&result);
    let mut outcome = match &result {
        ProcessResult::FailedToStart { error } => {
            return Ok(TestOutcome::error(format!(
                "{} failed to start: {}",
                command.description, error
            )))
        }
        ProcessResult::TimedOut { .. } => {
            let mut outcome = TestOutcome::new(TestStatus::Timeout, COMPILE_TIMEOUT_MESSAGE.trim());
            outcome.compile_failed = true;
            outcome
        }
        ProcessResult::Completed { .. } if result.is_success() && output.is_empty() => {
            TestOutcome::new(TestStatus::Pass, "Compiled without warnings")
        }
        ProcessResult::Completed { .. } => {
            let mut outcome = TestOutcome::new(TestStatus::Fail, output);
            outcome.compile_failed = !result.is_success();
            outcome
        }
    };
    outcome.elapsed = result.elapsed();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use gradespec_exec::FakeProcessRunner;
    use pretty_assertions::assert_eq;

    use crate::score::TestStatus;
    use crate::spec::TestKind;
    use crate::strategy::dispatch;
    use crate::strategy::test_utils::*;

    #[test]
    fn test_clean_compile() {
        let fixture = Fixture::new();
        let runner = FakeProcessRunner::new(|_, _| completed(0, "", ""));
        let outcome = dispatch(&record(TestKind::Compile, &["a.cpp b.cpp"]), &fixture.context(&runner));
        assert_eq!(outcome.status, TestStatus::Pass);
        let commands = runner.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].args.contains(&"-Wall".to_string()));
        assert!(commands[0].args.contains(&"-c".to_string()));
        let a = fixture.path().join("a.cpp").to_string_lossy().into_owned();
        assert!(commands[0].args.contains(&a));
        assert_eq!(commands[0].cwd.as_deref(), Some(fixture.scratch.path()));
    }

    #[test]
    fn test_warnings_fail() {
        let fixture = Fixture::new();
        let runner = FakeProcessRunner::new(|_, _| completed(0, "", "code.cpp:3: warning: unused variable 'x'"));
        let outcome = dispatch(&record(TestKind::Compile, &[]), &fixture.context(&runner));
        assert_eq!(outcome.status, TestStatus::Fail);
        assert!(!outcome.compile_failed);
        assert_eq!(outcome.output, "code.cpp:3: warning: unused variable 'x'");
    }

    #[test]
    fn test_errors_fail() {
        let fixture = Fixture::new();
        let runner = FakeProcessRunner::new(|_, _| completed(1, "", "code.cpp:3: error: expected ';'"));
        let outcome = dispatch(&record(TestKind::Compile, &[]), &fixture.context(&runner));
        assert_eq!(outcome.status, TestStatus::Fail);
        assert!(outcome.compile_failed);
    }

    #[test]
    fn test_record_timeout_bounds_the_build() {
        let fixture = Fixture::new();
        let runner = FakeProcessRunner::new(|_, deadline| {
            assert_eq!(deadline, std::time::Duration::from_secs(5));
            timed_out()
        });
        let outcome = dispatch(&record(TestKind::Compile, &[]), &fixture.context(&runner));
        assert_eq!(outcome.status, TestStatus::Timeout);
    }
}
