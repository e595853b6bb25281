use std::path::{Path, PathBuf};

use anyhow::Context;

use gradespec_exec::{ProcessCommand, ProgramCommand, TRUNCATION_MARKER};
use gradespec_lang::BuildMode;

use crate::score::{TestOutcome, TestStatus};
use crate::spec::TestRecord;
use crate::strategy::{compile_step, crash_message, run_step, StrategyContext, StrategyResult};

/// Whether an `@include` of an i/o check is a file to compile with the target.
fn is_compilation_unit(include: &str) -> bool {
    if include.starts_with('<') {
        return false;
    }
    let extension = Path::new(include.trim_matches('"'))
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    !matches!(extension.as_deref(), Some("h" | "hh" | "hpp" | "hxx"))
}

/// Build the target, feed it the input file and compare what it prints with the expected output.
pub(super) fn evaluate(
    record: &TestRecord,
    input: &str,
    output: &str,
    ctx: &StrategyContext,
) -> StrategyResult {
    let input_path = ctx.source(input);
    let input_data = std::fs::read(&input_path)
        .with_context(|| format!("Cannot read the input file {}", input_path.display()))?;
    let output_path = ctx.source(output);
    let expected = std::fs::read(&output_path)
        .with_context(|| format!("Cannot read the expected output {}", output_path.display()))?;

    let sources: Vec<PathBuf> = std::iter::once(record.header.target.as_str())
        .chain(
            record
                .header
                .include
                .iter()
                .map(String::as_str)
                .filter(|i| is_compilation_unit(i)),
        )
        .map(|s| ctx.source(s.trim_matches('"')))
        .collect();
    let binary = ctx.scratch.join("io_test");
    let build = ctx.config.toolchain.build_executable(
        BuildMode::Plain,
        &sources,
        &binary,
        &ctx.include_dirs(),
        ctx.scratch.path(),
    );
    let compile_output = compile_step(ctx, &build)?;

    let mut command = ProcessCommand::new(
        format!("Program of test {}", record.header.number),
        ProgramCommand::local(&binary),
    );
    command.cwd(ctx.scratch.path()).stdin(input_data.clone());
    let result = run_step(ctx, &command, record.header.timeout(), &compile_output)?;

    // The exit status is only reported, the verdict depends on the output alone.
    let truncated = result.stdout().ends_with(TRUNCATION_MARKER.as_bytes());
    let matches = !truncated && ctx.config.io_comparison.matches(result.stdout(), &expected);
    let mut message = format!(
        "The input:\n{}\n\nYour output:\n{}\n\nExpected output:\n{}\n\n",
        String::from_utf8_lossy(&input_data).trim_end(),
        result.stdout_lossy(),
        String::from_utf8_lossy(&expected),
    );
    let stderr = result.stderr_lossy();
    if !stderr.trim().is_empty() {
        message += &format!("Standard error:\n{}\n\n", stderr.trim_end());
    }
    if truncated {
        message += &format!(
            "Your output exceeded the limit of {} bytes\n",
            ctx.config.output_limit
        );
    }
    if let Some(crash) = result.status().and_then(crash_message) {
        message += &crash;
        message += "\n";
    }
    if !compile_output.is_empty() {
        message = format!("{}\n\n{}", compile_output, message);
    }
    let status = if matches { TestStatus::Pass } else { TestStatus::Fail };
    let mut outcome = TestOutcome::new(status, message);
    outcome.elapsed = result.elapsed();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use gradespec_exec::FakeProcessRunner;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::IoComparison;
    use crate::spec::TestKind;
    use crate::strategy::dispatch;
    use crate::strategy::test_utils::*;

    const BODY: &[&str] = &["input: in.txt", "output: out.txt"];

    fn echo_runner(output: &'static str) -> FakeProcessRunner {
        FakeProcessRunner::new(move |command, _| {
            if is_compiler(command) {
                completed(0, "", "")
            } else {
                completed(0, output, "")
            }
        })
    }

    fn fixture() -> Fixture {
        let fixture = Fixture::new();
        fixture.write("in.txt", "1 2\n");
        fixture.write("out.txt", "3\n");
        fixture
    }

    #[test]
    fn test_exact_match() {
        let fixture = fixture();
        let runner = echo_runner("3\n");
        let outcome = dispatch(&record(TestKind::Io, BODY), &fixture.context(&runner));
        assert_eq!(outcome.status, TestStatus::Pass);
        assert_eq!(
            outcome.output,
            "The input:\n1 2\n\nYour output:\n3\n\n\nExpected output:\n3\n\n\n"
        );
        let commands = runner.commands();
        assert_eq!(commands[1].stdin.as_deref(), Some(&b"1 2\n"[..]));
    }

    #[test]
    fn test_exit_status_does_not_matter() {
        let fixture = fixture();
        let runner = FakeProcessRunner::new(|command, _| {
            if is_compiler(command) {
                completed(0, "", "")
            } else {
                completed(3, "3\n", "")
            }
        });
        let outcome = dispatch(&record(TestKind::Io, BODY), &fixture.context(&runner));
        assert_eq!(outcome.status, TestStatus::Pass);
        assert!(outcome.output.ends_with("Program exited with status 3 (crashed?)\n"));
    }

    #[test]
    fn test_truncated_output_never_matches() {
        let fixture = fixture();
        fixture.write("out.txt", "3\n[output truncated]\n");
        let runner = echo_runner("3\n[output truncated]\n");
        let outcome = dispatch(&record(TestKind::Io, BODY), &fixture.context(&runner));
        assert_eq!(outcome.status, TestStatus::Fail);
        assert!(outcome.output.contains("Your output exceeded the limit of 1048576 bytes\n"));
    }

    #[test]
    fn test_trailing_whitespace() {
        let mut fixture = fixture();
        let runner = echo_runner("3  \r\n\n");
        let outcome = dispatch(&record(TestKind::Io, BODY), &fixture.context(&runner));
        assert_eq!(outcome.status, TestStatus::Fail);

        fixture.config.io_comparison = IoComparison::TrimTrailingWhitespace;
        let outcome = dispatch(&record(TestKind::Io, BODY), &fixture.context(&runner));
        assert_eq!(outcome.status, TestStatus::Pass);
    }

    #[test]
    fn test_include_sources_are_compiled() {
        let fixture = fixture();
        let runner = echo_runner("3\n");
        let mut record = record(TestKind::Io, BODY);
        record.header.include = vec!["helpers.cpp".into(), "helpers.h".into(), "<vector>".into()];
        dispatch(&record, &fixture.context(&runner));
        let build = &runner.commands()[0];
        let helpers = fixture.path().join("helpers.cpp").to_string_lossy().into_owned();
        assert!(build.args.contains(&helpers));
        assert!(!build.args.iter().any(|a| a.ends_with("helpers.h") || a.contains("vector")));
    }

    #[test]
    fn test_missing_input_is_error() {
        let fixture = Fixture::new();
        let runner = echo_runner("3\n");
        let outcome = dispatch(&record(TestKind::Io, BODY), &fixture.context(&runner));
        assert_eq!(outcome.status, TestStatus::Error);
        assert!(outcome.output.starts_with("Cannot read the input file"));
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_is_compilation_unit() {
        assert!(is_compilation_unit("list.cpp"));
        assert!(is_compilation_unit("\"list.cpp\""));
        assert!(!is_compilation_unit("list.hpp"));
        assert!(!is_compilation_unit("<vector>"));
    }
}
