use std::time::{Duration, Instant};

use speculoos::prelude::*;

use gradespec_exec::*;

fn sh(script: &str) -> ProcessCommand {
    let mut command = ProcessCommand::new("shell", ProgramCommand::system("sh"));
    command.arg("-c").arg(script);
    command
}

#[test]
fn test_exit_code_and_outputs() {
    let runner = LocalProcessRunner::default();
    let result = runner.run(&sh("echo out; echo err >&2; exit 3"), Duration::from_secs(10));
    assert_that!(result.status()).is_equal_to(Some(&ProcessStatus::Exited(3)));
    assert_that!(result.stdout_lossy()).is_equal_to("out\n".to_string());
    assert_that!(result.stderr_lossy()).is_equal_to("err\n".to_string());
    assert!(!result.is_success());
}

#[test]
fn test_stdin_is_fed() {
    let runner = LocalProcessRunner::default();
    let mut command = sh("cat");
    command.stdin("10 20\n");
    let result = runner.run(&command, Duration::from_secs(10));
    assert!(result.is_success());
    assert_that!(result.stdout_lossy()).is_equal_to("10 20\n".to_string());
}

#[test]
fn test_no_stdin_is_dev_null() {
    let runner = LocalProcessRunner::default();
    let result = runner.run(&sh("cat"), Duration::from_secs(10));
    assert!(result.is_success());
    assert!(result.stdout().is_empty());
}

#[test]
fn test_env_and_cwd() {
    let dir = tempfile::tempdir().unwrap();
    let runner = LocalProcessRunner::default();
    let mut command = sh("echo $GREETING; pwd");
    command.env("GREETING", "hello").cwd(dir.path());
    let result = runner.run(&command, Duration::from_secs(10));
    let stdout = result.stdout_lossy();
    let mut lines = stdout.lines();
    assert_that!(lines.next()).is_equal_to(Some("hello"));
    let pwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
    assert_that!(pwd).is_equal_to(std::fs::canonicalize(dir.path()).unwrap());
}

#[test]
fn test_timeout_kills_the_group() {
    let runner = LocalProcessRunner::default();
    let start = Instant::now();
    // The background sleep keeps the pipes open unless the whole group is killed.
    let result = runner.run(&sh("sleep 30 & echo started; sleep 30"), Duration::from_millis(500));
    assert!(result.is_timeout());
    assert_that!(result.stdout_lossy()).is_equal_to("started\n".to_string());
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(result.elapsed() >= Duration::from_millis(500));
}

#[test]
fn test_leftover_processes_are_killed_on_exit() {
    let runner = LocalProcessRunner::default();
    let start = Instant::now();
    let result = runner.run(&sh("sleep 30 & echo done; exit 4"), Duration::from_secs(20));
    assert_that!(result.status()).is_equal_to(Some(&ProcessStatus::Exited(4)));
    assert_that!(result.stdout_lossy()).is_equal_to("done\n".to_string());
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_killed_by_signal() {
    let runner = LocalProcessRunner::default();
    let result = runner.run(&sh("kill -SEGV $$"), Duration::from_secs(10));
    assert_that!(result.status())
        .is_equal_to(Some(&ProcessStatus::Signaled(11, "SIGSEGV".to_string())));
}

#[test]
fn test_failed_to_start() {
    let runner = LocalProcessRunner::default();
    let command = ProcessCommand::new(
        "missing",
        ProgramCommand::local("/this/path/does/not/exist"),
    );
    let result = runner.run(&command, Duration::from_secs(10));
    assert!(matches!(result, ProcessResult::FailedToStart { .. }));
}

#[test]
fn test_output_limit() {
    let runner = LocalProcessRunner::new(10);
    let result = runner.run(&sh("yes | head -c 1000"), Duration::from_secs(10));
    let stdout = result.stdout_lossy();
    assert!(stdout.ends_with(TRUNCATION_MARKER));
    assert_that!(stdout.len()).is_equal_to(10 + TRUNCATION_MARKER.len());
}

#[test]
fn test_timeouts_are_isolated() {
    let runner = LocalProcessRunner::default();
    let pool = WorkerPool::new(2);
    let mut results = vec![];
    pool.run(
        vec![
            ("slow", "sleep 30", Duration::from_secs(1)),
            ("fast", "echo ok", Duration::from_secs(30)),
        ],
        |(name, script, deadline)| (name, runner.run(&sh(script), deadline)),
        |r| results.push(r),
    )
    .unwrap();
    results.sort_by_key(|(name, _)| *name);
    assert!(results[0].1.is_success());
    assert!(results[1].1.is_timeout());
}
