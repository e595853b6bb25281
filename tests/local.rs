use std::process::Command;

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use speculoos::prelude::*;

use gradespec::local::{absolute_workdir, load_config, run};
use gradespec_format::results::HIDDEN_OUTPUT;
use gradespec_format::{GradescopeResults, IoComparison};

mod common;
use common::*;

fn read_results(submission: &Submission) -> GradescopeResults {
    let content = std::fs::read_to_string(submission.path("out/results.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn scripts_submission() -> Submission {
    let submission = Submission::new();
    let spec = block("2", "script", "3", "@show_output: true\n", "fail.sh")
        + &block("1", "script", "2", "", "pass.sh")
        + &block("3", "script", "4", "@skip: true\n", "pass.sh");
    submission
        .write("tests_code.cpp", &spec)
        .write("code.cpp", "int foo() { return 1; }\n")
        .write("pass.sh", "echo fine\n")
        .write("fail.sh", "echo broken\nexit 1\n");
    submission
}

#[test]
fn test_run_writes_results() {
    if !has_bash() {
        return;
    }
    let submission = scripts_submission();
    let results = path_str(&submission.path("out/results.json"));
    run(submission.opt(&["--results", &results])).unwrap();

    let results = read_results(&submission);
    assert_abs_diff_eq!(results.score, 2.0);
    let numbers: Vec<_> = results.tests.iter().map(|t| t.number.as_str()).collect();
    assert_eq!(numbers, vec!["1", "2", "3"]);
    assert_eq!(results.tests[0].status, "passed");
    assert_eq!(results.tests[0].output, HIDDEN_OUTPUT);
    assert_eq!(results.tests[1].status, "failed");
    assert_eq!(results.tests[1].output, "broken");
    assert_abs_diff_eq!(results.tests[2].score, 0.0);
}

#[test]
fn test_run_keeps_best_previous_score() {
    if !has_bash() {
        return;
    }
    let submission = scripts_submission();
    submission.write(
        "metadata.json",
        r#"{"previous_submissions": [{"score": 4.0}, {"score": "1.5"}]}"#,
    );
    let results = path_str(&submission.path("out/results.json"));
    let metadata = path_str(&submission.path("metadata.json"));
    run(submission.opt(&["--results", &results, "--submission-metadata", &metadata])).unwrap();

    let results = read_results(&submission);
    assert_abs_diff_eq!(results.score, 4.0);
    assert_that!(results.output).contains("maximum submission score of 4.0");
}

#[test]
fn test_run_with_filter() {
    if !has_bash() {
        return;
    }
    let submission = scripts_submission();
    let results = path_str(&submission.path("out/results.json"));
    run(submission.opt(&["--results", &results, "--filter", "1"])).unwrap();

    let results = read_results(&submission);
    assert_eq!(results.tests.len(), 1);
    assert_abs_diff_eq!(results.score, 2.0);
}

#[test]
fn test_missing_specification() {
    let submission = Submission::new();
    let error = run(submission.opt(&[])).unwrap_err();
    assert_that!(format!("{:#}", error)).contains("Cannot read the specification");
}

#[test]
fn test_config_from_workdir() {
    let submission = Submission::new();
    assert_eq!(load_config(&submission.opt(&[])).unwrap().io_comparison, IoComparison::Exact);
    submission.write(
        "gradespec.yaml",
        "io_comparison: trim_trailing_whitespace\ntimeouts:\n  unit: 2\n",
    );
    let config = load_config(&submission.opt(&[])).unwrap();
    assert_eq!(config.io_comparison, IoComparison::TrimTrailingWhitespace);
    assert_abs_diff_eq!(config.timeouts.unit, 2.0);
    assert_abs_diff_eq!(config.timeouts.io, 10.0);

    submission.write("broken.yaml", "timeouts: [1, 2]\n");
    let broken = path_str(&submission.path("broken.yaml"));
    assert!(load_config(&submission.opt(&["--config", &broken])).is_err());
}

#[test]
fn test_dump() {
    let submission = Submission::new();
    let spec = "/*\n@number: 7\n@name: includes\n@points: 1\n@type: approved_includes\n@target: code.cpp\n*/\n<test>\n  iostream   vector\n</test>\n";
    submission.write("tests_code.cpp", spec);
    let output = Command::new(env!("CARGO_BIN_EXE_gradespec"))
        .arg("--dump")
        .arg(submission.path("tests_code.cpp"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_that!(stdout).starts_with("/*\n@number: 7\n@name: includes\n");
    assert_that!(stdout).contains("@type: approved_includes\n");
    assert_that!(stdout).contains("@show_output: true\n");
}

#[test]
fn test_exit_code_on_error() {
    let submission = Submission::new();
    let output = Command::new(env!("CARGO_BIN_EXE_gradespec"))
        .arg(submission.path("missing.cpp"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_that!(stderr).starts_with("Error: Cannot read the specification");
}

#[test]
fn test_workdir_is_absolute() {
    let submission = Submission::new();
    let mut opt = submission.opt(&[]);
    opt.workdir = ".".into();
    let workdir = absolute_workdir(&opt).unwrap();
    assert!(workdir.is_absolute());
    assert_eq!(workdir, std::env::current_dir().unwrap().canonicalize().unwrap());

    opt.workdir = submission.path("missing");
    assert!(absolute_workdir(&opt).is_err());
}

#[test]
fn test_default_workdir_with_compiler() {
    if which::which("g++").is_err() {
        eprintln!("g++ is not installed, skipping");
        return;
    }
    let submission = Submission::new();
    let spec = "/*\n@number: 1\n@name: compiles\n@points: 1\n@type: compile\n@target: code.cpp\n*/\n<test/>\n\n"
        .to_string()
        + &block("2", "unit", "5", "@timeout: 30\n", "    EXPECT_EQ(foo(867), 5309);");
    submission
        .write("tests_code.cpp", &spec)
        .write("support/cs12x_test.h", HARNESS)
        .write("code.cpp", "int foo(int x) { return x * 6 + 107; }\n");
    let output = Command::new(env!("CARGO_BIN_EXE_gradespec"))
        .current_dir(submission.dir.path())
        .args(["--ui", "silent", "--results", "out/results.json", "tests_code.cpp"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let results = read_results(&submission);
    let statuses: Vec<_> = results.tests.iter().map(|t| t.status.as_str()).collect();
    assert_eq!(statuses, vec!["passed", "passed"], "{:?}", results.tests);
    assert_abs_diff_eq!(results.score, 6.0);
}
