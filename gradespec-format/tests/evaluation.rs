use std::path::Path;
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use speculoos::prelude::*;

use gradespec_exec::{LocalProcessRunner, ProcessRunner, SuccessProcessRunner};
use gradespec_format::score::FORBIDDEN_INCLUDES_MESSAGE;
use gradespec_format::spec::serialize_record;
use gradespec_format::ui::UIMessageSender;
use gradespec_format::{
    evaluate, EvaluationOptions, GraderConfig, Report, Specification, TestStatus, Timeouts,
};

const HARNESS: &str = r#"#include <iostream>
#define INIT_TEST bool pass = true
#define FAIL() (pass = false)
#define EXPECT_EQ(a, b) do { auto _a = (a); auto _b = (b); if (!(_a == _b)) { \
    std::cout << "EXPECT_EQ(" #a ", " #b ") failed: " << _a << " != " << _b << std::endl; \
    pass = false; } } while (0)
#define RESULT(p) std::cout << ((p) ? "PASSED" : "FAILED") << std::endl
"#;

struct Workdir {
    dir: tempfile::TempDir,
}

impl Workdir {
    fn new() -> Workdir {
        let _ = env_logger::Builder::from_default_env().is_test(true).try_init();
        Workdir {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn write(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn evaluate(&self, spec: &str, runner: &dyn ProcessRunner) -> Report {
        let mut specification = Specification::default();
        specification.add_source(Path::new("tests_code.cpp"), spec, &Timeouts::default());
        specification.check_duplicate_numbers();
        let mut options = EvaluationOptions::new(self.dir.path());
        options.scratch_root = self.dir.path().join(".scratch");
        options.num_workers = 4;
        let (sender, _receiver) = UIMessageSender::new();
        evaluate(&specification, &GraderConfig::default(), runner, &options, &sender).unwrap()
    }
}

fn block(number: &str, kind: &str, points: &str, extra: &str, body: &str) -> String {
    format!(
        "/*\n@number: {}\n@name: test {}\n@points: {}\n@type: {}\n@target: code.cpp\n{}*/\n<test>\n{}\n</test>\n\n",
        number, number, points, kind, extra, body
    )
}

#[test]
fn test_skip_and_invalid_points() {
    let workdir = Workdir::new();
    let spec = block("1", "unit", "3", "@skip: true\n", "EXPECT_EQ(1, 2);")
        + &block("2", "unit", "-F", "", "EXPECT_EQ(1, 1);");
    let report = workdir.evaluate(&spec, &SuccessProcessRunner);
    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.entries[0].status, TestStatus::Skip);
    assert_abs_diff_eq!(report.entries[0].points_awarded, 0.0);
    assert_eq!(report.entries[1].status, TestStatus::Error);
    assert_abs_diff_eq!(report.entries[1].points_awarded, 0.0);
    assert_abs_diff_eq!(report.summary.possible, 0.0);
}

#[test]
fn test_report_ordering() {
    let workdir = Workdir::new();
    workdir.write("code.cpp", "int foo() { return 1; }\n");
    let mut spec = String::new();
    for number in ["5.2", "2", "0", "5.1", "1"] {
        spec += &block(number, "approved_includes", "1", "", "iostream");
    }
    let report = workdir.evaluate(&spec, &SuccessProcessRunner);
    let numbers: Vec<_> = report.entries.iter().map(|e| e.number.as_str()).collect();
    assert_eq!(numbers, vec!["0", "1", "2", "5.1", "5.2"]);
    assert_abs_diff_eq!(report.summary.awarded, 5.0);
}

#[test]
fn test_approved_includes_gate() {
    let workdir = Workdir::new();
    workdir.write("code.cpp", "#include <iostream>\n#include <vector>\nint foo() { return 1; }\n");
    let spec = block("1", "approved_includes", "0", "@show_output: true\n", "cstddef\niostream")
        + &block("2", "approved_includes", "4", "", "iostream vector");
    let report = workdir.evaluate(&spec, &SuccessProcessRunner);
    assert_eq!(report.entries[0].status, TestStatus::Fail);
    assert_that!(report.entries[0].output.as_deref().unwrap_or_default()).contains("<vector>");
    assert_eq!(report.entries[1].status, TestStatus::Pass);
    assert_abs_diff_eq!(report.summary.awarded, 4.0);
    assert_abs_diff_eq!(report.summary.score, 0.0);
    assert_eq!(report.summary.gate_messages, vec![FORBIDDEN_INCLUDES_MESSAGE.to_string()]);
}

#[test]
fn test_serialize_is_idempotent() {
    let spec = block("4", "unit", "2.5", "@include: <vector>\n", "    EXPECT_EQ(foo(867), 5309);");
    let mut first = Specification::default();
    first.add_source(Path::new("a.cpp"), &spec, &Timeouts::default());
    let once: String = first.records().map(serialize_record).collect();
    let mut second = Specification::default();
    second.add_source(Path::new("b.cpp"), &once, &Timeouts::default());
    let twice: String = second.records().map(serialize_record).collect();
    assert_eq!(once, twice);
    assert_eq!(first.records().collect::<Vec<_>>(), second.records().collect::<Vec<_>>());
}

#[test]
fn test_timeout_isolation() {
    if which::which("bash").is_err() {
        eprintln!("bash is not installed, skipping");
        return;
    }
    let workdir = Workdir::new();
    workdir.write("slow.sh", "sleep 30\n");
    workdir.write("fast.sh", "echo done\n");
    let spec = block("1", "script", "1", "@timeout: 1\n", "slow.sh")
        + &block("2", "script", "1", "@timeout: 30\n@show_output: true\n", "fast.sh");
    let start = Instant::now();
    let report = workdir.evaluate(&spec, &LocalProcessRunner::default());
    assert_that!(start.elapsed()).is_less_than(Duration::from_secs(10));
    assert_eq!(report.entries[0].status, TestStatus::Timeout);
    assert_eq!(report.entries[1].status, TestStatus::Pass);
    assert_eq!(report.entries[1].output.as_deref(), Some("done"));
}

fn unit_report(foo: &str) -> Option<Report> {
    if which::which("g++").is_err() {
        eprintln!("g++ is not installed, skipping");
        return None;
    }
    let workdir = Workdir::new();
    workdir.write("support/cs12x_test.h", HARNESS);
    workdir.write("code.cpp", &format!("int foo(int x) {{ return {}; }}\n", foo));
    let spec = block("1", "unit", "5", "@show_output: true\n@timeout: 30\n", "    EXPECT_EQ(foo(867), 5309);");
    Some(workdir.evaluate(&spec, &LocalProcessRunner::default()))
}

#[test]
fn test_unit_pass_with_compiler() {
    let Some(report) = unit_report("x * 6 + 107") else {
        return;
    };
    assert_eq!(report.entries[0].status, TestStatus::Pass, "{:?}", report.entries[0]);
    assert_abs_diff_eq!(report.summary.score, 5.0);
}

#[test]
fn test_unit_fail_with_compiler() {
    let Some(report) = unit_report("x") else {
        return;
    };
    assert_eq!(report.entries[0].status, TestStatus::Fail, "{:?}", report.entries[0]);
    assert_that!(report.entries[0].output.as_deref().unwrap_or_default()).contains("failed: 867 != 5309");
    assert_abs_diff_eq!(report.summary.score, 0.0);
}

#[test]
fn test_evaluation_is_repeatable() {
    if which::which("g++").is_err() {
        eprintln!("g++ is not installed, skipping");
        return;
    }
    let workdir = Workdir::new();
    workdir.write("support/cs12x_test.h", HARNESS);
    workdir.write("code.cpp", "#include <vector>\nint foo(int x) { return x * 6 + 107; }\n");
    let spec = block("1", "approved_includes", "1", "", "vector")
        + &block("2", "compile", "2", "", "code.cpp")
        + &block("3", "unit", "5", "@show_output: true\n@timeout: 30\n", "    EXPECT_EQ(foo(867), 5309);")
        + &block("4", "unit", "3", "@show_output: true\n@timeout: 30\n", "    EXPECT_EQ(foo(1), 1);");
    let runner = LocalProcessRunner::default();
    let summarize = |report: &Report| {
        report
            .entries
            .iter()
            .map(|e| (e.number.clone(), e.status, e.points_awarded, e.output.clone()))
            .collect::<Vec<_>>()
    };
    let first = workdir.evaluate(&spec, &runner);
    let second = workdir.evaluate(&spec, &runner);
    assert_eq!(summarize(&first), summarize(&second));
    let statuses: Vec<_> = first.entries.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![TestStatus::Pass, TestStatus::Pass, TestStatus::Pass, TestStatus::Fail]
    );
    assert_abs_diff_eq!(first.summary.awarded, second.summary.awarded);
    assert_abs_diff_eq!(first.summary.possible, second.summary.possible);
    assert_abs_diff_eq!(first.summary.score, 8.0);
    assert_abs_diff_eq!(second.summary.score, 8.0);
}
