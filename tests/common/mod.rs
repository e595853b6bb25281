#![allow(dead_code)]

use std::path::{Path, PathBuf};

use clap::Parser;

use gradespec::opt::Opt;

/// A minimal assertion header for the generated drivers.
pub const HARNESS: &str = r#"#include <iostream>
#define INIT_TEST bool pass = true
#define FAIL() (pass = false)
#define EXPECT_EQ(a, b) do { auto _a = (a); auto _b = (b); if (!(_a == _b)) { \
    std::cout << "EXPECT_EQ(" #a ", " #b ") failed: " << _a << " != " << _b << std::endl; \
    pass = false; } } while (0)
#define RESULT(p) std::cout << ((p) ? "PASSED" : "FAILED") << std::endl
"#;

pub fn setup() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_nanos()
        .is_test(true)
        .try_init();
}

/// A temporary submission directory with a specification inside.
pub struct Submission {
    pub dir: tempfile::TempDir,
}

impl Submission {
    pub fn new() -> Submission {
        setup();
        Submission {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) -> &Self {
        let path = self.path(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
        self
    }

    /// The options to run `tests_code.cpp` with the silent UI, plus the extra arguments.
    pub fn opt(&self, extra: &[&str]) -> Opt {
        let mut args = vec![
            "gradespec".to_string(),
            "-C".to_string(),
            path_str(self.dir.path()),
            "--ui".to_string(),
            "silent".to_string(),
            "-j".to_string(),
            "2".to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        args.push(path_str(&self.path("tests_code.cpp")));
        Opt::parse_from(args)
    }
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn block(number: &str, kind: &str, points: &str, extra: &str, body: &str) -> String {
    format!(
        "/*\n@number: {}\n@name: test {}\n@points: {}\n@type: {}\n@target: code.cpp\n{}*/\n<test>\n{}\n</test>\n\n",
        number, number, points, kind, extra, body
    )
}

pub fn has_bash() -> bool {
    if which::which("bash").is_err() {
        eprintln!("bash is not installed, skipping");
        return false;
    }
    true
}
