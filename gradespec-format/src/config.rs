use std::path::Path;

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

use gradespec_exec::DEFAULT_OUTPUT_LIMIT;
use gradespec_lang::Toolchain;

use crate::score::ScoringPolicy;
use crate::spec::TestKind;

/// Default timeouts, in seconds, of the checks without `@timeout`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub unit: f64,
    pub io: f64,
    pub performance: f64,
    pub approved_includes: f64,
    pub compile: f64,
    pub memory_errors: f64,
    pub coverage: f64,
    pub script: f64,
    /// The limit of every compilation step inside a check.
    pub compile_step: f64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            unit: 10.0,
            io: 10.0,
            performance: 10.0,
            approved_includes: 10.0,
            compile: 30.0,
            memory_errors: 30.0,
            coverage: 30.0,
            script: 30.0,
            compile_step: 60.0,
        }
    }
}

impl Timeouts {
    pub fn for_kind(&self, kind: TestKind) -> f64 {
        match kind {
            TestKind::Unit => self.unit,
            TestKind::Io => self.io,
            TestKind::Performance => self.performance,
            TestKind::ApprovedIncludes => self.approved_includes,
            TestKind::Compile => self.compile,
            TestKind::MemoryErrors => self.memory_errors,
            TestKind::Coverage => self.coverage,
            TestKind::Script => self.script,
        }
    }
}

/// How the output of an i/o check is compared with the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IoComparison {
    /// Byte for byte.
    #[default]
    Exact,
    /// Ignoring `\r`, the whitespace at the end of each line and the trailing blank lines.
    TrimTrailingWhitespace,
}

impl IoComparison {
    /// Whether `output` matches `expected` under this policy.
    pub fn matches(&self, output: &[u8], expected: &[u8]) -> bool {
        match self {
            IoComparison::Exact => output == expected,
            IoComparison::TrimTrailingWhitespace => normalize(output) == normalize(expected),
        }
    }
}

/// Apply the `trim_trailing_whitespace` normalization.
pub fn normalize(text: &[u8]) -> String {
    let text = String::from_utf8_lossy(text).replace('\r', "");
    text.split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// The configuration of the grader, usually read from `gradespec.yaml`.
///
/// Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    pub toolchain: Toolchain,
    pub timeouts: Timeouts,
    /// Minimum percentage of the lines of the target a coverage check must execute.
    pub coverage_threshold: f64,
    pub io_comparison: IoComparison,
    /// Whether the approved_includes checks accept `#include "..."` without listing them.
    pub allow_local_includes: bool,
    /// The program that runs the scripts of the script checks.
    pub script_interpreter: String,
    /// The maximum number of bytes kept of each output stream of a process.
    pub output_limit: usize,
    pub scoring: ScoringPolicy,
}

impl Default for GraderConfig {
    fn default() -> Self {
        GraderConfig {
            toolchain: Toolchain::default(),
            timeouts: Timeouts::default(),
            coverage_threshold: 80.0,
            io_comparison: IoComparison::default(),
            allow_local_includes: true,
            script_interpreter: "bash".into(),
            output_limit: DEFAULT_OUTPUT_LIMIT,
            scoring: ScoringPolicy::default(),
        }
    }
}

impl GraderConfig {
    /// Parse the configuration from YAML.
    pub fn from_yaml(content: &str) -> Result<GraderConfig, Error> {
        serde_yaml::from_str(content).context("Invalid grader configuration")
    }

    /// Read the configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<GraderConfig, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read the configuration {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to load the configuration {}", path.display()))
    }
}
