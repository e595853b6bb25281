//! The annotated specification format of the grading checks.
//!
//! A specification file (usually `tests_code.cpp`) is a sequence of checks, each made of a
//! metadata comment followed by a body:
//!
//! ```text
//! /*
//! @number: 4
//! @name: example
//! @points: 5
//! @type: unit
//! @target: code.cpp
//! */
//! <test>
//!     EXPECT_EQ(foo(867), 5309);
//! </test>
//! ```
//!
//! Reading a file happens in two steps: the [parser](fn.parse_blocks.html) splits it into
//! [`RawBlock`]s without interpreting the values, then the [validator](fn.validate_block.html)
//! turns each of them into a [`TestRecord`] or an [`InvalidRecord`]. Neither step aborts: the
//! problems are reported as diagnostics and as invalid records.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Error};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gradespec_diagnostics::{CodeSpan, Diagnostic, DiagnosticContext};

use crate::config::Timeouts;

mod parser;
mod payload;
mod serialize;
mod validate;

pub use parser::{parse_blocks, Annotation, RawBlock};
pub use payload::Payload;
pub use serialize::serialize_record;
pub use validate::validate_block;

/// The closed set of check types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    ApprovedIncludes,
    Script,
    Compile,
    MemoryErrors,
    Coverage,
    Unit,
    #[serde(rename = "i/o")]
    Io,
    Performance,
}

impl TestKind {
    /// All the known types.
    pub const ALL: [TestKind; 8] = [
        TestKind::ApprovedIncludes,
        TestKind::Script,
        TestKind::Compile,
        TestKind::MemoryErrors,
        TestKind::Coverage,
        TestKind::Unit,
        TestKind::Io,
        TestKind::Performance,
    ];

    /// The name of the type, as written in `@type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::ApprovedIncludes => "approved_includes",
            TestKind::Script => "script",
            TestKind::Compile => "compile",
            TestKind::MemoryErrors => "memory_errors",
            TestKind::Coverage => "coverage",
            TestKind::Unit => "unit",
            TestKind::Io => "i/o",
            TestKind::Performance => "performance",
        }
    }

    /// Whether the output is shown when `@show_output` is absent.
    pub fn default_show_output(&self) -> bool {
        matches!(
            self,
            TestKind::ApprovedIncludes | TestKind::Compile | TestKind::Coverage
        )
    }
}

impl Display for TestKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TestKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SpecError::UnknownType(s.to_string()))
    }
}

/// Who can see the result of a check in the results file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Never shown to the students.
    Hidden,
    /// Shown after the due date of the assignment.
    AfterDueDate,
    /// Shown after the grades are published.
    AfterPublished,
    #[default]
    Visible,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Hidden => "hidden",
            Visibility::AfterDueDate => "after_due_date",
            Visibility::AfterPublished => "after_published",
            Visibility::Visible => "visible",
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hidden" => Ok(Visibility::Hidden),
            "after_due_date" => Ok(Visibility::AfterDueDate),
            "after_published" => Ok(Visibility::AfterPublished),
            "visible" => Ok(Visibility::Visible),
            _ => Err(format!("Unknown visibility: {}", s)),
        }
    }
}

/// The `@number` of a check: digits with at most one decimal point.
///
/// Numbers are ordered by their integer part, then by their decimal suffix read as an integer, so
/// `5 < 5.1 < 5.2 < 5.10 < 6`. The text as written is kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestNumber {
    raw: String,
    major: u64,
    minor: Option<u64>,
}

impl TestNumber {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The key used for sorting.
    pub fn sort_key(&self) -> (u64, Option<u64>) {
        (self.major, self.minor)
    }

    /// Whether the displayed number starts with `prefix`, used for filtering the checks.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.raw == prefix || self.raw.starts_with(&format!("{}.", prefix))
    }
}

impl FromStr for TestNumber {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SpecError::InvalidNumber(s.to_string());
        let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, Some(minor)),
            None => (s, None),
        };
        if !all_digits(major) || !minor.map_or(true, all_digits) {
            return Err(invalid());
        }
        Ok(TestNumber {
            raw: s.to_string(),
            major: major.parse().map_err(|_| invalid())?,
            minor: minor
                .map(|m| m.parse().map_err(|_| invalid()))
                .transpose()?,
        })
    }
}

impl TryFrom<String> for TestNumber {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TestNumber> for String {
    fn from(number: TestNumber) -> Self {
        number.raw
    }
}

impl Display for TestNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialOrd for TestNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TestNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

/// The metadata shared by all the check types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestHeader {
    pub number: TestNumber,
    pub name: String,
    /// Points awarded when the check passes. Negative values are allowed.
    pub points: f64,
    /// The file the check applies to, relative to the working directory.
    pub target: String,
    /// Seconds, always positive.
    pub timeout: f64,
    pub show_output: bool,
    pub skip: bool,
    /// Auxiliary headers or sources.
    pub include: Vec<String>,
    pub visibility: Visibility,
}

impl TestHeader {
    pub fn timeout(&self) -> Duration {
        seconds(self.timeout)
    }
}

/// The longest accepted `@timeout`, one day.
pub const MAX_TIMEOUT: f64 = 86400.0;

/// A number of seconds as a `Duration`, saturating instead of panicking on values out of range.
pub fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// A validated check: its metadata, its type and the verbatim lines of its body.
///
/// The typed content of the body is decoded with [`Payload::decode`] when the check is run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub header: TestHeader,
    pub kind: TestKind,
    pub body: Vec<String>,
}

/// The problems that make a block of the specification unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SpecError {
    #[error("syntax error: {message}")]
    Syntax { message: String },
    #[error("missing required attribute: {0}")]
    MissingField(String),
    #[error("required attribute has no value: {0}")]
    EmptyField(String),
    #[error("invalid value for points: {0:?}")]
    InvalidPoints(String),
    #[error("invalid test number: {0:?}")]
    InvalidNumber(String),
    #[error("unsupported test type: {0:?}")]
    UnknownType(String),
    #[error("invalid test body: {message}")]
    InvalidBody { message: String },
}

impl SpecError {
    pub fn syntax(message: impl Into<String>) -> SpecError {
        SpecError::Syntax {
            message: message.into(),
        }
    }

    pub fn invalid_body(message: impl Into<String>) -> SpecError {
        SpecError::InvalidBody {
            message: message.into(),
        }
    }
}

/// A block that failed validation, with whatever could be read from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidRecord {
    pub number: Option<String>,
    pub name: Option<String>,
    /// The text of `@type`, even if it's not a known type.
    pub kind: Option<String>,
    /// The points, if they are a number.
    pub points: Option<f64>,
    pub error: SpecError,
}

/// The result of validating a block, with its position in the specification.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBlock {
    /// The position of the block among all the blocks of all the files.
    pub index: usize,
    /// The line that opens the metadata of the block.
    pub location: Option<CodeSpan>,
    pub record: Result<TestRecord, InvalidRecord>,
}

impl ValidatedBlock {
    /// `file:line` of the block, for the messages.
    pub fn location_string(&self) -> String {
        self.location
            .as_ref()
            .map(CodeSpan::location)
            .unwrap_or_else(|| "<unknown>".into())
    }
}

/// All the checks read from one or more specification files.
#[derive(Debug, Clone, Default)]
pub struct Specification {
    /// The files that were read.
    pub files: Vec<PathBuf>,
    /// The blocks, in declaration order.
    pub blocks: Vec<ValidatedBlock>,
    /// Warnings and errors found while reading the files.
    pub diagnostics: DiagnosticContext,
}

impl Specification {
    /// Parse and validate the content of a single file, appending its blocks.
    pub fn add_source(&mut self, file_name: &Path, content: &str, timeouts: &Timeouts) {
        let (blocks, diagnostics) = parse_blocks(file_name, content);
        self.diagnostics.extend(diagnostics);
        for block in blocks {
            let location = block.location.clone();
            let record = validate_block(block, timeouts, &mut self.diagnostics);
            self.blocks.push(ValidatedBlock {
                index: self.blocks.len(),
                location,
                record,
            });
        }
        self.files.push(file_name.to_owned());
    }

    /// Read, parse and validate a specification file. Only failing to read the file is an error.
    pub fn add_file(&mut self, path: &Path, timeouts: &Timeouts) -> Result<(), Error> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read the specification {}", path.display()))?;
        debug!("Parsing {}", path.display());
        self.add_source(path, &content, timeouts);
        Ok(())
    }

    /// Read all the specification files, in order.
    pub fn load<P: AsRef<Path>>(paths: &[P], timeouts: &Timeouts) -> Result<Specification, Error> {
        let mut spec = Specification::default();
        for path in paths {
            spec.add_file(path.as_ref(), timeouts)?;
        }
        spec.check_duplicate_numbers();
        Ok(spec)
    }

    /// Warn about the numbers used by more than one check.
    pub fn check_duplicate_numbers(&mut self) {
        let duplicates = self
            .blocks
            .iter()
            .filter_map(|b| b.record.as_ref().ok().map(|r| (&r.header.number, b)))
            .into_group_map_by(|(number, _)| number.as_str().to_string());
        let mut warnings = vec![];
        for (number, blocks) in duplicates
            .into_iter()
            .sorted_by_key(|(_, blocks)| blocks[0].1.index)
        {
            if blocks.len() < 2 {
                continue;
            }
            let places = blocks
                .iter()
                .map(|(_, b)| b.location_string())
                .join(", ");
            warnings.push(
                Diagnostic::warning(format!("Test number {} is used more than once", number))
                    .with_note(format!("Defined at {}", places))
                    .with_help("The points of the checks are attributed by number, use unique numbers"),
            );
        }
        for warning in warnings {
            self.diagnostics.add_diagnostic(warning);
        }
    }

    /// The valid records, in declaration order.
    pub fn records(&self) -> impl Iterator<Item = &TestRecord> {
        self.blocks.iter().filter_map(|b| b.record.as_ref().ok())
    }

    /// Keep only the blocks whose number starts with one of the prefixes. Blocks without a
    /// readable number are dropped too. An empty filter keeps everything.
    pub fn retain_numbers(&mut self, prefixes: &[String]) {
        if prefixes.is_empty() {
            return;
        }
        self.blocks.retain(|b| match &b.record {
            Ok(record) => prefixes
                .iter()
                .any(|p| record.header.number.matches_prefix(p)),
            Err(invalid) => invalid.number.as_ref().is_some_and(|n| {
                prefixes
                    .iter()
                    .any(|p| n == p || n.starts_with(&format!("{}.", p)))
            }),
        });
    }
}
