//! Aggregation of the outcomes of the checks into the final report.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::spec::{InvalidRecord, TestKind, TestNumber, TestRecord, Visibility};

/// Message of the gate on forbidden includes.
pub const FORBIDDEN_INCLUDES_MESSAGE: &str =
    "Forbidden includes are used, your current submission score is 0.0";
/// Message of the gate on insufficient coverage.
pub const INSUFFICIENT_COVERAGE_MESSAGE: &str =
    "Insufficient test coverage, so your current submission score is 0.0";

/// The final status of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
    /// The check could not be evaluated: invalid record, bad body, process that failed to start.
    Error,
    Timeout,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Skip => "skip",
            TestStatus::Error => "error",
            TestStatus::Timeout => "timeout",
        }
    }
}

/// The status of a scored check, used for coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreStatus {
    /// The maximum amount of points.
    Accepted,
    /// More than zero, but not the maximum.
    PartialScore,
    /// Zero points.
    WrongAnswer,
}

impl ScoreStatus {
    /// Select the correct status based on the score and its maximum possible value.
    pub fn from_score(score: f64, max_score: f64) -> Self {
        if score <= 0.0 {
            Self::WrongAnswer
        } else if approx::abs_diff_eq!(score, max_score, epsilon = 0.001) {
            Self::Accepted
        } else {
            Self::PartialScore
        }
    }
}

/// What running a single check produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub status: TestStatus,
    /// The captured output, or the explanation of what went wrong.
    pub output: String,
    pub elapsed: Duration,
    /// Whether the check failed while compiling.
    pub compile_failed: bool,
}

impl TestOutcome {
    pub fn new(status: TestStatus, output: impl Into<String>) -> TestOutcome {
        TestOutcome {
            status,
            output: output.into(),
            elapsed: Duration::ZERO,
            compile_failed: false,
        }
    }

    pub fn skipped() -> TestOutcome {
        TestOutcome::new(TestStatus::Skip, "")
    }

    pub fn error(message: impl Into<String>) -> TestOutcome {
        TestOutcome::new(TestStatus::Error, message)
    }
}

/// Which records count toward the possible points, and which gates are enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Count the points of the records in error (invalid ones included).
    pub count_errors_in_possible: bool,
    /// Count the points of the skipped records.
    pub count_skipped_in_possible: bool,
    /// A failed approved_includes check zeroes the recorded score.
    pub zero_on_forbidden_includes: bool,
    /// A failed coverage check zeroes the recorded score.
    pub zero_on_insufficient_coverage: bool,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        ScoringPolicy {
            count_errors_in_possible: false,
            count_skipped_in_possible: false,
            zero_on_forbidden_includes: true,
            zero_on_insufficient_coverage: true,
        }
    }
}

impl ScoringPolicy {
    fn counts_in_possible(&self, status: TestStatus) -> bool {
        match status {
            TestStatus::Error => self.count_errors_in_possible,
            TestStatus::Skip => self.count_skipped_in_possible,
            _ => true,
        }
    }
}

/// A line of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub number: String,
    pub name: String,
    /// The declared type, even if unknown.
    #[serde(rename = "type")]
    pub kind: String,
    pub points_awarded: f64,
    /// The declared points, zero if they are not a number.
    pub points_possible: f64,
    pub status: TestStatus,
    /// The captured output, present iff the check shows its output.
    pub output: Option<String>,
    /// Why the check is in error.
    pub error: Option<String>,
    /// Seconds.
    pub elapsed: f64,
    pub compile_failed: bool,
    pub visibility: Visibility,
    /// Position of the check in the specification.
    #[serde(skip)]
    index: usize,
}

impl ReportEntry {
    fn sort_key(&self) -> ((u64, Option<u64>), usize) {
        let number = self
            .number
            .parse::<TestNumber>()
            .map(|n| n.sort_key())
            .unwrap_or((u64::MAX, None));
        (number, self.index)
    }

    pub fn is_kind(&self, kind: TestKind) -> bool {
        self.kind == kind.as_str()
    }
}

/// The totals of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Summary {
    /// Sum of the points of the passing checks.
    pub awarded: f64,
    /// Sum of the points that could be awarded, according to the policy.
    pub possible: f64,
    /// `awarded / possible`, zero when nothing is possible.
    pub fraction: f64,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub timeouts: usize,
    /// The score to record, after applying the gates.
    pub score: f64,
    /// The messages of the gates that zeroed the score.
    pub gate_messages: Vec<String>,
    /// Seconds spent running the checks.
    pub execution_time: f64,
}

/// The final report: the entries ordered by number, and the totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub entries: Vec<ReportEntry>,
    pub summary: Summary,
}

/// Collects the outcomes of the checks, in any order, and produces the [`Report`].
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    policy: ScoringPolicy,
    entries: Vec<ReportEntry>,
}

impl ResultAggregator {
    pub fn new(policy: ScoringPolicy) -> ResultAggregator {
        ResultAggregator {
            policy,
            entries: vec![],
        }
    }

    /// Add a record that failed validation, `index` is its position in the specification.
    pub fn add_invalid(&mut self, index: usize, invalid: &InvalidRecord) {
        self.entries.push(ReportEntry {
            number: invalid.number.clone().unwrap_or_default(),
            name: invalid.name.clone().unwrap_or_default(),
            kind: invalid.kind.clone().unwrap_or_default(),
            points_awarded: 0.0,
            points_possible: invalid.points.unwrap_or(0.0),
            status: TestStatus::Error,
            output: None,
            error: Some(invalid.error.to_string()),
            elapsed: 0.0,
            compile_failed: false,
            visibility: Visibility::default(),
            index,
        });
    }

    /// Add the outcome of a record, `index` is its position in the specification.
    pub fn add_outcome(&mut self, index: usize, record: &TestRecord, outcome: TestOutcome) {
        let header = &record.header;
        let points_awarded = if outcome.status == TestStatus::Pass {
            header.points
        } else {
            0.0
        };
        let error = (outcome.status == TestStatus::Error).then(|| outcome.output.clone());
        self.entries.push(ReportEntry {
            number: header.number.to_string(),
            name: header.name.clone(),
            kind: record.kind.as_str().to_string(),
            points_awarded,
            points_possible: header.points,
            status: outcome.status,
            output: header.show_output.then_some(outcome.output),
            error,
            elapsed: outcome.elapsed.as_secs_f64(),
            compile_failed: outcome.compile_failed,
            visibility: header.visibility,
            index,
        });
    }

    /// Order the entries and compute the totals.
    pub fn finish(mut self, execution_time: Duration) -> Report {
        self.entries.sort_by_key(ReportEntry::sort_key);
        let mut summary = Summary {
            execution_time: execution_time.as_secs_f64(),
            ..Default::default()
        };
        for entry in &self.entries {
            summary.awarded += entry.points_awarded;
            if self.policy.counts_in_possible(entry.status) {
                summary.possible += entry.points_possible;
            }
            match entry.status {
                TestStatus::Pass => summary.passed += 1,
                TestStatus::Fail => summary.failed += 1,
                TestStatus::Skip => summary.skipped += 1,
                TestStatus::Error => summary.errors += 1,
                TestStatus::Timeout => summary.timeouts += 1,
            }
        }
        summary.fraction = if summary.possible > 0.0 {
            summary.awarded / summary.possible
        } else {
            0.0
        };

        let gate_failed = |kind: TestKind| {
            self.entries.iter().any(|e| {
                e.is_kind(kind) && matches!(e.status, TestStatus::Fail | TestStatus::Timeout)
            })
        };
        if self.policy.zero_on_forbidden_includes && gate_failed(TestKind::ApprovedIncludes) {
            summary.gate_messages.push(FORBIDDEN_INCLUDES_MESSAGE.into());
        }
        if self.policy.zero_on_insufficient_coverage && gate_failed(TestKind::Coverage) {
            summary.gate_messages.push(INSUFFICIENT_COVERAGE_MESSAGE.into());
        }
        summary.score = if summary.gate_messages.is_empty() {
            summary.awarded
        } else {
            0.0
        };

        Report {
            entries: self.entries,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::spec::{SpecError, TestHeader};

    fn record(number: &str, kind: TestKind, points: f64, show_output: bool) -> TestRecord {
        TestRecord {
            header: TestHeader {
                number: number.parse().unwrap(),
                name: format!("test {}", number),
                points,
                target: "code.cpp".into(),
                timeout: 10.0,
                show_output,
                skip: false,
                include: vec![],
                visibility: Visibility::Visible,
            },
            kind,
            body: vec![],
        }
    }

    fn outcome(status: TestStatus) -> TestOutcome {
        TestOutcome::new(status, "some output")
    }

    #[test]
    fn test_ordering() {
        let mut aggregator = ResultAggregator::new(ScoringPolicy::default());
        let numbers = ["2", "0", "5.1", "5.2", "1"];
        // Completion order is the reverse of the declaration order.
        for (index, number) in numbers.iter().enumerate().rev() {
            aggregator.add_outcome(index, &record(number, TestKind::Unit, 1.0, false), outcome(TestStatus::Pass));
        }
        let report = aggregator.finish(Duration::ZERO);
        let order: Vec<_> = report.entries.iter().map(|e| e.number.as_str()).collect();
        assert_eq!(order, vec!["0", "1", "2", "5.1", "5.2"]);
    }

    #[test]
    fn test_ties_by_declaration_order() {
        let mut aggregator = ResultAggregator::new(ScoringPolicy::default());
        let mut second = record("3", TestKind::Unit, 1.0, false);
        second.header.name = "second".into();
        aggregator.add_outcome(1, &second, outcome(TestStatus::Pass));
        aggregator.add_outcome(0, &record("3", TestKind::Unit, 1.0, false), outcome(TestStatus::Pass));
        let report = aggregator.finish(Duration::ZERO);
        assert_eq!(report.entries[0].name, "test 3");
        assert_eq!(report.entries[1].name, "second");
    }

    #[test]
    fn test_totals_and_default_policy() {
        let mut aggregator = ResultAggregator::new(ScoringPolicy::default());
        aggregator.add_outcome(0, &record("1", TestKind::Unit, 5.0, true), outcome(TestStatus::Pass));
        aggregator.add_outcome(1, &record("2", TestKind::Unit, 3.0, false), outcome(TestStatus::Fail));
        aggregator.add_outcome(2, &record("3", TestKind::Unit, 2.0, false), outcome(TestStatus::Timeout));
        aggregator.add_outcome(3, &record("4", TestKind::Unit, 4.0, false), TestOutcome::skipped());
        aggregator.add_invalid(
            4,
            &InvalidRecord {
                number: Some("5".into()),
                name: Some("bad".into()),
                kind: Some("unit".into()),
                points: None,
                error: SpecError::InvalidPoints("-F".into()),
            },
        );
        let report = aggregator.finish(Duration::from_secs(2));
        let summary = &report.summary;
        assert_abs_diff_eq!(summary.awarded, 5.0);
        assert_abs_diff_eq!(summary.possible, 10.0);
        assert_abs_diff_eq!(summary.fraction, 0.5);
        assert_abs_diff_eq!(summary.score, 5.0);
        assert_eq!(
            (summary.passed, summary.failed, summary.timeouts, summary.skipped, summary.errors),
            (1, 1, 1, 1, 1)
        );
        assert_eq!(report.entries[0].output.as_deref(), Some("some output"));
        assert_eq!(report.entries[1].output, None);
        assert_eq!(report.entries[3].status, TestStatus::Skip);
        assert_abs_diff_eq!(report.entries[3].points_awarded, 0.0);
        let invalid = &report.entries[4];
        assert_eq!(invalid.status, TestStatus::Error);
        assert_abs_diff_eq!(invalid.points_awarded, 0.0);
        assert_eq!(invalid.error.as_deref(), Some("invalid value for points: \"-F\""));
    }

    #[test]
    fn test_policy_counts_errors_and_skips() {
        let policy = ScoringPolicy {
            count_errors_in_possible: true,
            count_skipped_in_possible: true,
            ..Default::default()
        };
        let mut aggregator = ResultAggregator::new(policy);
        aggregator.add_outcome(0, &record("1", TestKind::Unit, 5.0, false), outcome(TestStatus::Pass));
        aggregator.add_outcome(1, &record("2", TestKind::Unit, 3.0, false), TestOutcome::error("boom"));
        aggregator.add_outcome(2, &record("3", TestKind::Unit, 2.0, false), TestOutcome::skipped());
        let report = aggregator.finish(Duration::ZERO);
        assert_abs_diff_eq!(report.summary.possible, 10.0);
        assert_eq!(report.entries[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_gates() {
        let mut aggregator = ResultAggregator::new(ScoringPolicy::default());
        aggregator.add_outcome(0, &record("1", TestKind::Unit, 5.0, false), outcome(TestStatus::Pass));
        aggregator.add_outcome(1, &record("2", TestKind::ApprovedIncludes, 0.0, true), outcome(TestStatus::Fail));
        aggregator.add_outcome(2, &record("3", TestKind::Coverage, 1.0, true), outcome(TestStatus::Pass));
        let report = aggregator.finish(Duration::ZERO);
        assert_abs_diff_eq!(report.summary.awarded, 6.0);
        assert_abs_diff_eq!(report.summary.score, 0.0);
        assert_eq!(report.summary.gate_messages, vec![FORBIDDEN_INCLUDES_MESSAGE.to_string()]);

        let policy = ScoringPolicy {
            zero_on_forbidden_includes: false,
            ..Default::default()
        };
        let mut aggregator = ResultAggregator::new(policy);
        aggregator.add_outcome(0, &record("1", TestKind::Unit, 5.0, false), outcome(TestStatus::Pass));
        aggregator.add_outcome(1, &record("2", TestKind::ApprovedIncludes, 0.0, true), outcome(TestStatus::Fail));
        let report = aggregator.finish(Duration::ZERO);
        assert_abs_diff_eq!(report.summary.score, 5.0);
    }

    #[test]
    fn test_score_status() {
        assert_eq!(ScoreStatus::from_score(0.0, 1.0), ScoreStatus::WrongAnswer);
        assert_eq!(ScoreStatus::from_score(0.1, 1.0), ScoreStatus::PartialScore);
        assert_eq!(ScoreStatus::from_score(1.0, 1.0), ScoreStatus::Accepted);
        assert_eq!(ScoreStatus::from_score(0.99999, 1.0), ScoreStatus::Accepted);
    }
}
