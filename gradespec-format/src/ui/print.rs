use termcolor::{ColorChoice, StandardStream};

use crate::{cwrite, cwriteln};
use crate::score::{Report, ScoreStatus, Summary, TestStatus};
use crate::ui::*;

/// A simple UI that prints to stdout a line for each completed check and, at the end, the outputs
/// of the failed checks and the final score.
pub struct PrintUI {
    stream: StandardStream,
    report: Option<Report>,
}

impl Default for PrintUI {
    fn default() -> Self {
        PrintUI::new()
    }
}

impl PrintUI {
    /// Make a new PrintUI.
    pub fn new() -> PrintUI {
        PrintUI {
            stream: StandardStream::stdout(ColorChoice::Auto),
            report: None,
        }
    }

    fn write_status(&mut self, status: TestStatus) {
        match status {
            TestStatus::Pass => cwrite!(self, GREEN, "[PASS]    "),
            TestStatus::Fail => cwrite!(self, RED, "[FAIL]    "),
            TestStatus::Timeout => cwrite!(self, ORANGE, "[TIMEOUT] "),
            TestStatus::Skip => cwrite!(self, YELLOW, "[SKIP]    "),
            TestStatus::Error => cwrite!(self, RED, "[ERROR]   "),
        }
    }

    fn write_points(&mut self, awarded: f64, possible: f64) {
        let color = match ScoreStatus::from_score(awarded, possible) {
            ScoreStatus::Accepted => &*GREEN,
            ScoreStatus::PartialScore => &*YELLOW,
            ScoreStatus::WrongAnswer => &*RED,
        };
        cwrite!(self, color, "{:6.2}", awarded);
        print!(" / {:6.2}", possible);
    }

    fn print_report(&mut self, report: &Report) {
        let shown: Vec<_> = report
            .entries
            .iter()
            .filter(|e| e.status != TestStatus::Pass)
            .filter(|e| e.output.is_some() || e.error.is_some())
            .collect();
        if !shown.is_empty() {
            println!();
            cwriteln!(self, BLUE, "Failures");
        }
        for entry in shown {
            cwrite!(self, BOLD, "test {}: {}", entry.number, entry.name);
            println!(" ({})", entry.status.as_str());
            if let Some(error) = &entry.error {
                cwriteln!(self, RED, "{}", error);
            } else if let Some(output) = &entry.output {
                println!("{}", output.trim_end());
            }
            println!();
        }

        let summary = &report.summary;
        println!();
        cwrite!(self, BOLD, "Summary: ");
        println!(
            "{} passed, {} failed, {} timed out, {} skipped, {} in error ({:.3}s)",
            summary.passed,
            summary.failed,
            summary.timeouts,
            summary.skipped,
            summary.errors,
            summary.execution_time
        );
        for message in &summary.gate_messages {
            cwriteln!(self, RED, "{}", message);
        }
        println!();
        for line in points_box(summary) {
            println!("{}", line);
        }
        if report
            .summary
            .gate_messages
            .iter()
            .any(|m| m == crate::score::FORBIDDEN_INCLUDES_MESSAGE)
        {
            cwriteln!(self, RED, "!!! ZERO DUE TO UNAPPROVED INCLUDES");
        }
        if report
            .summary
            .gate_messages
            .iter()
            .any(|m| m == crate::score::INSUFFICIENT_COVERAGE_MESSAGE)
        {
            cwriteln!(self, RED, "!!! ZERO DUE TO INSUFFICIENT COVERAGE");
        }
    }
}

/// The box with the final score. When a gate zeroed the score, the awarded points are crossed out
/// and followed by the recorded score.
pub fn points_box(summary: &Summary) -> Vec<String> {
    let awarded = (summary.awarded * 10000.0 + 0.5).floor() / 10000.0;
    let score = format!("{:6.2}", awarded);
    let possible = format!("{:6.2}", summary.possible);
    let mut lines = vec![
        "###########################".to_string(),
        "#                         #".to_string(),
    ];
    if summary.gate_messages.is_empty() {
        lines.push(format!("# points: {} / {} #", score, possible));
    } else {
        lines.push(format!("# points:~{}~/ {} #", score.replace(' ', "~"), possible));
        lines.push(format!("#         {:6.2} / {} #", summary.score, possible));
    }
    lines.push("#                         #".to_string());
    lines.push("###########################".to_string());
    lines
}

impl UI for PrintUI {
    fn on_message(&mut self, message: UIMessage) {
        match message {
            UIMessage::Diagnostic { diagnostic } => {
                eprintln!("{}", diagnostic);
            }
            UIMessage::Plan {
                files,
                tests,
                invalid,
                num_workers,
            } => {
                let files = files
                    .iter()
                    .map(|f| f.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                cwrite!(self, BOLD, "Specification: ");
                println!("{}", files);
                print!("Running {} tests on {} workers", tests, num_workers);
                if invalid > 0 {
                    print!(", ");
                    cwrite!(self, RED, "{} invalid", invalid);
                }
                println!();
                println!();
            }
            UIMessage::TestStarted { .. } => {}
            UIMessage::TestCompleted {
                number,
                name,
                kind,
                status,
                points_awarded,
                points_possible,
                elapsed,
            } => {
                self.write_status(status);
                print!("{:>5} ", number);
                self.write_points(points_awarded, points_possible);
                println!("  {:>7.3}s  {} ({})", elapsed, name, kind);
            }
            UIMessage::Report { report } => {
                self.report = Some(report);
            }
        }
    }

    fn finish(&mut self) {
        if let Some(report) = self.report.take() {
            self.print_report(&report);
        }
    }
}
