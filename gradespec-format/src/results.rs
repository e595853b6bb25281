//! The `results.json` file read by Gradescope.

use std::path::Path;

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

use crate::score::{Report, TestStatus};
use crate::spec::Visibility;

/// Output of the checks that do not show it.
pub const HIDDEN_OUTPUT: &str = "Output is intentionally hidden";

/// A check in `results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTest {
    pub number: String,
    pub name: String,
    pub score: f64,
    pub max_score: f64,
    pub status: String,
    pub output: String,
    pub visibility: Visibility,
}

/// The content of `results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradescopeResults {
    pub score: f64,
    pub output: String,
    pub execution_time: f64,
    pub visibility: Visibility,
    pub stdout_visibility: Visibility,
    pub tests: Vec<ResultsTest>,
}

/// The fields of `submission_metadata.json` that matter here.
#[derive(Debug, Deserialize)]
struct SubmissionMetadata {
    #[serde(default)]
    previous_submissions: Vec<PreviousSubmission>,
}

#[derive(Debug, Deserialize)]
struct PreviousSubmission {
    score: serde_json::Value,
}

impl PreviousSubmission {
    /// The score can be a number or a string with a number.
    fn score(&self) -> Option<f64> {
        match &self.score {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl GradescopeResults {
    /// Build the results from the report.
    pub fn from_report(report: &Report) -> GradescopeResults {
        let tests = report
            .entries
            .iter()
            .map(|entry| {
                let output = match (&entry.output, &entry.error) {
                    (_, Some(error)) if entry.output.is_none() => error.clone(),
                    (Some(output), _) => output.trim().to_string(),
                    (None, _) if entry.compile_failed => format!("Failed to compile.\n{}", HIDDEN_OUTPUT),
                    (None, _) => HIDDEN_OUTPUT.to_string(),
                };
                ResultsTest {
                    number: entry.number.clone(),
                    name: entry.name.clone(),
                    score: entry.points_awarded,
                    max_score: entry.points_possible,
                    status: match entry.status {
                        TestStatus::Pass => "passed",
                        _ => "failed",
                    }
                    .to_string(),
                    output,
                    visibility: entry.visibility,
                }
            })
            .collect();
        let mut output = String::new();
        for message in &report.summary.gate_messages {
            output += message;
            output += "\n";
        }
        GradescopeResults {
            score: report.summary.score,
            output,
            execution_time: report.summary.execution_time,
            visibility: Visibility::Visible,
            stdout_visibility: Visibility::Visible,
            tests,
        }
    }

    /// Keep the best score among this and the previous submissions listed in the content of a
    /// `submission_metadata.json`.
    pub fn keep_best_previous(&mut self, metadata: &str) -> Result<(), Error> {
        let metadata: SubmissionMetadata =
            serde_json::from_str(metadata).context("Invalid submission metadata")?;
        let best = metadata
            .previous_submissions
            .iter()
            .filter_map(PreviousSubmission::score)
            .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))));
        if let Some(best) = best {
            if best > self.score {
                info!("Keeping the previous best score {} instead of {}", best, self.score);
                self.output += &format!(
                    "Your current submission's score was {:?}, however you get to keep your maximum submission score of {:?}\n",
                    self.score, best
                );
                self.score = best;
            }
        }
        Ok(())
    }

    /// Write the results as pretty JSON.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize the results")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write the results to {}", path.display()))
    }
}
