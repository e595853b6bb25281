use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use gradespec_diagnostics::Diagnostic;

use crate::score::{Report, TestStatus};

/// A message sent to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UIMessage {
    /// A diagnostic message has been emitted.
    Diagnostic {
        /// The diagnostic message.
        diagnostic: Diagnostic,
    },

    /// The specification has been loaded and the evaluation is starting.
    Plan {
        /// The specification files.
        files: Vec<PathBuf>,
        /// The number of checks that will be run, skipped ones included.
        tests: usize,
        /// The number of blocks that failed validation.
        invalid: usize,
        /// The number of workers.
        num_workers: usize,
    },

    /// A check started running.
    TestStarted {
        number: String,
        name: String,
        /// The type of the check.
        kind: String,
    },

    /// A check has been completed.
    TestCompleted {
        number: String,
        name: String,
        /// The type of the check.
        kind: String,
        status: TestStatus,
        points_awarded: f64,
        points_possible: f64,
        /// Seconds.
        elapsed: f64,
    },

    /// The final report of the evaluation.
    Report {
        /// The report.
        report: Report,
    },
}
