//! The evaluation of a whole specification.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Error;

use gradespec_exec::{ProcessRunner, Scratch, WorkerPool};

use crate::config::GraderConfig;
use crate::score::{Report, ResultAggregator, TestOutcome, TestStatus};
use crate::spec::{Specification, TestRecord};
use crate::strategy::{dispatch, StrategyContext};
use crate::ui::{UIMessage, UIMessageSender};

/// How to run the checks.
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// The directory with the sources of the submission.
    pub workdir: PathBuf,
    /// The number of checks run at the same time.
    pub num_workers: usize,
    /// Where the scratch directories of the checks are made.
    pub scratch_root: PathBuf,
    /// Do not remove the scratch directories at the end.
    pub keep_scratch: bool,
}

impl EvaluationOptions {
    /// The default options for evaluating the sources inside `workdir`.
    pub fn new<P: Into<PathBuf>>(workdir: P) -> EvaluationOptions {
        EvaluationOptions {
            workdir: workdir.into(),
            num_workers: num_cpus::get(),
            scratch_root: std::env::temp_dir().join("gradespec"),
            keep_scratch: false,
        }
    }
}

/// Send a message to the UI. The UI may have already gone away, and that's fine.
fn notify(sender: &UIMessageSender, message: UIMessage) {
    if let Err(e) = sender.send(message) {
        debug!("The UI is not listening: {}", e);
    }
}

fn completed_message(record: &TestRecord, outcome: &TestOutcome) -> UIMessage {
    UIMessage::TestCompleted {
        number: record.header.number.to_string(),
        name: record.header.name.clone(),
        kind: record.kind.to_string(),
        status: outcome.status,
        points_awarded: if outcome.status == TestStatus::Pass {
            record.header.points
        } else {
            0.0
        },
        points_possible: record.header.points,
        elapsed: outcome.elapsed.as_secs_f64(),
    }
}

/// Extract the message of a panic.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a single check in its own scratch directory. A panic of the strategy is turned into an
/// error outcome of this check only.
fn run_record(
    record: &TestRecord,
    config: &GraderConfig,
    runner: &dyn ProcessRunner,
    options: &EvaluationOptions,
) -> TestOutcome {
    let start = Instant::now();
    let prefix = format!("test-{}", record.header.number);
    let scratch = match Scratch::new(&options.scratch_root, &prefix, options.keep_scratch) {
        Ok(scratch) => scratch,
        Err(e) => return TestOutcome::error(format!("{:#}", e)),
    };
    let ctx = StrategyContext {
        workdir: &options.workdir,
        config,
        runner,
        scratch: &scratch,
    };
    let mut outcome = match catch_unwind(AssertUnwindSafe(|| dispatch(record, &ctx))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Test {} panicked: {}", record.header.number, message);
            TestOutcome::error(format!("Internal error: {}", message))
        }
    };
    if outcome.elapsed.is_zero() {
        outcome.elapsed = start.elapsed();
    }
    outcome
}

/// Evaluate all the checks of the specification, returning the final report.
///
/// The invalid blocks and the skipped checks are reported without running anything, the other
/// checks run on a pool of `options.num_workers` workers. The UI receives a
/// [`UIMessage::Plan`], a [`UIMessage::TestStarted`] and a [`UIMessage::TestCompleted`] for
/// each check, and finally the [`UIMessage::Report`].
pub fn evaluate(
    spec: &Specification,
    config: &GraderConfig,
    runner: &dyn ProcessRunner,
    options: &EvaluationOptions,
    sender: &UIMessageSender,
) -> Result<Report, Error> {
    let start = Instant::now();
    let pool = WorkerPool::new(options.num_workers);
    let mut aggregator = ResultAggregator::new(config.scoring.clone());

    let mut jobs = vec![];
    let mut skipped = vec![];
    let mut invalid = 0;
    for block in &spec.blocks {
        match &block.record {
            Err(record) => {
                debug!("Block at {} is invalid: {}", block.location_string(), record.error);
                invalid += 1;
                aggregator.add_invalid(block.index, record);
            }
            Ok(record) if record.header.skip => skipped.push((block.index, record)),
            Ok(record) => jobs.push((block.index, record)),
        }
    }
    notify(
        sender,
        UIMessage::Plan {
            files: spec.files.clone(),
            tests: spec.blocks.len() - invalid,
            invalid,
            num_workers: pool.num_workers(),
        },
    );
    for (index, record) in skipped {
        debug!("Skipping test {}", record.header.number);
        let outcome = TestOutcome::skipped();
        notify(sender, completed_message(record, &outcome));
        aggregator.add_outcome(index, record, outcome);
    }
    info!("Running {} tests on {} workers", jobs.len(), pool.num_workers());

    pool.run(
        jobs,
        |(index, record)| {
            notify(
                sender,
                UIMessage::TestStarted {
                    number: record.header.number.to_string(),
                    name: record.header.name.clone(),
                    kind: record.kind.to_string(),
                },
            );
            let outcome = run_record(record, config, runner, options);
            (index, record, outcome)
        },
        |(index, record, outcome)| {
            notify(sender, completed_message(record, &outcome));
            aggregator.add_outcome(index, record, outcome);
        },
    )?;

    let report = aggregator.finish(start.elapsed());
    notify(
        sender,
        UIMessage::Report {
            report: report.clone(),
        },
    );
    Ok(report)
}
