//! Interpretation and execution of the annotated grading specifications.
//!
//! The pipeline is:
//!
//! - [`Specification::load`](spec/struct.Specification.html#method.load) parses and validates the
//!   specification files into records, collecting the problems as diagnostics;
//! - [`evaluate`](fn.evaluate.html) runs each record with the [strategy](strategy/index.html) of
//!   its type on a worker pool, streaming the progress to a [UI](ui/index.html);
//! - the [`ResultAggregator`](score/struct.ResultAggregator.html) orders the outcomes and computes
//!   the score, which can be written as a Gradescope
//!   [`results.json`](results/struct.GradescopeResults.html).

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate pest_derive;

pub mod config;
mod evaluation;
pub mod results;
pub mod score;
pub mod spec;
pub mod strategy;
pub mod ui;

pub use config::{GraderConfig, IoComparison, Timeouts};
pub use evaluation::{evaluate, EvaluationOptions};
pub use results::GradescopeResults;
pub use score::{Report, ResultAggregator, ScoringPolicy, TestOutcome, TestStatus};
pub use spec::{Specification, TestKind, TestRecord};
