//! Execution of the external processes needed by the checks.
//!
//! Every compiler, test binary, `gcov` and script invocation goes through a
//! [`ProcessRunner`](trait.ProcessRunner.html): the process is spawned in its own process group,
//! its standard output and error are drained concurrently, and if it does not terminate within the
//! deadline the whole group is killed with `SIGKILL`. A timeout never affects other processes.
//!
//! The checks run concurrently on a [`WorkerPool`](struct.WorkerPool.html), and each of them works
//! inside its own [`Scratch`](struct.Scratch.html) directory.
//!
//! For testing the components above the runner, [`FakeProcessRunner`](struct.FakeProcessRunner.html),
//! [`SuccessProcessRunner`](struct.SuccessProcessRunner.html) and
//! [`ErrorProcessRunner`](struct.ErrorProcessRunner.html) implement the same trait without
//! spawning anything.

#[macro_use]
extern crate log;

mod command;
mod pool;
mod runner;
mod scratch;

pub use command::{ProcessCommand, ProgramCommand};
pub use pool::WorkerPool;
pub use runner::{
    ErrorProcessRunner, FakeProcessRunner, LocalProcessRunner, ProcessResult, ProcessRunner,
    ProcessStatus, SuccessProcessRunner, DEFAULT_OUTPUT_LIMIT, TRUNCATION_MARKER,
};
pub use scratch::Scratch;
