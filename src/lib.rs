//! The `gradespec` command line: it loads the configuration and the specification files, runs the
//! checks with [`gradespec_format::evaluate`] while a UI thread prints the progress, and finally
//! writes the Gradescope results.

#[macro_use]
extern crate log;

pub mod error;
pub mod local;
pub mod opt;
