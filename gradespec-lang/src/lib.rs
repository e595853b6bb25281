//! Knowledge about the C++ toolchain used by the checks.
//!
//! - [`Toolchain`](struct.Toolchain.html) builds the compiler and `gcov` command lines for the
//!   different [`BuildMode`](enum.BuildMode.html)s.
//! - [`Driver`](struct.Driver.html) renders the programs that wrap the body of the `unit` and
//!   `performance` checks.
//! - [`scan_includes`](fn.scan_includes.html) finds the `#include` directives of a source.
//! - [`parse_gcov_output`](fn.parse_gcov_output.html) reads the line coverage printed by `gcov`.
//!
//! # Example
//!
//! ```
//! use gradespec_lang::scan_includes;
//!
//! let includes = scan_includes("#include <vector>\n#include \"code.h\"\n");
//! assert!(includes[0].system);
//! assert_eq!(includes[1].name, "code.h");
//! ```

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod driver;
mod gcov;
mod includes;
mod toolchain;

pub use driver::{Driver, DriverKind};
pub use gcov::{coverage_of, parse_gcov_output, FileCoverage};
pub use includes::{scan_includes, Include};
pub use toolchain::{object_name, BuildMode, Toolchain};
