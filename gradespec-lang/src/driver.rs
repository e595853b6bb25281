//! Generation of the C++ programs that wrap the body of the `unit` and `performance` checks.

use std::fmt::Write;

/// Which flavour of driver to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// Runs the assertions once.
    Unit,
    /// Runs the body and prints how long it took.
    Performance,
}

impl DriverKind {
    /// The name of the generated source and of the executable, without extension.
    pub fn file_stem(&self) -> &'static str {
        match self {
            DriverKind::Unit => "unit_test",
            DriverKind::Performance => "performance_test",
        }
    }
}

/// Everything needed to render a driver.
#[derive(Debug, Clone)]
pub struct Driver<'a> {
    pub kind: DriverKind,
    /// The file under test, included with `#include "<target>"`.
    pub target: &'a str,
    /// Extra headers: written verbatim if they already carry `<>` or `""`, quoted otherwise.
    pub includes: &'a [String],
    /// The header with the assertion macros.
    pub harness_header: &'a str,
    /// The body of the check, one line per element.
    pub body: &'a [String],
}

fn include_line(include: &str) -> String {
    if include.starts_with('<') || include.starts_with('"') {
        format!("#include {}", include)
    } else {
        format!("#include \"{}\"", include)
    }
}

impl Driver<'_> {
    /// Render the source code of the driver.
    ///
    /// The body runs inside a `try` block: an exception escaping from it is reported and marks
    /// the check as failed. The program exits with zero iff all the assertions passed.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "#include \"{}\"", self.target)?;
        writeln!(out)?;
        if self.kind == DriverKind::Performance {
            writeln!(out, "#include <iostream>")?;
            writeln!(out, "#include <chrono>")?;
        }
        for include in self.includes {
            writeln!(out, "{}", include_line(include))?;
        }
        writeln!(out, "#include \"{}\"", self.harness_header)?;
        writeln!(out)?;
        writeln!(out, "int main() {{")?;
        writeln!(out, "    INIT_TEST;")?;
        if self.kind == DriverKind::Performance {
            writeln!(out, "    auto start = std::chrono::steady_clock::now();")?;
        }
        writeln!(out, "    try {{")?;
        for line in self.body {
            if line.trim().is_empty() {
                writeln!(out)?;
            } else {
                writeln!(out, "        {}", line)?;
            }
        }
        writeln!(out, "    }} catch (const std::exception& err) {{")?;
        writeln!(
            out,
            "        std::cout << \"Caught unexpected std::exception, what: \" << err.what() << std::endl;"
        )?;
        writeln!(out, "        FAIL();")?;
        writeln!(out, "    }} catch (...) {{")?;
        writeln!(
            out,
            "        std::cout << \"Caught unexpected non-std::exception\" << std::endl;"
        )?;
        writeln!(out, "        FAIL();")?;
        writeln!(out, "    }}")?;
        if self.kind == DriverKind::Performance {
            writeln!(out, "    auto end = std::chrono::steady_clock::now();")?;
            writeln!(
                out,
                "    auto microseconds = std::chrono::duration_cast<std::chrono::microseconds>(end - start).count();"
            )?;
            writeln!(
                out,
                "    std::cout << \"operation took \" << microseconds << \" \u{b5}s.\" << std::endl;"
            )?;
        }
        writeln!(out, "    RESULT(pass);")?;
        writeln!(out, "    return pass ? 0 : 1;")?;
        writeln!(out, "}}")
    }
}
