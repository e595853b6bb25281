use std::path::Path;

use regex::Regex;

/// The line coverage of a single file, as reported by `gcov`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileCoverage {
    /// The file name as printed by `gcov`.
    pub file: String,
    /// Percentage of the executable lines that were executed, between 0 and 100.
    pub percent: f64,
    /// Number of executable lines.
    pub lines: u64,
}

lazy_static! {
    static ref FILE: Regex = Regex::new(r"^File '(.+)'$").expect("Invalid gcov regex");
    static ref LINES: Regex =
        Regex::new(r"^Lines executed:\s*([0-9.]+)% of (\d+)$").expect("Invalid gcov regex");
}

/// Parse the summary printed by `gcov` on its standard output.
///
/// ```text
/// File 'code.cpp'
/// Lines executed:85.71% of 7
/// ```
///
/// Files with `No executable lines` are not reported.
pub fn parse_gcov_output(output: &str) -> Vec<FileCoverage> {
    let mut result = vec![];
    let mut current: Option<String> = None;
    for line in output.lines() {
        let line = line.trim_end();
        if let Some(caps) = FILE.captures(line) {
            current = Some(caps[1].to_string());
        } else if let Some(caps) = LINES.captures(line) {
            let Some(file) = current.take() else {
                continue;
            };
            match (caps[1].parse::<f64>(), caps[2].parse::<u64>()) {
                (Ok(percent), Ok(lines)) => result.push(FileCoverage {
                    file,
                    percent,
                    lines,
                }),
                _ => warn!("Unparsable gcov line: {}", line),
            }
        }
    }
    result
}

/// Find the coverage of `target` among the reported files, matching by file name.
pub fn coverage_of<'a>(reports: &'a [FileCoverage], target: &Path) -> Option<&'a FileCoverage> {
    let name = target.file_name()?;
    reports
        .iter()
        .find(|r| Path::new(&r.file).file_name() == Some(name))
}
