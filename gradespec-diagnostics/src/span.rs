use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Error};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::DiagnosticLevel;

/// A [`CodeSpan`] points to a slice of a single line of a specification file.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct CodeSpan {
    /// The path of the file where this span comes from.
    file_name: PathBuf,
    /// The line number inside the file.
    line_number: NonZeroUsize,
    /// The offset of the first byte of the span, relative to the start of the file.
    file_offset: usize,
    /// The offset of the first byte of the span, relative to the start of the line.
    line_offset: usize,
    /// The length of the span.
    len: usize,
    /// The content of the line.
    line: String,
}

impl CodeSpan {
    /// Create a new [`CodeSpan`] from the content of a file, and the start-length pair.
    pub fn from_str(
        file_name: impl Into<PathBuf>,
        content: impl AsRef<str>,
        offset: usize,
        len: usize,
    ) -> Result<Self, Error> {
        let mut previous_lines_len = 0;
        let mut skipped_lines = 0;
        for line in content.as_ref().split('\n') {
            if previous_lines_len + line.len() < offset {
                previous_lines_len += line.len() + 1; // Includes \n.
                skipped_lines += 1;
                continue;
            }
            let line_offset = offset - previous_lines_len;
            if line_offset + len > line.len() {
                bail!("Multiline spans are not supported");
            }
            let line_number = NonZeroUsize::new(skipped_lines + 1)
                .ok_or_else(|| anyhow!("Invalid line number"))?;
            return Ok(Self {
                file_name: file_name.into(),
                line_number,
                line: line.trim_end_matches('\r').into(),
                file_offset: offset,
                line_offset,
                len,
            });
        }
        bail!("The offset exceeds the length of the file")
    }

    /// Create a [`CodeSpan`] covering the non-blank part of the 0-based `index`-th line.
    pub fn from_line(
        file_name: impl Into<PathBuf>,
        content: impl AsRef<str>,
        index: usize,
    ) -> Result<Self, Error> {
        let content = content.as_ref();
        let mut offset = 0;
        for (current, line) in content.split('\n').enumerate() {
            if current == index {
                let line = line.trim_end_matches('\r');
                let start = line.len() - line.trim_start().len();
                let len = line.trim().len();
                return Self::from_str(file_name, content, offset + start, len);
            }
            offset += line.len() + 1;
        }
        bail!("Line {} does not exist", index + 1)
    }

    /// Get the content of the span as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.line[self.line_offset..self.line_offset + self.len]
    }

    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// The 1-based line number.
    pub fn line_number(&self) -> usize {
        self.line_number.get()
    }

    /// `file:line`, as used in the messages of the report.
    pub fn location(&self) -> String {
        format!("{}:{}", self.file_name.display(), self.line_number)
    }

    /// Obtain a string (with colors) of this span.
    pub fn to_string(&self, level: DiagnosticLevel) -> String {
        let mut result = String::new();

        result += &format!(
            "{}:{}:{}\n",
            self.file_name.display(),
            self.line_number,
            self.line_offset + 1
        );

        let line_number = self.line_number.get().to_string();
        result += &format!("{} | {}\n", line_number, self.line);

        let pad = line_number.len() + 3 + self.line_offset;
        result += &" ".repeat(pad);

        let color = level.color();
        for _ in 0..(self.len.max(1)) {
            result += &format!("{}", "^".color(color).bold());
        }
        result += "\n";
        result
    }
}
