use std::collections::BTreeSet;

use crate::spec::{SpecError, TestKind, TestRecord};

/// The typed content of the body of a check, one variant per [`TestKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The headers the target is allowed to include.
    ApprovedIncludes { allowed: BTreeSet<String> },
    /// The script to run and its arguments.
    Script { path: String, args: Vec<String> },
    /// The sources to compile together.
    Compile { sources: Vec<String> },
    /// The sources to build and run with the sanitizers.
    MemoryErrors { sources: Vec<String> },
    /// The driver to run and the other sources to link with it.
    Coverage { main: String, sources: Vec<String> },
    /// The assertions to put in the generated driver.
    Unit { code: Vec<String> },
    /// The file to feed to the program and the file with the expected output.
    Io { input: String, output: String },
    /// The code to time in the generated driver.
    Performance { code: Vec<String> },
}

/// The non-blank lines of the body, trimmed.
fn meaningful_lines(body: &[String]) -> impl Iterator<Item = &str> {
    body.iter().map(|l| l.trim()).filter(|l| !l.is_empty())
}

/// Split a `tag: value` line.
fn tagged(line: &str) -> Result<(&str, &str), SpecError> {
    line.split_once(':')
        .map(|(tag, value)| (tag.trim(), value.trim()))
        .ok_or_else(|| SpecError::invalid_body(format!("expected \"tag: value\" pair, got {:?}", line)))
}

fn source_list(record: &TestRecord) -> Vec<String> {
    let sources: Vec<String> = meaningful_lines(&record.body)
        .flat_map(|l| l.split_whitespace())
        .map(String::from)
        .collect();
    if sources.is_empty() {
        vec![record.header.target.clone()]
    } else {
        sources
    }
}

impl Payload {
    /// Decode the body of the record according to its type.
    pub fn decode(record: &TestRecord) -> Result<Payload, SpecError> {
        match record.kind {
            TestKind::ApprovedIncludes => Ok(Payload::ApprovedIncludes {
                allowed: meaningful_lines(&record.body)
                    .flat_map(|l| l.split_whitespace())
                    .map(|h| h.trim_matches(|c| matches!(c, '<' | '>' | '"')).to_string())
                    .filter(|h| !h.is_empty())
                    .collect(),
            }),
            TestKind::Script => {
                let mut lines = meaningful_lines(&record.body).peekable();
                // Old specifications have a `script` line before the command.
                if lines.peek() == Some(&"script") {
                    lines.next();
                }
                let line = lines
                    .next()
                    .ok_or_else(|| SpecError::invalid_body("missing the path of the script"))?;
                if let Some(extra) = lines.next() {
                    return Err(SpecError::invalid_body(format!(
                        "unexpected line after the script command: {:?}",
                        extra
                    )));
                }
                let mut words = shell_words::split(line)
                    .map_err(|e| SpecError::invalid_body(format!("invalid script command: {}", e)))?
                    .into_iter();
                let path = words
                    .next()
                    .ok_or_else(|| SpecError::invalid_body("missing the path of the script"))?;
                Ok(Payload::Script {
                    path,
                    args: words.collect(),
                })
            }
            TestKind::Compile => Ok(Payload::Compile {
                sources: source_list(record),
            }),
            TestKind::MemoryErrors => Ok(Payload::MemoryErrors {
                sources: source_list(record),
            }),
            TestKind::Coverage => {
                let mut main = None;
                let mut sources = vec![];
                for line in meaningful_lines(&record.body) {
                    match tagged(line)? {
                        ("main", value) => main = Some(value.to_string()),
                        ("source", value) => {
                            sources = value.split_whitespace().map(String::from).collect()
                        }
                        (tag, _) => {
                            return Err(SpecError::invalid_body(format!(
                                "unexpected tag ({}) in coverage test",
                                tag
                            )))
                        }
                    }
                }
                match main {
                    Some(main) if !main.is_empty() => Ok(Payload::Coverage { main, sources }),
                    _ => Err(SpecError::invalid_body("missing \"main: <driver>\" in coverage test")),
                }
            }
            TestKind::Unit => Ok(Payload::Unit {
                code: record.body.clone(),
            }),
            TestKind::Performance => Ok(Payload::Performance {
                code: record.body.clone(),
            }),
            TestKind::Io => {
                let mut input = None;
                let mut output = None;
                for line in meaningful_lines(&record.body) {
                    let (tag, value) = tagged(line)?;
                    let slot = match tag {
                        "input" => &mut input,
                        "output" => &mut output,
                        _ => {
                            return Err(SpecError::invalid_body(format!(
                                "unexpected tag ({}) in i/o test",
                                tag
                            )))
                        }
                    };
                    if slot.is_some() {
                        return Err(SpecError::invalid_body(format!(
                            "{} is given more than once in i/o test",
                            tag
                        )));
                    }
                    *slot = Some(value.to_string()).filter(|v| !v.is_empty());
                }
                match (input, output) {
                    (Some(input), Some(output)) => Ok(Payload::Io { input, output }),
                    (None, _) => Err(SpecError::invalid_body("missing input filename in i/o test")),
                    (_, None) => Err(SpecError::invalid_body("missing output filename in i/o test")),
                }
            }
        }
    }
}
