use std::path::Path;

use anyhow::{anyhow, Error};
use pest::Parser;

use gradespec_diagnostics::{CodeSpan, Diagnostic, DiagnosticContext};

/// This module exists because of a `pest`'s bug: <https://github.com/pest-parser/pest/issues/326>
#[allow(missing_docs)]
mod grammar {
    /// The line classifier of the specification files.
    #[derive(Parser)]
    #[grammar = "spec/spec.pest"]
    pub struct SpecParser;
}

use grammar::{Rule, SpecParser};

/// A `@key: value` line of a metadata block.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub key: String,
    /// The value, with the surrounding whitespace removed.
    pub value: String,
    /// The whole annotation line.
    pub span: Option<CodeSpan>,
}

/// A metadata block and its body, not yet interpreted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawBlock {
    /// The `/*` line that opens the metadata.
    pub location: Option<CodeSpan>,
    /// The annotations, in order of appearance (duplicates included).
    pub annotations: Vec<Annotation>,
    /// The verbatim lines between `<test>` and `</test>`.
    pub body: Vec<String>,
    /// The first structural problem of this block, with its position.
    pub syntax_error: Option<(String, Option<CodeSpan>)>,
}

impl RawBlock {
    fn fail(&mut self, message: impl Into<String>, span: Option<CodeSpan>) {
        if self.syntax_error.is_none() {
            self.syntax_error = Some((message.into(), span));
        }
    }
}

/// The classification of a single line.
#[derive(Debug, Clone, PartialEq)]
enum LineKind {
    CommentOpen,
    CommentClose,
    TestEmpty,
    TestOpen,
    TestClose,
    Annotation { key: String, value: String },
    MalformedAnnotation,
    Blank,
    Text,
}

#[derive(Debug)]
struct Line<'a> {
    kind: LineKind,
    /// The content of the line, without the line terminator.
    text: &'a str,
    span: Option<CodeSpan>,
}

fn classify<'a>(file_name: &Path, content: &'a str) -> Result<Vec<Line<'a>>, Error> {
    let mut file = SpecParser::parse(Rule::file, content)
        .map_err(|e| anyhow!("Cannot classify the lines: {}", e))?;
    let file = file.next().ok_or_else(|| anyhow!("Corrupted parser"))?;
    let mut lines = vec![];
    for line in file.into_inner() {
        let span = line.as_span();
        let text = span.as_str();
        let kind = match line.as_rule() {
            Rule::comment_open => LineKind::CommentOpen,
            Rule::comment_close => LineKind::CommentClose,
            Rule::test_empty => LineKind::TestEmpty,
            Rule::test_open => LineKind::TestOpen,
            Rule::test_close => LineKind::TestClose,
            Rule::annotation => {
                let mut inner = line.into_inner();
                let key = inner
                    .next()
                    .ok_or_else(|| anyhow!("Corrupted parser"))?
                    .as_str();
                let value = inner
                    .next()
                    .ok_or_else(|| anyhow!("Corrupted parser"))?
                    .as_str();
                LineKind::Annotation {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                }
            }
            Rule::malformed_annotation => LineKind::MalformedAnnotation,
            Rule::blank => LineKind::Blank,
            Rule::text => LineKind::Text,
            Rule::EOI => continue,
            rule => return Err(anyhow!("Unexpected rule {:?}", rule)),
        };
        let trimmed = text.trim();
        let start = span.start() + (text.len() - text.trim_start().len());
        let span = CodeSpan::from_str(file_name, content, start, trimmed.len()).ok();
        lines.push(Line { kind, text, span });
    }
    Ok(lines)
}

/// Where the block state machine is.
enum State {
    /// Between blocks.
    Outside,
    /// Inside the metadata comment.
    Metadata(RawBlock),
    /// After `*/`, waiting for the body.
    AwaitingBody(RawBlock),
    /// Inside `<test>`, the index is the one of the `<test>` line.
    Body(RawBlock, usize),
    /// Inside a body without metadata.
    StrayBody,
}

/// Split a specification into its blocks.
///
/// This never fails: the structural problems of a block are stored in the block itself, while the
/// content that does not belong to any block is reported as a warning and skipped. After a broken
/// block the parsing restarts from the next `/*` line.
pub fn parse_blocks(file_name: &Path, content: &str) -> (Vec<RawBlock>, DiagnosticContext) {
    let mut diagnostics = DiagnosticContext::new();
    let lines = match classify(file_name, content) {
        Ok(lines) => lines,
        Err(e) => {
            diagnostics.add_diagnostic(Diagnostic::error(format!(
                "Failed to parse {}: {}",
                file_name.display(),
                e
            )));
            return (vec![], diagnostics);
        }
    };

    let mut blocks = vec![];
    let mut state = State::Outside;
    let mut in_stray_text = false;
    let mut index = 0;
    while index < lines.len() {
        let line = &lines[index];
        index += 1;
        state = match state {
            State::Outside => {
                let stray = !matches!(line.kind, LineKind::CommentOpen | LineKind::Blank);
                if stray && !in_stray_text {
                    let what = match line.kind {
                        LineKind::TestOpen | LineKind::TestEmpty => {
                            "Test body without a metadata block, it will be ignored"
                        }
                        _ => "Unexpected content outside of a test block, it will be ignored",
                    };
                    diagnostics.add_diagnostic(
                        Diagnostic::warning(what)
                            .with_optional_code_span(line.span.clone())
                            .with_help("Every test starts with a /* ... */ block of @key: value lines"),
                    );
                }
                in_stray_text = stray && !matches!(line.kind, LineKind::TestOpen);
                match line.kind {
                    LineKind::CommentOpen => State::Metadata(RawBlock {
                        location: line.span.clone(),
                        ..Default::default()
                    }),
                    LineKind::TestOpen => State::StrayBody,
                    _ => State::Outside,
                }
            }
            State::StrayBody => match line.kind {
                LineKind::TestClose => State::Outside,
                _ => State::StrayBody,
            },
            State::Metadata(mut block) => match &line.kind {
                LineKind::Annotation { key, value } => {
                    block.annotations.push(Annotation {
                        key: key.clone(),
                        value: value.clone(),
                        span: line.span.clone(),
                    });
                    State::Metadata(block)
                }
                LineKind::MalformedAnnotation => {
                    block.fail(
                        "missing attribute value (attributes look like \"@name: value\")",
                        line.span.clone(),
                    );
                    State::Metadata(block)
                }
                LineKind::CommentClose => State::AwaitingBody(block),
                LineKind::CommentOpen => {
                    // The metadata was never closed: this line starts another block.
                    block.fail("metadata block is not closed by \"*/\"", block.location.clone());
                    blocks.push(block);
                    State::Metadata(RawBlock {
                        location: line.span.clone(),
                        ..Default::default()
                    })
                }
                _ => State::Metadata(block),
            },
            State::AwaitingBody(mut block) => match line.kind {
                LineKind::Blank => State::AwaitingBody(block),
                LineKind::TestEmpty => {
                    blocks.push(block);
                    State::Outside
                }
                LineKind::TestOpen => State::Body(block, index - 1),
                _ => {
                    block.fail(
                        "missing expected start of test block: \"<test>\" or \"<test/>\"",
                        line.span.clone(),
                    );
                    blocks.push(block);
                    // Process this line again between blocks.
                    index -= 1;
                    in_stray_text = false;
                    State::Outside
                }
            },
            State::Body(mut block, open) => match line.kind {
                LineKind::TestClose => {
                    blocks.push(block);
                    State::Outside
                }
                _ => {
                    block.body.push(line.text.to_string());
                    State::Body(block, open)
                }
            },
        };
    }

    match state {
        State::Outside => {}
        State::StrayBody => {}
        State::Metadata(mut block) => {
            let location = block.location.clone();
            block.fail("unexpected end of file inside the metadata block", location);
            blocks.push(block);
        }
        State::AwaitingBody(mut block) => {
            let location = block.location.clone();
            block.fail("metadata block is not followed by a test body", location);
            blocks.push(block);
        }
        State::Body(mut block, open) => {
            block.fail(
                "missing expected end of test block: \"</test>\"",
                lines[open].span.clone(),
            );
            block.body.clear();
            blocks.push(block);
            // Resume from the next metadata block after the unterminated body.
            if let Some(restart) = lines[open + 1..]
                .iter()
                .position(|l| l.kind == LineKind::CommentOpen)
            {
                let rest_start = open + 1 + restart;
                let (rest, rest_diagnostics) = parse_rest(file_name, content, &lines[rest_start]);
                blocks.extend(rest);
                diagnostics.extend(rest_diagnostics);
            }
        }
    }
    (blocks, diagnostics)
}

/// Parse the content starting from the given line.
fn parse_rest(
    file_name: &Path,
    content: &str,
    from: &Line<'_>,
) -> (Vec<RawBlock>, DiagnosticContext) {
    // The line is a slice of the content, so its offset is known.
    let offset = from.text.as_ptr() as usize - content.as_ptr() as usize;
    let line_number = content[..offset].matches('\n').count();
    // Blank lines keep the line numbers of the spans in sync with the file.
    let padded = format!("{}{}", "\n".repeat(line_number), &content[offset..]);
    parse_blocks(file_name, &padded)
}
