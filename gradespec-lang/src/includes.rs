use regex::Regex;

/// An `#include` directive found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Include {
    /// The header name, without the delimiters.
    pub name: String,
    /// `true` for `#include <...>`, `false` for `#include "..."`.
    pub system: bool,
    /// 1-based line of the directive.
    pub line: usize,
}

lazy_static! {
    static ref INCLUDE: Regex =
        Regex::new(r#"^\s*#\s*include\s*([<"])([^>"]+)[>"]"#).expect("Invalid include regex");
}

/// Replace the comments with spaces, keeping the line structure and the string literals intact.
fn strip_comments(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        Line,
        Block,
        Str(char),
    }
    let mut state = State::Code;
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Code => match (c, chars.peek()) {
                ('/', Some('/')) => {
                    chars.next();
                    state = State::Line;
                    out.push_str("  ");
                }
                ('/', Some('*')) => {
                    chars.next();
                    state = State::Block;
                    out.push_str("  ");
                }
                ('"', _) | ('\'', _) => {
                    state = State::Str(c);
                    out.push(c);
                }
                _ => out.push(c),
            },
            State::Line => {
                if c == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::Str(delimiter) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == delimiter || c == '\n' {
                    state = State::Code;
                }
            }
        }
    }
    out
}

/// Find all the `#include` directives of a C++ source, ignoring the commented out ones.
pub fn scan_includes(source: &str) -> Vec<Include> {
    strip_comments(source)
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            INCLUDE.captures(line).map(|caps| Include {
                name: caps[2].trim().to_string(),
                system: &caps[1] == "<",
                line: index + 1,
            })
        })
        .collect()
}
