use std::fmt::Write;

use crate::spec::TestRecord;

/// Write a record back in the annotation format, with all its attributes explicit.
///
/// Parsing and validating the result gives back the same record.
pub fn serialize_record(record: &TestRecord) -> String {
    let header = &record.header;
    let mut out = String::new();
    let mut attr = |key: &str, value: &dyn std::fmt::Display| {
        let _ = writeln!(out, "@{}: {}", key, value);
    };
    attr("number", &header.number);
    attr("name", &header.name);
    attr("points", &header.points);
    attr("type", &record.kind);
    attr("target", &header.target);
    attr("timeout", &header.timeout);
    attr("show_output", &header.show_output);
    attr("skip", &header.skip);
    if !header.include.is_empty() {
        attr("include", &header.include.join(" "));
    }
    attr("visibility", &header.visibility.as_str());

    let mut result = format!("/*\n{}*/\n", out);
    if record.body.is_empty() {
        result.push_str("<test/>\n");
    } else {
        result.push_str("<test>\n");
        for line in &record.body {
            result.push_str(line);
            result.push('\n');
        }
        result.push_str("</test>\n");
    }
    result
}
