use std::collections::HashMap;

use gradespec_diagnostics::{CodeSpan, Diagnostic, DiagnosticContext};

use crate::config::Timeouts;
use crate::spec::{
    Annotation, InvalidRecord, RawBlock, SpecError, TestHeader, TestKind, TestNumber, TestRecord,
    Visibility, MAX_TIMEOUT,
};

/// The attributes every check must have, in the order they are checked.
const REQUIRED: [&str; 5] = ["number", "name", "points", "type", "target"];

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_points(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Turn a block into a [`TestRecord`], applying the defaults of the optional attributes.
///
/// Problems that make the block unusable produce an [`InvalidRecord`] and an error diagnostic.
/// Bad values of optional attributes produce a warning and fall back to the default.
pub fn validate_block(
    block: RawBlock,
    timeouts: &Timeouts,
    diagnostics: &mut DiagnosticContext,
) -> Result<TestRecord, InvalidRecord> {
    let RawBlock {
        location,
        annotations,
        body,
        syntax_error,
    } = block;

    let mut values: HashMap<&str, &Annotation> = HashMap::new();
    for annotation in &annotations {
        if let Some(old) = values.insert(&annotation.key, annotation) {
            diagnostics.add_diagnostic(
                Diagnostic::warning(format!(
                    "Attribute @{} is defined more than once, the last value is used",
                    annotation.key
                ))
                .with_note(format!("{:?} --> {:?}", old.value, annotation.value))
                .with_optional_code_span(annotation.span.clone()),
            );
        }
    }
    let value = |key: &str| values.get(key).map(|a| a.value.as_str());
    let span_of = |key: &str| values.get(key).and_then(|a| a.span.clone());

    let mut invalid = |error: SpecError, span: Option<CodeSpan>| {
        let name = value("name").filter(|n| !n.is_empty());
        diagnostics.add_diagnostic(
            Diagnostic::error(format!(
                "Invalid test {}: {}",
                name.map(|n| format!("{:?}", n)).unwrap_or_default(),
                error
            ))
            .with_optional_code_span(span.or_else(|| location.clone()))
            .with_help("The test is reported as an error worth zero points"),
        );
        InvalidRecord {
            number: value("number").map(String::from),
            name: name.map(String::from),
            kind: value("type").map(String::from),
            points: value("points").and_then(parse_points),
            error,
        }
    };

    if let Some((message, span)) = syntax_error {
        return Err(invalid(SpecError::Syntax { message }, span));
    }
    for field in REQUIRED {
        match value(field) {
            None => return Err(invalid(SpecError::MissingField(field.into()), None)),
            Some("") => return Err(invalid(SpecError::EmptyField(field.into()), span_of(field))),
            Some(_) => {}
        }
    }
    // The required fields are all present from now on.
    let required = |key: &str| value(key).unwrap_or_default();

    let number = match required("number").parse::<TestNumber>() {
        Ok(number) => number,
        Err(e) => return Err(invalid(e, span_of("number"))),
    };
    let points = match parse_points(required("points")) {
        Some(points) => points,
        None => {
            return Err(invalid(
                SpecError::InvalidPoints(required("points").into()),
                span_of("points"),
            ))
        }
    };
    let kind = match required("type").parse::<TestKind>() {
        Ok(kind) => kind,
        Err(e) => return Err(invalid(e, span_of("type"))),
    };

    let mut warnings = vec![];
    let mut optional_bool = |key: &str, default: bool| match value(key) {
        None => default,
        Some(v) => parse_bool(v).unwrap_or_else(|| {
            warnings.push(
                Diagnostic::warning(format!(
                    "@{} has invalid value ({}), using default value ({})",
                    key, v, default
                ))
                .with_optional_code_span(span_of(key)),
            );
            default
        }),
    };
    let skip = optional_bool("skip", false);
    let show_output = optional_bool("show_output", kind.default_show_output());

    let default_timeout = timeouts.for_kind(kind);
    let timeout = match value("timeout") {
        None => default_timeout,
        Some(v) => match v.parse::<f64>() {
            Ok(t) if t > 0.0 && t <= MAX_TIMEOUT => t,
            _ => {
                warnings.push(
                    Diagnostic::warning(format!(
                        "@timeout has invalid value ({}), using default value ({})",
                        v, default_timeout
                    ))
                    .with_optional_code_span(span_of("timeout")),
                );
                default_timeout
            }
        },
    };
    let visibility = match value("visibility") {
        None => Visibility::default(),
        Some(v) => v.parse().unwrap_or_else(|_| {
            warnings.push(
                Diagnostic::warning(format!(
                    "@visibility has invalid value ({}), using default value ({})",
                    v,
                    Visibility::default().as_str()
                ))
                .with_help("Valid values are: hidden, after_due_date, after_published, visible")
                .with_optional_code_span(span_of("visibility")),
            );
            Visibility::default()
        }),
    };
    let include = value("include")
        .map(|v| v.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    for warning in warnings {
        diagnostics.add_diagnostic(warning);
    }
    Ok(TestRecord {
        header: TestHeader {
            number,
            name: required("name").to_string(),
            points,
            target: required("target").to_string(),
            timeout,
            show_output,
            skip,
            include,
            visibility,
        },
        kind,
        body,
    })
}
