use std::collections::BTreeSet;

use anyhow::Context;

use gradespec_lang::scan_includes;

use crate::score::{TestOutcome, TestStatus};
use crate::spec::TestRecord;
use crate::strategy::{StrategyContext, StrategyResult};

/// Check that the target includes only approved headers. Nothing is spawned.
pub(super) fn evaluate(
    record: &TestRecord,
    allowed: &BTreeSet<String>,
    ctx: &StrategyContext,
) -> StrategyResult {
    let target = ctx.source(&record.header.target);
    let source = std::fs::read_to_string(&target)
        .with_context(|| format!("Cannot read the target {}", target.display()))?;

    let mut output = String::new();
    for include in scan_includes(&source) {
        if !include.system && ctx.config.allow_local_includes {
            continue;
        }
        if !allowed.contains(&include.name) {
            let (open, close) = if include.system { ('<', '>') } else { ('"', '"') };
            output += &format!(
                "Unapproved include {}{}{} at line {}\n",
                open, include.name, close, include.line
            );
        }
    }
    if output.is_empty() {
        Ok(TestOutcome::new(TestStatus::Pass, "All the includes are approved"))
    } else {
        let approved = allowed.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
        output += &format!("Approved includes: {}\n", approved);
        Ok(TestOutcome::new(TestStatus::Fail, output))
    }
}
