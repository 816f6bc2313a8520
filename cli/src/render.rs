// Audit Text
//
// Line-oriented rendering of an evaluation report. Operators grep this
// output, so the wording of each line is stable.

use std::io::{self, Write};

use plangate_kernel::evaluate::{Decision, DiffVerdict, EntryReport, EvaluationReport};
use plangate_kernel::plan::Section;
use plangate_kernel::policy::matcher::WhenOutcome;
use plangate_kernel::policy::Category;

pub fn render_text<W: Write>(report: &EvaluationReport, out: &mut W) -> io::Result<()> {
    for entry in &report.entries {
        match entry.section {
            Section::Drift => render_drift(entry, out)?,
            Section::Change => render_change(entry, out)?,
        }
    }
    writeln!(out, "Final Outcome: {}", report.verdict)
}

fn render_drift<W: Write>(entry: &EntryReport, out: &mut W) -> io::Result<()> {
    writeln!(out, "Drift diff: {} - {}", entry.address, entry.resource_type)?;
    match &entry.decision {
        Decision::SkippedPendingDelete => {
            writeln!(out, "Ignoring drift on resource being deleted")
        }
        Decision::Fields { diffs, .. } => render_diffs("Drift diff", diffs, out),
        Decision::Existence { allowed, .. } => writeln!(out, "     {}", label(*allowed)),
        Decision::UnknownAction => writeln!(out, "Drift unknown action: {}", entry.actions),
        Decision::Ignored | Decision::NoMatchingRule { .. } => Ok(()),
    }
}

fn render_change<W: Write>(entry: &EntryReport, out: &mut W) -> io::Result<()> {
    let heading = match &entry.decision {
        Decision::Ignored | Decision::SkippedPendingDelete => return Ok(()),
        Decision::UnknownAction => {
            return writeln!(out, "Unknown action: {}", entry.actions);
        }
        Decision::NoMatchingRule { category }
        | Decision::Fields { category, .. }
        | Decision::Existence { category, .. } => heading(*category),
    };
    writeln!(out, "{heading}: {} - {}", entry.address, entry.resource_type)?;

    match &entry.decision {
        Decision::Fields { diffs, .. } => render_diffs("Update diff", diffs, out),
        Decision::Existence { allowed, .. } => writeln!(out, "     {}", label(*allowed)),
        _ => writeln!(out, "     DENIED"),
    }
}

fn render_diffs<W: Write>(prefix: &str, diffs: &[DiffVerdict], out: &mut W) -> io::Result<()> {
    for diff in diffs {
        writeln!(
            out,
            "{prefix}: {} - {} != {}",
            diff.item.address, diff.item.before, diff.item.after
        )?;
        for when in &diff.when {
            render_when(when, out)?;
        }
        writeln!(out, "   {}", label(diff.allowed))?;
    }
    Ok(())
}

fn render_when<W: Write>(when: &WhenOutcome, out: &mut W) -> io::Result<()> {
    let before_regex = when.before_regex.as_deref().unwrap_or("*");
    let after_regex = when.after_regex.as_deref().unwrap_or("*");
    if when.matched {
        writeln!(
            out,
            "When: Match {}: {} == {before_regex} and {} == {after_regex}",
            when.address, when.before, when.after
        )
    } else {
        writeln!(
            out,
            "When: DIDN'T match {}: {} != {before_regex} or {} != {after_regex}",
            when.address, when.before, when.after
        )
    }
}

fn heading(category: Category) -> &'static str {
    match category {
        Category::Creates => "Create",
        Category::Deletes => "Delete",
        Category::Updates => "Update",
        Category::Drifts => "Drift",
        Category::DriftDeletes => "Drift delete",
    }
}

fn label(allowed: bool) -> &'static str {
    if allowed {
        "Allowed"
    } else {
        "DENIED"
    }
}
