//! Table formatting for unresolved-node reports.

use comfy_table::{ContentArrangement, Table, presets};
use stubflow::{Issue, UnresolvedEntry, UnresolvedKind, UnresolvedReport};

/// Format a report as a table, one row per unresolved node.
pub fn format_report_table(report: &UnresolvedReport) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_BORDERS_ONLY);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Path", "Source", "Kind", "Expression", "Message"]);

    for entry in &report.entries {
        table.add_row(vec![
            entry.path.clone(),
            entry.source.clone(),
            kind_label(entry.kind).to_string(),
            entry.expression.clone(),
            describe(entry),
        ]);
    }

    table
}

pub fn kind_label(kind: UnresolvedKind) -> &'static str {
    match kind {
        UnresolvedKind::LocalError => "error",
        UnresolvedKind::DependsOnError => "depends on error",
        UnresolvedKind::Unresolved => "unresolved",
    }
}

/// The entry's message followed by its nested issues, two spaces per level.
fn describe(entry: &UnresolvedEntry) -> String {
    let mut lines = vec![entry.message.clone()];
    append_issues(&entry.nested, 1, &mut lines);
    lines.join("\n")
}

fn append_issues(issues: &[Issue], depth: usize, lines: &mut Vec<String>) {
    for issue in issues {
        lines.push(format!("{}{}", "  ".repeat(depth), issue.message));
        append_issues(&issue.nested, depth + 1, lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: UnresolvedKind, message: &str) -> UnresolvedEntry {
        UnresolvedEntry {
            path: "r".to_string(),
            expression: "(( x ))".to_string(),
            source: "template".to_string(),
            kind,
            message: message.to_string(),
            nested: Vec::new(),
        }
    }

    #[test]
    fn nested_issues_are_indented() {
        let mut failed = entry(UnresolvedKind::LocalError, "for loop failed");
        let mut row = Issue::new("row 2 (x=0)");
        row.nested.push(Issue::new("division by zero"));
        failed.nested.push(row);
        assert_eq!(
            describe(&failed),
            "for loop failed\n  row 2 (x=0)\n    division by zero"
        );
    }

    #[test]
    fn rows_carry_every_column() {
        let report = UnresolvedReport {
            entries: vec![entry(UnresolvedKind::DependsOnError, "'a' depends on an error")],
        };
        let rendered = format_report_table(&report).to_string();
        for text in ["Path", "template", "depends on error", "(( x ))", "'a' depends on an error"] {
            assert!(rendered.contains(text), "missing {text:?} in\n{rendered}");
        }
    }
}
