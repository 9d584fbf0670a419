// src/storage/markdown.rs

//! Markdown tables of snapshot contents.

use crate::models::{OrderedMap, ReleaseRecord, Snapshot};

/// Render every section of `snapshot` as a `## section` heading and a table.
///
/// Wiki sections keep their source columns; listing sections show date and tag.
pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for (section, records) in snapshot.sections() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("## {section}\n\n"));
        render_section(records, &mut out);
    }
    out
}

fn render_section(records: &OrderedMap<ReleaseRecord>, out: &mut String) {
    let columns = records.column_order();
    if columns.is_empty() {
        push_row(out, ["date", "tag"].iter().map(|s| s.to_string()));
        push_row(out, ["---", "---"].iter().map(|s| s.to_string()));
        for record in records.values() {
            push_row(out, [record.date.clone(), record.tag.clone()].into_iter());
        }
        return;
    }

    push_row(out, columns.iter().cloned());
    push_row(out, columns.iter().map(|_| "---".to_string()));
    for record in records.values() {
        push_row(
            out,
            columns
                .iter()
                .map(|c| record.columns.get(c).cloned().unwrap_or_default()),
        );
    }
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>) {
    for cell in cells {
        out.push('|');
        out.push_str(&cell.replace('|', "\\|"));
    }
    out.push_str("|\n");
}
