//! SQL fragment builders
//!
//! Pure functions from composed columns to SQL text. They never look at
//! the catalog and never decide ordering; both are settled before a
//! fragment is rendered.

use crate::schema::{OutputColumn, TableRef};
use crate::utils::{comment_text, indent, quote_ident};

/// Projection list of the view SELECT, one column per line.
///
/// Comment-only columns become `-- skipped: <name>` lines; they never carry
/// a comma, so a trailing comment cannot break the list. Control characters
/// in the name are escaped so the comment stays on one line.
pub fn render_select(columns: &[OutputColumn], width: usize) -> String {
    let pad = indent(width);
    let last_live = columns.iter().rposition(OutputColumn::is_live);

    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            if column.comment_only {
                return format!("{pad}-- skipped: {}", comment_text(column.name()));
            }
            let mut line = format!(
                "{pad}{}.{}",
                quote_ident(&column.source_table_alias),
                quote_ident(column.name())
            );
            if column.effective_name != column.name() {
                line.push_str(&format!(" AS {}", quote_ident(&column.effective_name)));
            }
            if Some(idx) != last_live {
                line.push(',');
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Column and value lists of an INSERT.
///
/// Values follow each column's value expression, so a coalesce default
/// lands in the value list. Key columns are left out when `omit_keys` is
/// set, letting the table default generate them.
pub fn render_insert(columns: &[OutputColumn], omit_keys: bool, width: usize) -> (String, String) {
    let separator = format!(",\n{}", indent(width));
    let written: Vec<&OutputColumn> = columns
        .iter()
        .filter(|column| column.is_live())
        .filter(|column| !(omit_keys && column.is_key()))
        .collect();

    let names = written
        .iter()
        .map(|column| quote_ident(column.name()))
        .collect::<Vec<_>>()
        .join(&separator);
    let values = written
        .iter()
        .map(|column| column.insert_value())
        .collect::<Vec<_>>()
        .join(&separator);
    (names, values)
}

/// `SET` list of an UPDATE followed by `where_clause` as given. Each column
/// takes its update expression, `NEW.<view name>` unless overridden.
///
/// Returns `None` when no column can be set.
pub fn render_update(columns: &[OutputColumn], where_clause: &str, width: usize) -> Option<String> {
    let assignments: Vec<String> = columns
        .iter()
        .filter(|column| column.is_live() && !column.is_key())
        .map(|column| format!("{} = {}", quote_ident(column.name()), column.update_value()))
        .collect();

    if assignments.is_empty() {
        return None;
    }
    Some(format!(
        "SET {}\n{}WHERE {}",
        assignments.join(&format!(",\n{}", indent(width + 4))),
        indent(width),
        where_clause
    ))
}

pub fn render_delete(table: &TableRef, where_clause: &str) -> String {
    format!("DELETE FROM {} WHERE {}", table.qualified(), where_clause)
}

/// `-- skipped: <alias>.<name>` notes for comment-only columns
pub fn render_comment_notes(columns: &[OutputColumn], width: usize) -> Option<String> {
    let pad = indent(width);
    let notes: Vec<String> = columns
        .iter()
        .filter(|column| column.comment_only)
        .map(|column| {
            format!(
                "{pad}-- skipped: {}.{}",
                comment_text(&column.source_table_alias),
                comment_text(column.name())
            )
        })
        .collect();
    (!notes.is_empty()).then(|| notes.join("\n"))
}
