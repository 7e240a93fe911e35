//! INSTEAD OF trigger functions
//!
//! Each view gets three plpgsql functions (`ft_<view>_insert`,
//! `ft_<view>_update`, `ft_<view>_delete`) and one row trigger per
//! function. The function bodies write to the underlying tables in plan
//! order; see [`crate::planner`].

use crate::clause::{render_comment_notes, render_delete, render_insert, render_update};
use crate::config::{BODY_INDENT, TRIGGER_FUNCTION_PREFIX, TRIGGER_PREFIX};
use crate::planner::{CompositionPlan, TableWrite};
use crate::schema::definition::TriggerHooks;
use crate::schema::{OutputColumn, TableRef};
use crate::utils::{indent, qualified_name, quote_ident};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl TriggerEvent {
    pub const ALL: [TriggerEvent; 3] = [TriggerEvent::Insert, TriggerEvent::Update, TriggerEvent::Delete];

    fn verb(&self) -> &'static str {
        match self {
            TriggerEvent::Insert => "insert",
            TriggerEvent::Update => "update",
            TriggerEvent::Delete => "delete",
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            TriggerEvent::Insert => "INSERT",
            TriggerEvent::Update => "UPDATE",
            TriggerEvent::Delete => "DELETE",
        }
    }

    /// Row returned by the trigger function
    fn returned_row(&self) -> &'static str {
        match self {
            TriggerEvent::Delete => "OLD",
            TriggerEvent::Insert | TriggerEvent::Update => "NEW",
        }
    }
}

/// Unquoted `ft_<view>_<verb>`
pub fn function_name(view: &TableRef, event: TriggerEvent) -> String {
    format!("{}_{}_{}", TRIGGER_FUNCTION_PREFIX, view.name, event.verb())
}

/// Unquoted `tr_<view>_on_<verb>`
pub fn trigger_name(view: &TableRef, event: TriggerEvent) -> String {
    format!("{}_{}_on_{}", TRIGGER_PREFIX, view.name, event.verb())
}

fn insert_statement(write: &TableWrite, omit_keys: bool) -> String {
    let pad = indent(BODY_INDENT);
    let mut columns = write.keys.clone();
    columns.extend(write.columns.iter().cloned());
    let (names, values) = render_insert(&columns, omit_keys, BODY_INDENT * 2);

    let mut statement = if names.is_empty() {
        format!("{pad}INSERT INTO {} DEFAULT VALUES", write.table.qualified())
    } else {
        let inner = indent(BODY_INDENT * 2);
        format!(
            "{pad}INSERT INTO {} (\n{inner}{}\n{pad}) VALUES (\n{inner}{}\n{pad})",
            write.table.qualified(),
            names,
            values
        )
    };
    if let Some(returning) = &write.returning {
        let key = write
            .keys
            .first()
            .map(|key| key.effective_name.as_str())
            .unwrap_or(returning.as_str());
        statement.push_str(&format!(
            "\n{pad}RETURNING {} INTO NEW.{}",
            quote_ident(returning),
            quote_ident(key)
        ));
    }
    statement.push(';');
    statement
}

/// Body of the INSERT function: one INSERT per table, key generator first,
/// then a note for every column kept as a comment in the view
pub fn insert_body(writes: &[TableWrite], columns: &[OutputColumn], remove_pkey: bool) -> String {
    let mut statements: Vec<String> = writes
        .iter()
        .map(|write| insert_statement(write, remove_pkey && write.returning.is_some()))
        .collect();

    if let Some(notes) = render_comment_notes(columns, BODY_INDENT) {
        statements.push(notes);
    }
    statements.join("\n")
}

/// Body of the UPDATE function: one UPDATE per table that owns a column
pub fn update_body(writes: &[TableWrite], view_key: &str) -> String {
    let pad = indent(BODY_INDENT);
    let width = BODY_INDENT * 2;
    writes
        .iter()
        .filter_map(|write| {
            let predicate = format!("{} = OLD.{}", quote_ident(&write.key_column), quote_ident(view_key));
            render_update(&write.columns, &predicate, width).map(|fragment| {
                format!(
                    "{pad}UPDATE {}\n{}{};",
                    write.table.qualified(),
                    indent(width),
                    fragment
                )
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Body of the DELETE function: the child first, then its parents
pub fn delete_body(plan: &CompositionPlan, view_key: &str) -> String {
    let pad = indent(BODY_INDENT);
    plan.delete_tables()
        .into_iter()
        .map(|(table, key_column)| {
            let predicate = format!("{} = OLD.{}", quote_ident(key_column), quote_ident(view_key));
            format!("{pad}{};", render_delete(table, &predicate))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hook text indented as a body statement, one line per source line
fn hook_lines(text: &str, pad: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{pad}{}\n", line.trim_end())
            }
        })
        .collect()
}

/// Function, optional `DROP TRIGGER` and `CREATE TRIGGER` for one event.
///
/// `hooks` adds a `DECLARE` section and code before and after the
/// generated statements.
pub fn trigger_statements(
    view: &TableRef,
    event: TriggerEvent,
    body: &str,
    hooks: Option<&TriggerHooks>,
    drop: bool,
) -> Vec<String> {
    let pad = indent(BODY_INDENT);
    let function = qualified_name(&view.schema, &function_name(view, event));
    let trigger = quote_ident(&trigger_name(view, event));

    let mut declare = String::new();
    let mut lines = String::new();
    if let Some(hooks) = hooks {
        if !hooks.declare.is_empty() {
            declare.push_str("DECLARE\n");
            for declaration in &hooks.declare {
                declare.push_str(&format!("{pad}{};\n", declaration.trim().trim_end_matches(';')));
            }
        }
        if let Some(pre) = &hooks.pre {
            lines.push_str(&hook_lines(pre, &pad));
        }
    }
    if !body.is_empty() {
        lines.push_str(body);
        lines.push('\n');
    }
    if let Some(post) = hooks.and_then(|hooks| hooks.post.as_deref()) {
        lines.push_str(&hook_lines(post, &pad));
    }

    let mut statements = vec![format!(
        "CREATE OR REPLACE FUNCTION {function}()\n{pad}RETURNS trigger AS\n$BODY$\n{declare}BEGIN\n{lines}{pad}RETURN {};\nEND;\n$BODY$\nLANGUAGE plpgsql;",
        event.returned_row()
    )];
    if !drop {
        statements.push(format!("DROP TRIGGER IF EXISTS {trigger} ON {};", view.qualified()));
    }
    statements.push(format!(
        "CREATE TRIGGER {trigger}\n{pad}INSTEAD OF {} ON {}\n{pad}FOR EACH ROW EXECUTE FUNCTION {function}();",
        event.keyword(),
        view.qualified()
    ));
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan;
    use crate::schema::composer::compose;
    use crate::schema::definition::CompositionSpec;
    use crate::schema::ColumnDescriptor;

    fn cat() -> (CompositionSpec, CompositionPlan, Vec<OutputColumn>) {
        let spec = CompositionSpec::single("zoo.animal", "zoo.cat");
        let cat = TableRef::new("zoo", "cat");
        let animal = TableRef::new("zoo", "animal");
        let sets = vec![
            vec![
                ColumnDescriptor::new(&cat, "aid", "integer").primary_key(),
                ColumnDescriptor::new(&cat, "eye_color", "text"),
            ],
            vec![
                ColumnDescriptor::new(&animal, "aid", "integer")
                    .primary_key()
                    .with_default("nextval('zoo.animal_aid_seq'::regclass)"),
                ColumnDescriptor::new(&animal, "name", "text"),
            ],
        ];
        let plan = plan(&spec, &sets).unwrap();
        let columns = compose(&plan.descriptor_sets(), &spec.policy).unwrap();
        (spec, plan, columns)
    }

    #[test]
    fn test_names() {
        let view = TableRef::new("zoo", "vw_zoo_cat");
        assert_eq!(function_name(&view, TriggerEvent::Insert), "ft_vw_zoo_cat_insert");
        assert_eq!(trigger_name(&view, TriggerEvent::Delete), "tr_vw_zoo_cat_on_delete");
    }

    #[test]
    fn test_insert_body_parent_first() {
        let (_, plan, columns) = cat();
        let body = insert_body(&plan.writes(&columns).unwrap(), &columns, false);
        assert_eq!(
            body,
            "  INSERT INTO zoo.animal (\n    aid,\n    name\n  ) VALUES (\n    \
             COALESCE(NEW.aid, nextval('zoo.animal_aid_seq'::regclass)),\n    NEW.name\n  )\n  \
             RETURNING aid INTO NEW.aid;\n  \
             INSERT INTO zoo.cat (\n    aid,\n    eye_color\n  ) VALUES (\n    NEW.aid,\n    NEW.eye_color\n  );"
        );
    }

    #[test]
    fn test_insert_body_without_key() {
        let (_, plan, columns) = cat();
        let body = insert_body(&plan.writes(&columns).unwrap(), &columns, true);
        assert!(body.starts_with("  INSERT INTO zoo.animal (\n    name\n  ) VALUES (\n    NEW.name\n  )"));
        assert!(body.contains("INSERT INTO zoo.cat (\n    aid,"));
    }

    #[test]
    fn test_update_and_delete_bodies() {
        let (_, plan, columns) = cat();
        let writes = plan.writes(&columns).unwrap();
        assert_eq!(
            update_body(&writes, "aid"),
            "  UPDATE zoo.animal\n    SET name = NEW.name\n    WHERE aid = OLD.aid;\n  \
             UPDATE zoo.cat\n    SET eye_color = NEW.eye_color\n    WHERE aid = OLD.aid;"
        );
        assert_eq!(
            delete_body(&plan, "aid"),
            "  DELETE FROM zoo.cat WHERE aid = OLD.aid;\n  DELETE FROM zoo.animal WHERE aid = OLD.aid;"
        );
    }

    #[test]
    fn test_trigger_statements() {
        let view = TableRef::new("zoo", "vw_zoo_cat");
        let statements = trigger_statements(
            &view,
            TriggerEvent::Delete,
            "  DELETE FROM zoo.cat WHERE aid = OLD.aid;",
            None,
            false,
        );
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE OR REPLACE FUNCTION zoo.ft_vw_zoo_cat_delete()"));
        assert!(statements[0].contains("  RETURN OLD;\nEND;"));
        assert_eq!(statements[1], "DROP TRIGGER IF EXISTS tr_vw_zoo_cat_on_delete ON zoo.vw_zoo_cat;");
        assert_eq!(
            statements[2],
            "CREATE TRIGGER tr_vw_zoo_cat_on_delete\n  INSTEAD OF DELETE ON zoo.vw_zoo_cat\n  \
             FOR EACH ROW EXECUTE FUNCTION zoo.ft_vw_zoo_cat_delete();"
        );

        let statements = trigger_statements(&view, TriggerEvent::Update, "", None, true);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("$BODY$\nBEGIN\n  RETURN NEW;\nEND;"));
    }

    #[test]
    fn test_hooks_wrap_body() {
        let view = TableRef::new("zoo", "vw_zoo_cat");
        let hooks = TriggerHooks {
            declare: vec!["n integer".to_string(), "label text;".to_string()],
            pre: Some("n := 1;\nlabel := 'cat';".to_string()),
            post: Some("PERFORM pg_notify(label, n::text);".to_string()),
        };
        let statements = trigger_statements(
            &view,
            TriggerEvent::Insert,
            "  INSERT INTO zoo.cat DEFAULT VALUES;",
            Some(&hooks),
            true,
        );
        assert_eq!(
            statements[0],
            "CREATE OR REPLACE FUNCTION zoo.ft_vw_zoo_cat_insert()\n  RETURNS trigger AS\n$BODY$\n\
             DECLARE\n  n integer;\n  label text;\n\
             BEGIN\n  n := 1;\n  label := 'cat';\n  INSERT INTO zoo.cat DEFAULT VALUES;\n  \
             PERFORM pg_notify(label, n::text);\n  RETURN NEW;\nEND;\n$BODY$\nLANGUAGE plpgsql;"
        );

        let empty = TriggerHooks::default();
        let plain = trigger_statements(&view, TriggerEvent::Insert, "", Some(&empty), true);
        assert!(plain[0].contains("$BODY$\nBEGIN\n  RETURN NEW;"));
    }
}
