use crate::clause::render_select;
use crate::config::SELECT_INDENT;
use crate::planner::CompositionPlan;
use crate::schema::{OutputColumn, TableRef};
use crate::utils::quote_ident;

/// `schema.table [alias]` for FROM and JOIN items
fn table_source(table: &TableRef) -> String {
    match &table.alias {
        Some(alias) if alias != &table.name => format!("{} {}", table.qualified(), quote_ident(alias)),
        _ => table.qualified(),
    }
}

/// FROM clause: the child, then one inner join per plan edge
pub fn from_clause(plan: &CompositionPlan) -> String {
    let mut lines = vec![format!("  FROM {}", table_source(&plan.child().table))];
    for edge in &plan.joins {
        let left = &plan.levels[edge.left];
        let right = &plan.levels[edge.right];
        let predicate = edge
            .predicate_columns
            .iter()
            .map(|(left_column, right_column)| {
                format!(
                    "{}.{} = {}.{}",
                    quote_ident(left.alias()),
                    quote_ident(left_column),
                    quote_ident(right.alias()),
                    quote_ident(right_column)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        lines.push(format!("    INNER JOIN {} ON {}", table_source(&right.table), predicate));
    }
    lines.join("\n")
}

/// `DROP VIEW` (when dropping) and `CREATE [OR REPLACE] VIEW`
pub fn view_statements(view: &TableRef, plan: &CompositionPlan, columns: &[OutputColumn], drop: bool) -> Vec<String> {
    let mut statements = Vec::new();
    let create = if drop {
        statements.push(format!("DROP VIEW IF EXISTS {} CASCADE;", view.qualified()));
        "CREATE VIEW"
    } else {
        "CREATE OR REPLACE VIEW"
    };

    statements.push(format!(
        "{} {} AS\n  SELECT\n{}\n{};",
        create,
        view.qualified(),
        render_select(columns, SELECT_INDENT),
        from_clause(plan)
    ));
    statements
}

/// `ALTER VIEW ... SET DEFAULT` for the view key
pub fn default_statement(view: &TableRef, key: &OutputColumn, expression: &str) -> String {
    format!(
        "ALTER VIEW {} ALTER COLUMN {} SET DEFAULT {};",
        view.qualified(),
        quote_ident(&key.effective_name),
        expression
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan;
    use crate::schema::composer::compose;
    use crate::schema::definition::CompositionSpec;
    use crate::schema::ColumnDescriptor;

    fn cat_plan(parent_alias: Option<&str>) -> (CompositionPlan, Vec<OutputColumn>) {
        let mut spec = CompositionSpec::single("zoo.animal", "zoo.cat");
        spec.parents[0].alias = parent_alias.map(str::to_string);
        let cat = TableRef::new("zoo", "cat");
        let animal = TableRef::new("zoo", "animal");
        let sets = vec![
            vec![
                ColumnDescriptor::new(&cat, "id", "integer").primary_key(),
                ColumnDescriptor::new(&cat, "extra", "text"),
            ],
            vec![
                ColumnDescriptor::new(&animal, "id", "integer").primary_key(),
                ColumnDescriptor::new(&animal, "name", "text"),
            ],
        ];
        let plan = plan(&spec, &sets).unwrap();
        let columns = compose(&plan.descriptor_sets(), &spec.policy).unwrap();
        (plan, columns)
    }

    #[test]
    fn test_create_or_replace_view() {
        let (plan, columns) = cat_plan(None);
        let statements = view_statements(&TableRef::new("zoo", "vw_zoo_cat"), &plan, &columns, false);
        assert_eq!(
            statements,
            vec![
                "CREATE OR REPLACE VIEW zoo.vw_zoo_cat AS\n  SELECT\n    cat.id,\n    cat.extra,\n    animal.name\n  FROM zoo.cat\n    INNER JOIN zoo.animal ON cat.id = animal.id;"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_drop_and_alias() {
        let (plan, columns) = cat_plan(Some("a"));
        let statements = view_statements(&TableRef::new("zoo", "vw_zoo_cat"), &plan, &columns, true);
        assert_eq!(statements[0], "DROP VIEW IF EXISTS zoo.vw_zoo_cat CASCADE;");
        assert!(statements[1].starts_with("CREATE VIEW zoo.vw_zoo_cat AS"));
        assert!(statements[1].contains("    a.name\n"));
        assert!(statements[1].contains("INNER JOIN zoo.animal a ON cat.id = a.id;"));
    }

    #[test]
    fn test_default_statement() {
        let (_, columns) = cat_plan(None);
        assert_eq!(
            default_statement(&TableRef::new("zoo", "vw_zoo_cat"), &columns[0], "nextval('s')"),
            "ALTER VIEW zoo.vw_zoo_cat ALTER COLUMN id SET DEFAULT nextval('s');"
        );
    }
}
