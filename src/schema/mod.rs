//! Schema Model: Tables, Columns and Composed View Columns
//!
//! This module holds the strongly-typed model every other stage works on:
//! - **`TableRef`**: a relation taking part in a composition
//! - **`ColumnDescriptor`**: one catalog column, as fetched by [`crate::catalog`]
//! - **`OutputColumn`**: one column of the generated view, with the table it
//!   comes from and the expression used to write it back
//!
//! ## Key Components
//!
//! - `definition`: the user-level request (`CompositionSpec`) and its policy
//! - `composer`: turns descriptor sets plus a policy into `OutputColumn`s
//!
//! Nothing here outlives a single generation request.

pub mod composer;
pub mod definition;

use serde::{Deserialize, Serialize};

use crate::utils::{qualified_name, table_parts};

/// Relation kind as reported by `pg_class.relkind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    #[default]
    BaseTable,
    View,
}

impl TableKind {
    /// Map a `relkind` character to a kind (`r`/`p`/`f` tables, `v`/`m` views)
    pub fn from_relkind(relkind: &str) -> Option<Self> {
        match relkind {
            "r" | "p" | "f" => Some(TableKind::BaseTable),
            "v" | "m" => Some(TableKind::View),
            _ => None,
        }
    }
}

/// A relation taking part in a composition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
    pub kind: TableKind,
    /// Set when the same physical table is used twice, or to shorten names
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            kind: TableKind::BaseTable,
            alias: None,
        }
    }

    /// Build from a possibly schema-qualified name (`schema.table` or `table`)
    pub fn parse(qualified: &str) -> Self {
        let (schema, name) = table_parts(qualified);
        Self::new(&schema, &name)
    }

    pub fn with_alias(mut self, alias: Option<&str>) -> Self {
        self.alias = alias.map(str::to_string);
        self
    }

    pub fn with_kind(mut self, kind: TableKind) -> Self {
        self.kind = kind;
        self
    }

    /// Name used to qualify this table's columns in generated SQL
    pub fn source_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Quoted `schema.name`
    pub fn qualified(&self) -> String {
        qualified_name(&self.schema, &self.name)
    }

    /// Unquoted `schema.name`, for messages
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Same relation, ignoring alias and kind
    pub fn same_relation(&self, other: &TableRef) -> bool {
        self.schema == other.schema && self.name == other.name
    }
}

/// Target of a single-column foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReference {
    pub schema: String,
    pub table: String,
    pub column: String,
}

impl ColumnReference {
    /// Whether this reference lands on `table.column`
    pub fn points_to(&self, table: &TableRef, column: &str) -> bool {
        table.same_relation(&TableRef::new(&self.schema, &self.table)) && self.column == column
    }
}

/// One column as read from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub table: TableRef,
    pub name: String,
    pub sql_type: String,
    pub is_nullable: bool,
    pub default_expr: Option<String>,
    pub is_primary_key: bool,
    /// Foreign keys this column belongs to
    #[serde(default)]
    pub references: Vec<ColumnReference>,
}

impl ColumnDescriptor {
    pub fn new(table: &TableRef, name: &str, sql_type: &str) -> Self {
        Self {
            table: table.clone(),
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            is_nullable: true,
            default_expr: None,
            is_primary_key: false,
            references: Vec::new(),
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn with_default(mut self, default_expr: &str) -> Self {
        self.default_expr = Some(default_expr.to_string());
        self
    }

    pub fn references(mut self, table: &TableRef, column: &str) -> Self {
        self.references.push(ColumnReference {
            schema: table.schema.clone(),
            table: table.name.clone(),
            column: column.to_string(),
        });
        self
    }
}

/// Expression written into a table for a view column
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValueExpression {
    /// `NEW.<effective_name>`
    #[default]
    NewColumn,
    /// `COALESCE(NEW.<effective_name>, <default>)`
    CoalesceDefault(String),
    /// Expression given by the definition, written as is
    Custom(String),
}

impl ValueExpression {
    pub fn render(&self, effective_name: &str) -> String {
        let new_ref = format!("NEW.{}", crate::utils::quote_ident(effective_name));
        match self {
            ValueExpression::NewColumn => new_ref,
            ValueExpression::CoalesceDefault(default) => format!("COALESCE({new_ref}, {default})"),
            ValueExpression::Custom(expression) => expression.clone(),
        }
    }
}

/// What a composed column stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// The single key shared by every table of the composition
    ViewKey,
    /// A parent key column kept visible under its own name (read-only)
    JoinKey,
    Regular,
}

/// One column of the generated view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub descriptor: ColumnDescriptor,
    pub effective_name: String,
    pub source_table_alias: String,
    /// Written on INSERT
    pub value_expression: ValueExpression,
    /// Written on UPDATE
    pub update_expression: ValueExpression,
    pub role: ColumnRole,
    /// Skipped column kept as an SQL comment only
    pub comment_only: bool,
}

impl OutputColumn {
    pub fn new(descriptor: ColumnDescriptor, source_table_alias: &str) -> Self {
        Self {
            effective_name: descriptor.name.clone(),
            descriptor,
            source_table_alias: source_table_alias.to_string(),
            value_expression: ValueExpression::NewColumn,
            update_expression: ValueExpression::NewColumn,
            role: ColumnRole::Regular,
            comment_only: false,
        }
    }

    /// Source column name in its own table
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn is_live(&self) -> bool {
        !self.comment_only
    }

    pub fn is_key(&self) -> bool {
        matches!(self.role, ColumnRole::ViewKey | ColumnRole::JoinKey)
    }

    /// Expression written on INSERT
    pub fn insert_value(&self) -> String {
        self.value_expression.render(&self.effective_name)
    }

    pub fn update_value(&self) -> String {
        self.update_expression.render(&self.effective_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_parse_and_alias() {
        let table = TableRef::parse("zoo.cat");
        assert_eq!(table.schema, "zoo");
        assert_eq!(table.source_alias(), "cat");

        let aliased = TableRef::parse("cat").with_alias(Some("c"));
        assert_eq!(aliased.schema, "public");
        assert_eq!(aliased.source_alias(), "c");
        assert!(aliased.same_relation(&TableRef::new("public", "cat")));
    }

    #[test]
    fn test_relkind_mapping() {
        assert_eq!(TableKind::from_relkind("r"), Some(TableKind::BaseTable));
        assert_eq!(TableKind::from_relkind("v"), Some(TableKind::View));
        assert_eq!(TableKind::from_relkind("S"), None);
    }

    #[test]
    fn test_value_expression_render() {
        assert_eq!(ValueExpression::NewColumn.render("name"), "NEW.name");
        assert_eq!(
            ValueExpression::CoalesceDefault("nextval('seq')".to_string()).render("id"),
            "COALESCE(NEW.id, nextval('seq'))"
        );
        assert_eq!(ValueExpression::NewColumn.render("Year"), "NEW.\"Year\"");
        assert_eq!(ValueExpression::Custom("now()".to_string()).render("seen"), "now()");
    }

    #[test]
    fn test_reference_target() {
        let animal = TableRef::new("zoo", "animal");
        let column = ColumnDescriptor::new(&TableRef::new("zoo", "cat"), "animal_id", "integer")
            .references(&animal, "aid");
        assert!(column.references[0].points_to(&animal, "aid"));
        assert!(!column.references[0].points_to(&animal, "id"));
        assert!(!column.references[0].points_to(&TableRef::new("farm", "animal"), "aid"));
    }

    #[test]
    fn test_descriptor_serializes() {
        let table = TableRef::new("zoo", "animal");
        let column = ColumnDescriptor::new(&table, "aid", "integer").primary_key();
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(json["name"], "aid");
        assert_eq!(json["is_primary_key"], true);
        assert_eq!(json["table"]["kind"], "base_table");
    }
}
