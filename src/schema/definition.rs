//! Composition definitions
//!
//! A definition is the JSON document handed to `pirogue_generate()`. It names
//! the child table, its parents and the column policy; it is checked here
//! for shape only; whether the named tables and columns exist is decided
//! later against the catalog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{MAX_INHERITANCE_DEPTH, TRIGGER_FUNCTION_PREFIX, TRIGGER_PREFIX, VIEW_NAME_PREFIX};
use crate::error::{PirogueError, PirogueResult};
use crate::schema::TableRef;
use crate::validation::{validate_column_name, validate_derived_name, validate_sql_identifier};

/// How parents relate to the child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritanceKind {
    /// `parents` is an ancestor chain, nearest first
    #[default]
    Single,
    /// Every parent joins the child directly
    Multiple,
}

impl InheritanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InheritanceKind::Single => "single",
            InheritanceKind::Multiple => "multiple",
        }
    }
}

/// Column policy applied by the composer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositionPolicy {
    pub skip_columns: Vec<String>,
    pub remap_columns: BTreeMap<String, String>,
    pub columns_on_top: Vec<String>,
    pub columns_at_end: Vec<String>,
    pub pkey_default_values: BTreeMap<String, String>,
    pub comment_skipped: bool,
    pub remove_pkey: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParentDefinition {
    pub table: String,
    #[serde(default)]
    pub alias: Option<String>,
    /// Column of the inheriting level referencing this parent's key
    #[serde(default)]
    pub fkey: Option<String>,
    /// Prepended to the effective names of this parent's non-key columns
    #[serde(default)]
    pub prefix: Option<String>,
    /// Column name -> expression written on INSERT instead of `NEW.<column>`
    #[serde(default)]
    pub insert_values: BTreeMap<String, String>,
    /// Column name -> expression written on UPDATE instead of `NEW.<column>`
    #[serde(default)]
    pub update_values: BTreeMap<String, String>,
}

/// Extra plpgsql placed around the generated statements of a trigger
/// function
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriggerHooks {
    /// Variable declarations, one per entry (`x integer`)
    pub declare: Vec<String>,
    /// Runs before the first write
    pub pre: Option<String>,
    /// Runs after the last write
    pub post: Option<String>,
}

impl TriggerHooks {
    pub fn is_empty(&self) -> bool {
        self.declare.is_empty() && self.pre.is_none() && self.post.is_none()
    }
}

impl ParentDefinition {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            alias: None,
            fkey: None,
            prefix: None,
            insert_values: BTreeMap::new(),
            update_values: BTreeMap::new(),
        }
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::parse(&self.table).with_alias(self.alias.as_deref())
    }
}

/// A full composition request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositionSpec {
    #[serde(default)]
    pub kind: InheritanceKind,
    pub child: String,
    #[serde(default)]
    pub child_alias: Option<String>,
    pub parents: Vec<ParentDefinition>,
    #[serde(default)]
    pub view_schema: Option<String>,
    #[serde(default)]
    pub view_name: Option<String>,
    /// Emit `ALTER VIEW ... SET DEFAULT` for the view key
    #[serde(default)]
    pub pkey_default_value: bool,
    #[serde(default)]
    pub policy: CompositionPolicy,
    #[serde(default)]
    pub insert_trigger: Option<TriggerHooks>,
    #[serde(default)]
    pub update_trigger: Option<TriggerHooks>,
}

impl CompositionSpec {
    /// `child` inherits from `parent`, default policy
    pub fn single(parent: &str, child: &str) -> Self {
        Self {
            kind: InheritanceKind::Single,
            child: child.to_string(),
            child_alias: None,
            parents: vec![ParentDefinition::new(parent)],
            view_schema: None,
            view_name: None,
            pkey_default_value: false,
            policy: CompositionPolicy::default(),
            insert_trigger: None,
            update_trigger: None,
        }
    }

    pub fn from_json(value: &Value) -> PirogueResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Parse a definition whose kind is implied by the caller.
    ///
    /// A missing `kind` takes `kind`; a different explicit one is rejected.
    pub fn from_json_with_kind(value: &Value, kind: InheritanceKind) -> PirogueResult<Self> {
        let mut spec = Self::from_json(value)?;
        let declared = value.get("kind").and_then(Value::as_str);
        match declared {
            None => spec.kind = kind,
            Some(name) if name == kind.as_str() => {}
            Some(name) => {
                return Err(PirogueError::InvalidDefinition {
                    reason: format!("expected a '{}' definition, got kind '{}'", kind.as_str(), name),
                })
            }
        }
        Ok(spec)
    }

    pub fn child_ref(&self) -> TableRef {
        TableRef::parse(&self.child).with_alias(self.child_alias.as_deref())
    }

    pub fn parent_refs(&self) -> Vec<TableRef> {
        self.parents.iter().map(ParentDefinition::table_ref).collect()
    }

    /// Every table in declaration order: the child, then the parents
    pub fn table_refs(&self) -> Vec<TableRef> {
        let mut tables = Vec::with_capacity(self.parents.len() + 1);
        tables.push(self.child_ref());
        tables.extend(self.parent_refs());
        tables
    }

    /// Target view: explicit names win, otherwise `vw_<schema>_<table>` of
    /// the child, in the child's schema
    pub fn view_ref(&self) -> TableRef {
        let child = self.child_ref();
        let schema = self.view_schema.clone().unwrap_or_else(|| child.schema.clone());
        let name = self
            .view_name
            .clone()
            .unwrap_or_else(|| format!("{}_{}_{}", VIEW_NAME_PREFIX, child.schema, child.name));
        TableRef::new(&schema, &name)
    }

    /// Shape checks that need no catalog access
    pub fn validate(&self) -> PirogueResult<()> {
        if self.parents.is_empty() {
            return Err(PirogueError::InvalidDefinition {
                reason: format!("{} inheritance needs at least one parent table", self.kind.as_str()),
            });
        }
        if self.kind == InheritanceKind::Single && self.parents.len() > MAX_INHERITANCE_DEPTH {
            return Err(PirogueError::InvalidDefinition {
                reason: format!(
                    "inheritance chain of {} levels exceeds the maximum of {}",
                    self.parents.len(),
                    MAX_INHERITANCE_DEPTH
                ),
            });
        }

        for table in self.table_refs() {
            validate_sql_identifier(&table.schema, "schema")?;
            validate_sql_identifier(&table.name, "table")?;
            if let Some(alias) = &table.alias {
                validate_sql_identifier(alias, "alias")?;
            }
        }

        for parent in &self.parents {
            if let Some(fkey) = &parent.fkey {
                validate_column_name(fkey)?;
            }
            if let Some(prefix) = &parent.prefix {
                validate_sql_identifier(prefix, "prefix")?;
            }
            for column in parent.insert_values.keys().chain(parent.update_values.keys()) {
                validate_column_name(column)?;
            }
        }

        for (name, hooks) in [("insert_trigger", &self.insert_trigger), ("update_trigger", &self.update_trigger)] {
            let Some(hooks) = hooks else { continue };
            if hooks.declare.iter().any(|declaration| declaration.trim().is_empty()) {
                return Err(PirogueError::InvalidDefinition {
                    reason: format!("{name}.declare has an empty declaration"),
                });
            }
        }

        let view = self.view_ref();
        validate_sql_identifier(&view.schema, "view_schema")?;
        validate_derived_name(
            &view.name,
            &format!("{}_{}_on_delete", TRIGGER_PREFIX, view.name),
            "view_name",
        )?;
        validate_derived_name(
            &view.name,
            &format!("{}_{}_insert", TRIGGER_FUNCTION_PREFIX, view.name),
            "view_name",
        )?;

        for target in self.policy.remap_columns.values() {
            validate_column_name(target)?;
        }

        Ok(())
    }
}
